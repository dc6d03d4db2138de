//! Per-day averages across the runs of a batch.
//!
//! This is the data side of batch plotting: every run file in a batch directory is read back and
//! each column is averaged, unweighted, day by day. The result can be written next to the runs as
//! `average.csv`.
use csv::{Reader, Writer};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SimError;
use crate::report::{create_new_file, DailyRecord};

/// Name of the averages file written into a batch directory.
pub const AVERAGE_FILENAME: &str = "average.csv";

/// One row of the averages file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct AverageRecord {
    pub days: usize,
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
    pub total_quarantined: f64,
    pub quarantined_using_resources: f64,
    pub total_isolated: f64,
    pub isolated_using_resources: f64,
    pub infectious: f64,
}

impl AverageRecord {
    #[allow(clippy::cast_precision_loss)]
    fn accumulate(&mut self, record: &DailyRecord) {
        self.susceptible += record.susceptible as f64;
        self.infected += record.infected as f64;
        self.recovered += record.recovered as f64;
        self.total_quarantined += record.total_quarantined as f64;
        self.quarantined_using_resources += record.quarantined_using_resources as f64;
        self.total_isolated += record.total_isolated as f64;
        self.isolated_using_resources += record.isolated_using_resources as f64;
        self.infectious += record.infectious as f64;
    }

    fn scale(&mut self, factor: f64) {
        self.susceptible *= factor;
        self.infected *= factor;
        self.recovered *= factor;
        self.total_quarantined *= factor;
        self.quarantined_using_resources *= factor;
        self.total_isolated *= factor;
        self.isolated_using_resources *= factor;
        self.infectious *= factor;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    num_runs: usize,
    averages: Vec<AverageRecord>,
}

/// Returns the run files of `batch_dir` (`<run_filename>_<digits>.csv`), sorted by index.
fn run_files(batch_dir: &Path, run_filename: &str) -> Result<Vec<PathBuf>, SimError> {
    let prefix = format!("{run_filename}_");
    let mut files = Vec::new();
    for entry in fs::read_dir(batch_dir)? {
        let path = entry?.path();
        let is_run_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|rest| rest.strip_suffix(".csv"))
            .is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()));
        if is_run_file {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn read_run(path: &Path) -> Result<Vec<DailyRecord>, SimError> {
    let mut reader = Reader::from_path(path)?;
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

impl BatchSummary {
    /// Averages the given runs day by day.
    ///
    /// # Errors
    ///
    /// Returns `SimError::SimError` if `runs` is empty, the runs differ in length, or their day
    /// columns disagree.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_runs(runs: &[Vec<DailyRecord>]) -> Result<BatchSummary, SimError> {
        let Some(first) = runs.first() else {
            return Err("cannot average a batch with no runs".into());
        };
        let mut averages: Vec<AverageRecord> = first
            .iter()
            .map(|record| AverageRecord {
                days: record.days,
                ..AverageRecord::default()
            })
            .collect();

        for (index, run) in runs.iter().enumerate() {
            if run.len() != averages.len() {
                return Err(SimError::SimError(format!(
                    "run {index} has {} days, expected {}",
                    run.len(),
                    averages.len()
                )));
            }
            for (average, record) in averages.iter_mut().zip(run) {
                if record.days != average.days {
                    return Err(SimError::SimError(format!(
                        "run {index} has day {} where day {} was expected",
                        record.days, average.days
                    )));
                }
                average.accumulate(record);
            }
        }

        let factor = 1.0 / runs.len() as f64;
        for average in &mut averages {
            average.scale(factor);
        }
        Ok(BatchSummary {
            num_runs: runs.len(),
            averages,
        })
    }

    /// Reads every run file of `batch_dir` and averages them.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or a run file cannot be read, or as
    /// [`BatchSummary::from_runs`].
    pub fn from_batch_dir(batch_dir: &Path, run_filename: &str) -> Result<BatchSummary, SimError> {
        let runs = run_files(batch_dir, run_filename)?
            .iter()
            .map(|path| read_run(path))
            .collect::<Result<Vec<_>, _>>()?;
        BatchSummary::from_runs(&runs)
    }

    pub fn num_runs(&self) -> usize {
        self.num_runs
    }

    pub fn averages(&self) -> &[AverageRecord] {
        &self.averages
    }

    /// Writes the averages as CSV to `path`, which must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ResultsConflict` if `path` exists, or an I/O or CSV error if writing
    /// fails.
    pub fn write_csv(&self, path: &Path) -> Result<(), SimError> {
        let mut writer = Writer::from_writer(create_new_file(path)?);
        for average in &self.averages {
            writer.serialize(average)?;
        }
        writer.flush()?;
        info!(
            "wrote averages of {} runs to {}",
            self.num_runs,
            path.display()
        );
        Ok(())
    }
}
