//! Per-run result series and their persistence.
//!
//! A batch of runs is written to `<main_results_dir>/<batch_dir>_<NNNNN>/`, where the index is the
//! number of existing entries in `main_results_dir` that start with `<batch_dir>`. Inside it each
//! run becomes `<run_filename>_<NNNNN>.csv` with one row per day, and the parameters used are
//! saved once as `parameters.json`. Nothing is ever overwritten: an occupied slot is a
//! [`SimError::ResultsConflict`].
use csv::Writer;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::compartment::CompartmentLog;
use crate::error::SimError;
use crate::general_population::PopulationLog;
use crate::parameters::{Parameters, ResultsParameters};

/// Width of the zero-padded index in batch directory and run file names.
const INDEX_WIDTH: usize = 5;

/// Name of the parameter snapshot inside a batch directory.
pub const PARAMETERS_FILENAME: &str = "parameters.json";

/// One row of a run file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyRecord {
    pub days: usize,
    pub susceptible: usize,
    pub infected: usize,
    pub recovered: usize,
    pub total_quarantined: usize,
    pub quarantined_using_resources: usize,
    pub total_isolated: usize,
    pub isolated_using_resources: usize,
    pub infectious: usize,
}

/// The eight per-day series of a run, all of the same length. Index 0 is the initial state.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResults {
    pub susceptible: Vec<usize>,
    pub infected: Vec<usize>,
    pub recovered: Vec<usize>,
    pub total_quarantined: Vec<usize>,
    pub quarantined_using_resources: Vec<usize>,
    pub total_isolated: Vec<usize>,
    pub isolated_using_resources: Vec<usize>,
    pub infectious: Vec<usize>,
}

impl RunResults {
    pub fn new(
        population: &PopulationLog,
        quarantine: &CompartmentLog,
        isolation: &CompartmentLog,
    ) -> RunResults {
        RunResults {
            susceptible: population.susceptible.clone(),
            infected: population.infected.clone(),
            recovered: population.recovered.clone(),
            total_quarantined: quarantine.total.clone(),
            quarantined_using_resources: quarantine.using_resources.clone(),
            total_isolated: isolation.total.clone(),
            isolated_using_resources: isolation.using_resources.clone(),
            infectious: population.infectious.clone(),
        }
    }

    /// Number of days recorded, including the initial state.
    pub fn len(&self) -> usize {
        self.susceptible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.susceptible.is_empty()
    }

    /// One record per day, in order.
    pub fn records(&self) -> impl Iterator<Item = DailyRecord> + '_ {
        (0..self.len()).map(move |day| DailyRecord {
            days: day,
            susceptible: self.susceptible[day],
            infected: self.infected[day],
            recovered: self.recovered[day],
            total_quarantined: self.total_quarantined[day],
            quarantined_using_resources: self.quarantined_using_resources[day],
            total_isolated: self.total_isolated[day],
            isolated_using_resources: self.isolated_using_resources[day],
            infectious: self.infectious[day],
        })
    }
}

fn indexed_name(prefix: &str, index: usize) -> String {
    format!("{prefix}_{index:0width$}", width = INDEX_WIDTH)
}

/// Creates `path`, failing with `SimError::ResultsConflict` if it already exists.
pub(crate) fn create_new_file(path: &Path) -> Result<File, SimError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => SimError::ResultsConflict(format!(
                "{} already exists and will not be overwritten",
                path.display()
            )),
            _ => SimError::IoError(err),
        })
}

/// Writes the runs of one batch into a fresh, indexed batch directory.
#[derive(Debug)]
pub struct ResultsWriter {
    batch_dir: PathBuf,
    run_filename: String,
    runs_written: usize,
}

impl ResultsWriter {
    /// Creates `main_results_dir` if needed, then the next indexed batch directory inside it.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ResultsConflict` if the computed batch directory already exists (for
    /// example after an earlier batch directory was deleted), or `SimError::IoError` if a
    /// directory cannot be read or created.
    pub fn new(config: &ResultsParameters) -> Result<ResultsWriter, SimError> {
        let main_dir = Path::new(&config.main_results_dir);
        fs::create_dir_all(main_dir)?;

        let mut existing = 0;
        for entry in fs::read_dir(main_dir)? {
            if entry?
                .file_name()
                .to_string_lossy()
                .starts_with(&config.batch_dir)
            {
                existing += 1;
            }
        }

        let batch_dir = main_dir.join(indexed_name(&config.batch_dir, existing));
        fs::create_dir(&batch_dir).map_err(|err| match err.kind() {
            io::ErrorKind::AlreadyExists => SimError::ResultsConflict(format!(
                "batch directory {} already exists, possibly because an earlier batch was \
                 deleted; use a different batch_dir or restore the missing batch",
                batch_dir.display()
            )),
            _ => SimError::IoError(err),
        })?;
        info!("writing results to {}", batch_dir.display());

        Ok(ResultsWriter {
            batch_dir,
            run_filename: config.run_filename.clone(),
            runs_written: 0,
        })
    }

    pub fn batch_dir(&self) -> &Path {
        &self.batch_dir
    }

    pub fn runs_written(&self) -> usize {
        self.runs_written
    }

    /// Saves the parameter snapshot of the batch.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ResultsConflict` if a snapshot was already written.
    pub fn write_parameters(&self, parameters: &Parameters) -> Result<PathBuf, SimError> {
        let path = self.batch_dir.join(PARAMETERS_FILENAME);
        let mut file = create_new_file(&path)?;
        file.write_all(parameters.to_json_string()?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(path)
    }

    /// Writes `results` as the next run file of the batch.
    ///
    /// # Errors
    ///
    /// Returns `SimError::ResultsConflict` if the run file already exists, or an I/O or CSV
    /// error if writing fails.
    pub fn write_run(&mut self, results: &RunResults) -> Result<PathBuf, SimError> {
        let path = self
            .batch_dir
            .join(format!("{}.csv", indexed_name(&self.run_filename, self.runs_written)));
        let mut writer = Writer::from_writer(create_new_file(&path)?);
        for record in results.records() {
            writer.serialize(record)?;
        }
        writer.flush()?;
        self.runs_written += 1;
        debug!("wrote {} days to {}", results.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> ResultsParameters {
        ResultsParameters {
            main_results_dir: dir.join("results").to_string_lossy().into_owned(),
            ..ResultsParameters::default()
        }
    }

    fn sample_results() -> RunResults {
        RunResults {
            susceptible: vec![10, 9],
            infected: vec![0, 1],
            recovered: vec![0, 0],
            total_quarantined: vec![0, 2],
            quarantined_using_resources: vec![0, 1],
            total_isolated: vec![0, 0],
            isolated_using_resources: vec![0, 0],
            infectious: vec![0, 1],
        }
    }

    #[test]
    fn records_follow_the_series() {
        let records: Vec<DailyRecord> = sample_results().records().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].days, 1);
        assert_eq!(records[1].susceptible, 9);
        assert_eq!(records[1].total_quarantined, 2);
        assert_eq!(records[1].infectious, 1);
    }

    #[test]
    fn batches_are_indexed_sequentially() {
        let temp_dir = tempdir().unwrap();
        let config = config_in(temp_dir.path());
        let first = ResultsWriter::new(&config).unwrap();
        let second = ResultsWriter::new(&config).unwrap();
        assert!(first.batch_dir().ends_with("batch_00000"));
        assert!(second.batch_dir().ends_with("batch_00001"));
        assert!(second.batch_dir().is_dir());
    }

    #[test]
    fn missing_batch_is_a_conflict() {
        let temp_dir = tempdir().unwrap();
        let config = config_in(temp_dir.path());
        let first = ResultsWriter::new(&config).unwrap();
        let _second = ResultsWriter::new(&config).unwrap();
        fs::remove_dir(first.batch_dir()).unwrap();
        // One entry remains, so the next index is 1, which is taken.
        assert!(matches!(
            ResultsWriter::new(&config),
            Err(SimError::ResultsConflict(_))
        ));
    }

    #[test]
    fn run_files_have_fixed_header_and_rows() {
        let temp_dir = tempdir().unwrap();
        let mut writer = ResultsWriter::new(&config_in(temp_dir.path())).unwrap();
        let first = writer.write_run(&sample_results()).unwrap();
        let second = writer.write_run(&sample_results()).unwrap();
        assert!(first.ends_with("run_00000.csv"));
        assert!(second.ends_with("run_00001.csv"));
        assert_eq!(writer.runs_written(), 2);

        let text = fs::read_to_string(&first).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "days,susceptible,infected,recovered,total_quarantined,\
             quarantined_using_resources,total_isolated,isolated_using_resources,infectious"
        );
        assert_eq!(lines.next().unwrap(), "0,10,0,0,0,0,0,0,0");
        assert_eq!(lines.next().unwrap(), "1,9,1,0,2,1,0,0,1");
        assert!(lines.next().is_none());

        let mut reader = csv::Reader::from_path(&second).unwrap();
        let records: Vec<DailyRecord> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(records, sample_results().records().collect::<Vec<_>>());
    }

    #[test]
    fn run_files_are_never_overwritten() {
        let temp_dir = tempdir().unwrap();
        let mut writer = ResultsWriter::new(&config_in(temp_dir.path())).unwrap();
        fs::write(writer.batch_dir().join("run_00000.csv"), "keep me").unwrap();
        assert!(matches!(
            writer.write_run(&sample_results()),
            Err(SimError::ResultsConflict(_))
        ));
        assert_eq!(
            fs::read_to_string(writer.batch_dir().join("run_00000.csv")).unwrap(),
            "keep me"
        );
    }

    #[test]
    fn parameter_snapshot_is_written_once() {
        let temp_dir = tempdir().unwrap();
        let writer = ResultsWriter::new(&config_in(temp_dir.path())).unwrap();
        let path = writer.write_parameters(&Parameters::default()).unwrap();
        let reloaded = Parameters::from_json_file(&path).unwrap();
        assert_eq!(reloaded, Parameters::default());
        assert!(matches!(
            writer.write_parameters(&Parameters::default()),
            Err(SimError::ResultsConflict(_))
        ));
    }
}
