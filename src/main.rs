use sirqis::runner::run_with_args;

fn main() {
    // Try running the following:
    // sirqis --num-runs 10 --num-days 60 --random-seed 42
    // sirqis --config config/parameters.json --output-dir /tmp/results --log-level info
    match run_with_args() {
        Ok(outcome) => {
            println!(
                "Wrote {} runs to {}",
                outcome.runs_written,
                outcome.batch_dir.display()
            );
        }
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
