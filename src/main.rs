mod colors;
mod global_configuration;
mod load;
mod progress_log;
mod results;
mod snapshot_testing;
mod test_configuration;
mod test_database;
mod test_detector;
mod test_reporter;
mod test_runner;
mod utils;

use std::process::{exit, Command, ExitCode};

use crate::{
    global_configuration::global_config, progress_log::Logger, test_detector::detect_tests,
    test_reporter::report_tests, test_runner::run_tests,
};

// Every test command goes through `sh -c`; bail out early when no usable
// shell is on PATH.
fn check_shell() {
    let output = Command::new("sh").args(["-c", "true"]).output();

    match output {
        Ok(output) => {
            if !output.status.success() {
                eprintln!("sh is present but cannot run commands");
                exit(1);
            }
        }
        Err(error) => {
            eprintln!("Failed to run sh");
            eprintln!("Cause: {}", error);
            exit(1);
        }
    }
}

fn main() -> ExitCode {
    check_shell();

    let database: &'static _ = Box::leak(Box::new(detect_tests()));
    let mut logger = Logger::new(global_config());

    let test_output = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(run_tests(database, &mut logger));

    report_tests(database, test_output)
}
