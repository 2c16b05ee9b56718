use crate::test_runner::{test_name, TestsOutput};
use crate::utils::format_duration;
use crate::{global_configuration::global_config, test_database::TestDatabase};
use colored::Colorize;
use std::{
    io::{stdout, Write},
    process::ExitCode,
};

fn yes_or_no_input(prompt: &str) -> bool {
    let stdin = std::io::stdin();

    loop {
        print!("{}", prompt);
        stdout().flush().unwrap();
        let mut buffer = String::new();
        stdin.read_line(&mut buffer).unwrap();

        match buffer.trim_end() {
            "y" | "yes" => return true,
            "n" | "no" => return false,
            _ => {}
        }
    }
}

pub fn report_tests(database: &TestDatabase, test_output: TestsOutput) -> ExitCode {
    let results = &test_output.results;

    for result in &results.bad {
        let config = database.tests()[result.test_index];
        println!("{}: {}:", test_name(database, &config), "Failed".red().bold());

        let Some(error) = &result.error else { continue };
        println!("{error}");

        if let Err(snapshot_error) = &error.stderr_snapshot_result {
            if global_config().interactive && yes_or_no_input("overwrite approved file [yes/no]? ")
            {
                std::fs::write(&snapshot_error.expected_path, snapshot_error.actual.as_ref())
                    .unwrap();
            }
        }
    }

    for result in &results.env_changed {
        let config = database.tests()[result.test_index];
        println!(
            "{}: {}",
            test_name(database, &config),
            "passed but left stray files behind".yellow()
        );
    }

    if !results.skipped.is_empty() {
        println!("{} tests skipped", results.skipped.len());
    }
    if !results.resource_denied.is_empty() {
        println!(
            "{} tests skipped (resource not enabled)",
            results.resource_denied.len()
        );
    }

    let total = results.total();
    println!(
        "{} tests executed in: {}",
        total,
        format_duration(test_output.time)
    );

    if total == 0 {
        println!("{}", "no tests ran".red().bold());
        return ExitCode::FAILURE;
    }

    let result_string = format!("[{}/{}] tests pass", total - results.fails(), total);
    if results.all_passed() {
        println!("{}", result_string.green().bold());
        ExitCode::SUCCESS
    } else {
        println!("{}", result_string.red().bold());
        ExitCode::FAILURE
    }
}
