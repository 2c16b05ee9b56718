use crate::global_configuration::global_config;
use crate::progress_log::Logger;
use crate::results::{State, TestError, TestResult, TestResults};
use crate::snapshot_testing::snapshot_match;
use crate::test_configuration::TestConfig;
use crate::test_database::TestDatabase;
use futures::stream::{FuturesUnordered, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

// Exit code a test command uses to report being skipped
const SKIP_EXIT_CODE: i32 = 77;

/// Shape of the planned run, as far as the progress display cares.
pub struct RunPlan {
    pub forever: bool,
    pub total: usize,
}

pub struct TestsOutput {
    pub results: TestResults,
    pub time: Duration,
}

pub async fn run_tests(database: &'static TestDatabase, logger: &mut Logger) -> TestsOutput {
    let start = std::time::Instant::now();
    let config = global_config();

    let plan = RunPlan {
        forever: config.forever,
        total: database.tests().len(),
    };
    logger.set_tests(&plan);
    logger.start_load_tracker();

    if plan.forever {
        logger.log(&format!(
            "Run {} tests forever using {} parallel jobs",
            plan.total, config.jobs
        ));
    } else {
        logger.log(&format!(
            "Run {} tests using {} parallel jobs",
            plan.total, config.jobs
        ));
    }

    let mut results = TestResults::new();
    let mut completed = 0;

    loop {
        run_pass(database, logger, &mut results, &mut completed).await;
        if !config.forever || !results.all_passed() || database.tests().is_empty() {
            break;
        }
    }

    logger.stop_load_tracker();

    TestsOutput {
        results,
        time: start.elapsed(),
    }
}

/// Run every registered test once, at most `jobs` at a time. Completions
/// are consumed here, on the control task, so the logger sees them one by
/// one in finishing order.
async fn run_pass(
    database: &'static TestDatabase,
    logger: &mut Logger,
    results: &mut TestResults,
    completed: &mut usize,
) {
    let jobs = global_config().jobs.max(1);
    let mut queue = database.tests().iter().copied().enumerate();
    let mut running = FuturesUnordered::new();

    loop {
        while running.len() < jobs {
            let Some((test_index, config)) = queue.next() else {
                break;
            };
            running.push(tokio::spawn(run_test(database, config, test_index)));
        }

        let Some(finished) = running.next().await else {
            break;
        };
        let result = finished.expect("test task panicked");
        *completed += 1;
        report_one(database, logger, results, *completed, result);
    }
}

async fn run_test(
    database: &'static TestDatabase,
    config: TestConfig,
    test_index: usize,
) -> TestResult {
    let denied = database
        .get_string_list(config.resources)
        .iter()
        .any(|resource| !global_config().use_resources.contains(resource));
    if denied {
        return TestResult {
            test_index,
            state: State::ResourceDenied,
            error: None,
            stdout: String::new(),
        };
    }

    let config = config.override_by_file(database, config.path);
    let path = database.get_path(config.path);

    let command = database
        .get_command(config.command)
        .replace("{filename}", &path.display().to_string())
        .replace("{base}", &path.with_extension("").display().to_string());

    let output = tokio::process::Command::new("sh")
        .current_dir(database.get_path(config.working_dir))
        .args(["-c", &command])
        .output()
        .await
        .expect("Failed to run test command");

    let actual_code = output.status.code();

    let actual_stderr = String::from_utf8_lossy(&output.stderr);
    let actual_stderr =
        actual_stderr.replace(global_config().base_dir.to_str().unwrap(), "{{base_dir}}");
    let actual_stderr: Arc<str> = Arc::from(actual_stderr);

    let mut stderr_snapshot_result = Ok(());
    if config.snapshot_test_stderr {
        let approved_path = path.with_extension("stderr.approved.txt");
        stderr_snapshot_result = snapshot_match(actual_stderr.clone(), &approved_path).await;
    }

    for extension in database.get_string_list(config.cleanup) {
        let _ = tokio::fs::remove_file(path.with_extension(extension)).await;
    }

    let state = if actual_code == Some(SKIP_EXIT_CODE) {
        State::Skipped
    } else if actual_code.is_none_or(|code| code != config.expect_code)
        || stderr_snapshot_result.is_err()
    {
        State::Failed
    } else if leaves_stray_files(database, &config, path).await {
        State::EnvChanged
    } else {
        State::Passed
    };

    let error = (state == State::Failed).then(|| TestError {
        expect_code: config.expect_code,
        actual_code,
        actual_stderr,
        stderr_snapshot_result,
    });

    TestResult {
        test_index,
        state,
        error,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    }
}

/// A passing test that leaves files next to its input, beyond the declared
/// generated files and approved snapshots, counts as changing its
/// environment.
async fn leaves_stray_files(database: &TestDatabase, config: &TestConfig, path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return false;
    };
    let Some(parent) = path.parent() else {
        return false;
    };
    let cleanup = database.get_string_list(config.cleanup);

    let Ok(mut entries) = tokio::fs::read_dir(parent).await else {
        return false;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let candidate = entry.path();
        if candidate == path {
            continue;
        }
        let Some(name) = candidate.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        if name != stem && !name.starts_with(&format!("{}.", stem)) {
            continue;
        }
        if name.ends_with(".approved.txt") {
            continue;
        }
        if cleanup
            .iter()
            .any(|extension| candidate == path.with_extension(extension))
        {
            continue;
        }
        return true;
    }

    false
}

fn report_one(
    database: &TestDatabase,
    logger: &mut Logger,
    results: &mut TestResults,
    completed: usize,
    mut result: TestResult,
) {
    let config = database.tests()[result.test_index];
    let state = result.state;
    let text = format!(
        "{} {}",
        test_name(database, &config),
        logger.state_color(&state.to_string(), Some(state))
    );

    let stdout = std::mem::take(&mut result.stdout);
    results.record(result);

    if state == State::Passed && global_config().quiet {
        return;
    }

    let captured = (state == State::Failed && !stdout.is_empty()).then_some(stdout.as_str());
    logger.display_progress(results, completed, &text, captured);
}

/// Short display name: path relative to the base folder, plus the command
/// name when one file expands into several tests.
pub fn test_name(database: &TestDatabase, config: &TestConfig) -> String {
    let path = database.get_path(config.path);
    let suffix = database.get_string(config.suffix);

    let relative = path.strip_prefix(&global_config().base_dir).unwrap_or(path);
    if suffix.is_empty() {
        relative.display().to_string()
    } else {
        format!("{}[{}]", relative.display(), suffix)
    }
}
