use std::fmt::{self, Display};
use std::sync::Arc;

use crate::snapshot_testing::SnapshotError;

/// Outcome of one scheduled test.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Passed,
    Failed,
    Skipped,
    ResourceDenied,
    /// Passed, but left stray files next to its input.
    EnvChanged,
}

impl State {
    pub fn is_ok(self) -> bool {
        matches!(self, State::Passed)
    }

    pub fn is_skip(self) -> bool {
        matches!(self, State::Skipped | State::ResourceDenied)
    }
}

impl Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            State::Passed => "passed",
            State::Failed => "failed",
            State::Skipped => "skipped",
            State::ResourceDenied => "skipped (resource denied)",
            State::EnvChanged => "passed but changed its environment",
        };
        f.write_str(text)
    }
}

pub struct TestError {
    pub expect_code: i32,
    pub actual_code: Option<i32>, // None when the process was killed by a signal
    pub actual_stderr: Arc<str>,
    pub stderr_snapshot_result: Result<(), SnapshotError>,
}

impl Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self
            .actual_code
            .is_none_or(|actual_code| actual_code != self.expect_code)
        {
            write!(
                f,
                "Expected return code: {} Actual return code: ",
                self.expect_code,
            )?;
            match self.actual_code {
                Some(code) => writeln!(f, "{}", code)?,
                None => writeln!(f, "none")?,
            }
        }

        if let Err(error) = &self.stderr_snapshot_result {
            writeln!(f, "Standard error is different than expected:\n{}", error)?;
        } else if !self.actual_stderr.is_empty() {
            writeln!(f, "with error message:\n{}", &self.actual_stderr)?;
        }

        Ok(())
    }
}

pub struct TestResult {
    /// Index of the test in the database it was registered in.
    pub test_index: usize,
    pub state: State,
    /// Failure detail, present only for `State::Failed`.
    pub error: Option<TestError>,
    /// Captured standard output of the test command.
    pub stdout: String,
}

/// Results of the run so far, bucketed by outcome. The progress display
/// reads the failure count from here while tests are still running.
#[derive(Default)]
pub struct TestResults {
    pub passed: Vec<TestResult>,
    pub bad: Vec<TestResult>,
    pub skipped: Vec<TestResult>,
    pub resource_denied: Vec<TestResult>,
    pub env_changed: Vec<TestResult>,
}

impl TestResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: TestResult) {
        let bucket = match result.state {
            State::Passed => &mut self.passed,
            State::Failed => &mut self.bad,
            State::Skipped => &mut self.skipped,
            State::ResourceDenied => &mut self.resource_denied,
            State::EnvChanged => &mut self.env_changed,
        };
        bucket.push(result);
    }

    /// Failure count shown in the progress counter.
    pub fn fails(&self) -> usize {
        self.bad.len() + self.env_changed.len()
    }

    pub fn total(&self) -> usize {
        self.passed.len()
            + self.bad.len()
            + self.skipped.len()
            + self.resource_denied.len()
            + self.env_changed.len()
    }

    pub fn all_passed(&self) -> bool {
        self.bad.is_empty() && self.env_changed.is_empty()
    }
}
