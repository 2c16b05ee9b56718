// Configuration of a single test

use crate::test_database::{
    CommandHandle, PathHandle, StringHandle, StringListHandle, TestDatabase,
};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::OnceLock;

#[derive(Copy, Clone)]
pub struct TestConfig {
    pub path: PathHandle,
    pub command: CommandHandle,
    // expected return code
    pub expect_code: i32,
    // Is non-empty when a test file has multiple configurations
    pub suffix: StringHandle,
    pub working_dir: PathHandle,

    // snapshot stderr
    pub snapshot_test_stderr: bool,

    // resources the test needs enabled with --use
    pub resources: StringListHandle,

    // extensions of generated files to remove after the run
    pub cleanup: StringListHandle,
}

fn return_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?://|#) *RETURN: *([0-9]+)$").unwrap())
}

impl TestConfig {
    // Override test config when finding related instructions in the test file
    pub fn override_by_file(&self, database: &TestDatabase, test_file_path: PathHandle) -> Self {
        let mut modified = *self;

        let return_re = return_regex();

        let test_file_path = database.get_path(test_file_path);
        let Ok(file) = File::open(test_file_path) else {
            return modified;
        };
        let reader = BufReader::new(file);

        let mut overrided_return = None;
        for line in reader.lines() {
            let Ok(line) = line else { break };
            if let Some(captures) = return_re.captures(&line) {
                overrided_return = Some(captures.get(1).unwrap().as_str().parse().unwrap());
            }
        }

        if let Some(overrided_return) = overrided_return {
            modified.expect_code = overrided_return;
        }

        modified
    }
}
