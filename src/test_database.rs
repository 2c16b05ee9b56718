use crate::test_configuration::TestConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PathHandle(u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CommandHandle(u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StringHandle(u32);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct StringListHandle(u32);

/// Interned storage for everything a registered test refers to, so that
/// `TestConfig` itself stays `Copy`. Command strings and resource lists are
/// shared between all tests of a directory.
pub struct TestDatabase {
    paths: Vec<PathBuf>,
    strings: Vec<String>,
    string_lists: Vec<Vec<String>>,
    tests: Vec<TestConfig>,
}

impl TestDatabase {
    pub fn new() -> Self {
        Self {
            paths: vec![],
            strings: vec![],
            string_lists: vec![],
            tests: vec![],
        }
    }

    #[must_use]
    pub fn add_path(&mut self, path: PathBuf) -> PathHandle {
        let index = self.paths.len();
        self.paths.push(path);
        PathHandle(u32::try_from(index).expect("path index too large!"))
    }

    #[must_use]
    pub fn get_path(&self, handle: PathHandle) -> &Path {
        &self.paths[handle.0 as usize]
    }

    #[must_use]
    pub fn add_command(&mut self, command: String) -> CommandHandle {
        let index = self.strings.len();
        self.strings.push(command);
        CommandHandle(u32::try_from(index).expect("command index too large!"))
    }

    #[must_use]
    pub fn get_command(&self, handle: CommandHandle) -> &str {
        &self.strings[handle.0 as usize]
    }

    #[must_use]
    pub fn add_string(&mut self, string: String) -> StringHandle {
        let index = self.strings.len();
        self.strings.push(string);
        StringHandle(u32::try_from(index).expect("string index too large!"))
    }

    #[must_use]
    pub fn get_string(&self, handle: StringHandle) -> &str {
        &self.strings[handle.0 as usize]
    }

    #[must_use]
    pub fn add_string_list(&mut self, list: Vec<String>) -> StringListHandle {
        let index = self.string_lists.len();
        self.string_lists.push(list);
        StringListHandle(u32::try_from(index).expect("string list index too large!"))
    }

    #[must_use]
    pub fn get_string_list(&self, handle: StringListHandle) -> &[String] {
        &self.string_lists[handle.0 as usize]
    }

    pub fn add_test(&mut self, test: TestConfig) {
        self.tests.push(test);
    }

    #[must_use]
    pub fn tests(&self) -> &[TestConfig] {
        &self.tests
    }
}
