use crate::global_configuration::global_config;
use crate::test_configuration::TestConfig;
use crate::test_database::{PathHandle, TestDatabase};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::{read_dir, File};
use std::io::Read;
use std::path::Path;

#[derive(Deserialize, Debug)]
struct TestTomlConfig {
    command: String,

    #[serde(default)]
    return_code: i32,

    // Extension of the files in this directory that are tests
    #[serde(default = "default_extension")]
    extension: String,

    #[serde(default)]
    snapshot_test_stderr: bool,

    // Resources the tests need enabled with --use
    #[serde(default)]
    resources: Vec<String>,

    // Extensions of generated files to remove after each run
    #[serde(default)]
    cleanup: Vec<String>,
}

fn default_extension() -> String {
    "test".to_string()
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum TestTomlFile {
    Flat(TestTomlConfig),
    Nested {
        commands: HashMap<String, TestTomlConfig>,
    },
}

fn detect_tests_with_command(
    database: &mut TestDatabase,
    current_dir_handle: PathHandle,
    toml_config: &TestTomlConfig,
    suffix: &str,
) {
    let command = database.add_command(toml_config.command.clone());
    let suffix = database.add_string(suffix.to_string());
    let resources = database.add_string_list(toml_config.resources.clone());
    let cleanup = database.add_string_list(toml_config.cleanup.clone());

    let current_dir = database.get_path(current_dir_handle).to_path_buf();

    for entry in read_dir(&current_dir).unwrap() {
        let path = entry.unwrap().path();

        if path
            .extension()
            .is_some_and(|extension| extension == toml_config.extension.as_str())
        {
            let path = database.add_path(path);
            database.add_test(TestConfig {
                path,
                command,
                expect_code: toml_config.return_code,
                suffix,
                working_dir: current_dir_handle,
                snapshot_test_stderr: toml_config.snapshot_test_stderr,
                resources,
                cleanup,
            });
        }
    }
}

fn read_test_config_file(directory: &Path) -> Option<TestTomlFile> {
    let file_path = directory.join("test_config.toml");
    let mut file = match File::open(&file_path) {
        Ok(file) => file,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return None,
        Err(error) => panic!("Failed to open {}: {}", file_path.display(), error),
    };

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .expect("Failed to read test toml");

    Some(toml::from_str(&contents).expect("Failed to parse test toml"))
}

fn detect_tests_in(
    database: &mut TestDatabase,
    current_dir_handle: PathHandle,
    parent_config_file: Option<&TestTomlFile>,
) {
    let current_dir = database.get_path(current_dir_handle).to_path_buf();

    // A directory without its own config inherits the closest ancestor's
    let config_file = read_test_config_file(&current_dir);
    let config_file = config_file.as_ref().or(parent_config_file);

    for entry in read_dir(&current_dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            let path_handle = database.add_path(path);
            detect_tests_in(database, path_handle, config_file);
        }
    }

    if let Some(config_file) = config_file {
        match config_file {
            TestTomlFile::Flat(config) => {
                detect_tests_with_command(database, current_dir_handle, config, "")
            }
            TestTomlFile::Nested { commands } => {
                for (name, command) in commands {
                    detect_tests_with_command(database, current_dir_handle, command, name)
                }
            }
        }
    }
}

pub fn detect_tests() -> TestDatabase {
    detect_tests_under(&global_config().base_dir)
}

fn detect_tests_under(base_dir: &Path) -> TestDatabase {
    let mut database = TestDatabase::new();

    let base_folder = database.add_path(base_dir.to_path_buf());
    detect_tests_in(&mut database, base_folder, None);

    database
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn registers_files_matching_the_configured_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test_config.toml"),
            "command = \"cat {filename}\"\nextension = \"txt\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();
        fs::write(dir.path().join("b.txt"), "").unwrap();
        fs::write(dir.path().join("notes.log"), "").unwrap();

        let database = detect_tests_under(dir.path());
        assert_eq!(database.tests().len(), 2);
    }

    #[test]
    fn nested_commands_register_every_file_once_per_command() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test_config.toml"),
            concat!(
                "[commands.run]\n",
                "command = \"sh {filename}\"\n",
                "extension = \"sh\"\n",
                "[commands.lint]\n",
                "command = \"sh -n {filename}\"\n",
                "extension = \"sh\"\n",
            ),
        )
        .unwrap();
        fs::write(dir.path().join("a.sh"), "").unwrap();
        fs::write(dir.path().join("b.sh"), "").unwrap();

        let database = detect_tests_under(dir.path());
        assert_eq!(database.tests().len(), 4);

        let suffixes: Vec<_> = database
            .tests()
            .iter()
            .map(|config| database.get_string(config.suffix))
            .collect();
        assert!(suffixes.contains(&"run"));
        assert!(suffixes.contains(&"lint"));
    }

    #[test]
    fn subdirectories_inherit_the_parent_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test_config.toml"),
            "command = \"cat {filename}\"\nextension = \"txt\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("top.txt"), "").unwrap();

        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("inner.txt"), "").unwrap();

        let database = detect_tests_under(dir.path());
        assert_eq!(database.tests().len(), 2);
    }

    #[test]
    fn directories_without_any_config_register_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "").unwrap();

        let database = detect_tests_under(dir.path());
        assert!(database.tests().is_empty());
    }

    #[test]
    fn config_fields_are_carried_onto_each_test() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test_config.toml"),
            concat!(
                "command = \"{base}.out < {filename}\"\n",
                "return_code = 1\n",
                "extension = \"txt\"\n",
                "snapshot_test_stderr = true\n",
                "resources = [\"network\"]\n",
                "cleanup = [\"out\"]\n",
            ),
        )
        .unwrap();
        fs::write(dir.path().join("case.txt"), "").unwrap();

        let database = detect_tests_under(dir.path());
        let config = database.tests()[0];
        assert_eq!(config.expect_code, 1);
        assert!(config.snapshot_test_stderr);
        assert_eq!(
            database.get_string_list(config.resources),
            ["network".to_string()]
        );
        assert_eq!(database.get_string_list(config.cleanup), ["out".to_string()]);
    }
}
