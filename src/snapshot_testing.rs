use colored::{Color, Colorize};
use similar::{ChangeTag, TextDiff};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct SnapshotError {
    pub actual: Arc<str>,
    pub expected: std::io::Result<String>,
    pub expected_path: PathBuf,
}

fn write_line_number(f: &mut fmt::Formatter<'_>, index: Option<usize>) -> fmt::Result {
    match index {
        Some(index) => write!(f, "{:<4}", index + 1),
        None => write!(f, "    "),
    }
}

fn write_diff(f: &mut fmt::Formatter<'_>, expected: &str, actual: &str) -> fmt::Result {
    let diff = TextDiff::from_lines(expected, actual);

    for change in diff.iter_all_changes() {
        let (sign, color) = match change.tag() {
            ChangeTag::Delete => ("-", Some(Color::Red)),
            ChangeTag::Insert => ("+", Some(Color::Green)),
            ChangeTag::Equal => (" ", None),
        };

        write_line_number(f, change.old_index())?;
        write!(f, " ")?;
        write_line_number(f, change.new_index())?;
        write!(f, " |")?;

        let line = format!("{}{}", sign, change);
        match color {
            Some(color) => write!(f, "{}", line.color(color))?,
            None => write!(f, "{}", line)?,
        }
    }

    Ok(())
}

impl Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expected {
            Ok(expected) => write_diff(f, expected, self.actual.as_ref()),
            Err(error) => {
                writeln!(f, "failed to open {}", self.expected_path.display())?;
                writeln!(f, "{}", error)?;
                write_diff(f, "", self.actual.as_ref())
            }
        }
    }
}

pub async fn snapshot_match(actual: Arc<str>, expected_path: &Path) -> Result<(), SnapshotError> {
    let expected = tokio::fs::read_to_string(expected_path).await;

    if expected
        .as_ref()
        .is_ok_and(|expected| expected == actual.as_ref())
    {
        return Ok(());
    }

    Err(SnapshotError {
        actual,
        expected,
        expected_path: expected_path.to_path_buf(),
    })
}
