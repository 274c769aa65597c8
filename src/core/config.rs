use std::path::PathBuf;
use crate::core::error::{Error, Result};

/// One of the two ways to point the Index Store at its data: a real
/// directory on disk, or an in-memory directory for tests (`useramdir`).
#[derive(Debug, Clone)]
pub enum Directory {
    OnDisk(PathBuf),
    InMemory,
}

/// Resolved configuration for an `IndexStore`, plus the writer/reader tuning
/// knobs the underlying segment engine needs. `lucenedir`/`useramdir`,
/// `analyzer`, and `incompletequeryfail` come straight from spec.md §6.3;
/// the rest is ambient engine tuning with no counterpart in the property
/// file.
#[derive(Debug, Clone)]
pub struct Config {
    pub directory: Directory,
    pub analyzer: String,
    pub incomplete_query_fails: bool,

    pub writer_batch_size: usize,
    pub writer_commit_interval_secs: u64,
    pub writer_max_segment_size: usize,
    pub max_readers: usize,
}

impl Config {
    /// Parses `key=value` lines: `#`-prefixed and blank lines are ignored.
    /// Exactly one of `lucenedir` / `useramdir` must be present. Unknown
    /// keys are logged at `debug` and otherwise ignored, matching the
    /// original property file's tolerant handling.
    pub fn from_properties(text: &str) -> Result<Self> {
        let mut lucenedir: Option<PathBuf> = None;
        let mut useramdir = false;
        let mut analyzer = "standard".to_string();
        let mut incomplete_query_fails = true;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                log::debug!("ignoring malformed config line: {line}");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "lucenedir" => lucenedir = Some(PathBuf::from(value)),
                "useramdir" => useramdir = value.eq_ignore_ascii_case("true"),
                "analyzer" => analyzer = value.to_string(),
                "incompletequeryfail" => {
                    incomplete_query_fails = value.eq_ignore_ascii_case("true")
                }
                other => log::debug!("ignoring unknown config key: {other}"),
            }
        }

        let directory = match (lucenedir, useramdir) {
            (Some(_), true) => {
                return Err(Error::ConfigError(
                    "exactly one of lucenedir or useramdir must be set, got both".to_string(),
                ));
            }
            (Some(path), false) => Directory::OnDisk(path),
            (None, true) => Directory::InMemory,
            (None, false) => {
                return Err(Error::ConfigError(
                    "exactly one of lucenedir or useramdir must be set".to_string(),
                ));
            }
        };

        Ok(Config {
            directory,
            analyzer,
            incomplete_query_fails,
            ..Config::default()
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            directory: Directory::InMemory,
            analyzer: "standard".to_string(),
            incomplete_query_fails: true,
            writer_batch_size: 1000,
            writer_commit_interval_secs: 60,
            writer_max_segment_size: 50 * 1024 * 1024,
            max_readers: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_on_disk_directory() {
        let cfg = Config::from_properties("lucenedir=/var/index\nanalyzer=standard\n").unwrap();
        assert!(matches!(cfg.directory, Directory::OnDisk(p) if p == PathBuf::from("/var/index")));
    }

    #[test]
    fn parses_in_memory_directory() {
        let cfg = Config::from_properties("useramdir=true\n").unwrap();
        assert!(matches!(cfg.directory, Directory::InMemory));
    }

    #[test]
    fn rejects_missing_directory() {
        let err = Config::from_properties("analyzer=standard\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn rejects_both_directories() {
        let err = Config::from_properties("lucenedir=/x\nuseramdir=true\n").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let cfg = Config::from_properties("# comment\n\nuseramdir=true\n").unwrap();
        assert!(matches!(cfg.directory, Directory::InMemory));
    }

    #[test]
    fn incomplete_query_fail_defaults_true() {
        let cfg = Config::from_properties("useramdir=true\n").unwrap();
        assert!(cfg.incomplete_query_fails);
    }
}
