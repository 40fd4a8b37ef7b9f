//! Locating external programs.
//!
//! Used to resolve `cmd:` schema providers and to check that the generator's
//! toolchain is installed before the first cycle runs.

use std::path::{Path, PathBuf};

/// Result of looking up a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Found and runnable.
    Executable(PathBuf),
    /// A file with that name exists but lacks execute permission.
    NotExecutable(PathBuf),
    /// Nothing with that name was found.
    Missing,
}

impl Lookup {
    /// Returns the runnable path, if any.
    #[must_use]
    pub fn executable(self) -> Option<PathBuf> {
        match self {
            Self::Executable(path) => Some(path),
            Self::NotExecutable(_) | Self::Missing => None,
        }
    }
}

/// Returns the directories listed in `PATH`.
#[must_use]
pub fn path_dirs() -> Vec<PathBuf> {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).collect())
        .unwrap_or_default()
}

/// Looks up `program` the way a shell would.
///
/// A program containing a path separator is checked directly, relative to
/// `base_dir`; a bare name is searched in `PATH`.
#[must_use]
pub fn lookup_program(program: &str, base_dir: &Path) -> Lookup {
    if program.contains('/') || program.contains(std::path::MAIN_SEPARATOR) {
        let candidate = base_dir.join(program);
        return if !candidate.is_file() {
            Lookup::Missing
        } else if is_executable(&candidate) {
            Lookup::Executable(candidate)
        } else {
            Lookup::NotExecutable(candidate)
        };
    }

    match which::which(program) {
        Ok(path) => Lookup::Executable(path),
        // Only scan by hand to tell a non-executable match from no match.
        Err(_) => lookup_in(program, &path_dirs()),
    }
}

/// Searches `dirs` for `program`, preferring runnable matches.
#[must_use]
pub fn lookup_in(program: &str, dirs: &[PathBuf]) -> Lookup {
    let mut not_executable = None;
    for dir in dirs {
        for name in candidate_names(program) {
            let candidate = dir.join(&name);
            if !candidate.is_file() {
                continue;
            }
            if is_executable(&candidate) {
                return Lookup::Executable(candidate);
            }
            not_executable.get_or_insert(candidate);
        }
    }
    not_executable.map_or(Lookup::Missing, Lookup::NotExecutable)
}

/// Returns the runnable path of `program` in `PATH`, if any.
#[must_use]
pub fn find_executable(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}

#[cfg(windows)]
fn candidate_names(program: &str) -> Vec<String> {
    [".exe", ".cmd", ".bat", ".com", ""]
        .iter()
        .map(|ext| format!("{program}{ext}"))
        .collect()
}

#[cfg(not(windows))]
fn candidate_names(program: &str) -> [String; 1] {
    [program.to_owned()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .is_ok_and(|metadata| metadata.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, mode: u32) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").expect("should write file");
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).expect("should chmod");
        path
    }

    #[test]
    fn test_lookup_in_finds_executable() {
        let temp = TempDir::new().expect("should create temp dir");
        let exe = write_file(temp.path(), "export-schema", 0o755);

        let lookup = lookup_in("export-schema", &[temp.path().to_path_buf()]);
        assert_eq!(lookup, Lookup::Executable(exe));
    }

    #[test]
    fn test_lookup_in_reports_non_executable() {
        let temp = TempDir::new().expect("should create temp dir");
        let file = write_file(temp.path(), "export-schema", 0o644);

        let lookup = lookup_in("export-schema", &[temp.path().to_path_buf()]);
        assert_eq!(lookup, Lookup::NotExecutable(file));
    }

    #[test]
    fn test_lookup_in_prefers_later_executable() {
        let first = TempDir::new().expect("should create temp dir");
        let second = TempDir::new().expect("should create temp dir");
        write_file(first.path(), "tool", 0o644);
        let exe = write_file(second.path(), "tool", 0o700);

        let dirs = [first.path().to_path_buf(), second.path().to_path_buf()];
        assert_eq!(lookup_in("tool", &dirs), Lookup::Executable(exe));
    }

    #[test]
    fn test_lookup_in_missing() {
        let temp = TempDir::new().expect("should create temp dir");
        assert_eq!(
            lookup_in("definitely-not-here", &[temp.path().to_path_buf()]),
            Lookup::Missing
        );
    }

    #[test]
    fn test_lookup_program_relative_path() {
        let temp = TempDir::new().expect("should create temp dir");
        fs::create_dir(temp.path().join("bin")).expect("should create dir");
        let exe = write_file(&temp.path().join("bin"), "schema.sh", 0o755);

        assert_eq!(
            lookup_program("./bin/schema.sh", temp.path()),
            Lookup::Executable(temp.path().join("./bin/schema.sh"))
        );
        assert!(exe.exists());
        assert_eq!(lookup_program("./bin/other.sh", temp.path()), Lookup::Missing);
    }

    #[test]
    fn test_find_executable_on_path() {
        assert!(find_executable("sh").is_some());
        assert!(find_executable("tsgen-test-no-such-program").is_none());
        assert_eq!(
            lookup_program("tsgen-test-no-such-program", Path::new(".")),
            Lookup::Missing
        );
    }
}
