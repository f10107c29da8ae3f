//! Include-path initialization and `#include` resolution.
//!
//! Search order for `"header"` includes: absolute path as-is, the
//! directory of the including file, then the configured path list (user
//! `-I` directories first, then `CDD_INCLUDE_PATH`, then `CDD_STDLIB_PATH`
//! and the first existing stdlib candidate, then `/usr/local/include` and
//! `/usr/include`), and finally the working directory. System `<header>`
//! includes skip the including file's directory.

use std::path::{Path, PathBuf};

use super::preprocessor::Preprocessor;

/// Probed in order; only the first existing directory is appended.
const STDLIB_CANDIDATES: &[&str] = &[
    "/usr/local/include/cdd",
    "/usr/include/cdd",
    "/opt/cdd/include",
    "../stdlib",
    "stdlib",
];

/// Build the search path list from user `-I` flags and the environment.
pub(super) fn build_include_paths(user_paths: &[String]) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = user_paths.iter().map(PathBuf::from).collect();

    if let Ok(env_paths) = std::env::var("CDD_INCLUDE_PATH") {
        for part in env_paths.split(':') {
            if !part.is_empty() {
                paths.push(PathBuf::from(part));
            }
        }
    }

    if let Ok(stdlib) = std::env::var("CDD_STDLIB_PATH") {
        let p = PathBuf::from(stdlib);
        if p.exists() {
            paths.push(p);
        }
    }

    for candidate in STDLIB_CANDIDATES {
        let p = PathBuf::from(candidate);
        if p.exists() {
            paths.push(p);
            break;
        }
    }

    paths.push(PathBuf::from("/usr/local/include"));
    paths.push(PathBuf::from("/usr/include"));
    paths
}

impl Preprocessor {
    /// Resolve a header name to an absolute path, or `None` if missing.
    pub(super) fn resolve_include(&self, header: &str, is_system: bool) -> Option<PathBuf> {
        let as_path = Path::new(header);
        if as_path.is_absolute() {
            return as_path.exists().then(|| as_path.to_path_buf());
        }

        if !is_system {
            let candidate = self.current_dir.join(header);
            if candidate.exists() {
                return Some(absolute(&candidate));
            }
        }

        for dir in &self.include_paths {
            let candidate = dir.join(header);
            if candidate.exists() {
                return Some(absolute(&candidate));
            }
        }

        if as_path.exists() {
            return Some(absolute(as_path));
        }

        None
    }

    /// Parse an `#include` line. Returns the header name and whether it
    /// used the `<...>` system form.
    pub(super) fn parse_include(line: &str) -> Option<(String, bool)> {
        let rest = line.trim_start().strip_prefix('#')?.trim_start();
        let rest = rest.strip_prefix("include")?.trim_start();
        let (open, close) = match rest.chars().next()? {
            '"' => ('"', '"'),
            '<' => ('<', '>'),
            _ => return None,
        };
        let inner = &rest[1..];
        let end = inner.find(close)?;
        Some((inner[..end].to_string(), open == '<'))
    }
}

/// Canonicalize where possible, fall back to the path itself for files
/// on filesystems where canonicalization fails.
pub(super) fn absolute(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quote_and_system_forms() {
        assert_eq!(
            Preprocessor::parse_include("#include \"a.h\""),
            Some(("a.h".to_string(), false))
        );
        assert_eq!(
            Preprocessor::parse_include("  #  include <stdio.h>"),
            Some(("stdio.h".to_string(), true))
        );
        assert_eq!(Preprocessor::parse_include("#define X"), None);
        assert_eq!(Preprocessor::parse_include("#include x"), None);
    }

    #[test]
    fn user_paths_come_first() {
        let paths = build_include_paths(&["/tmp/first".to_string(), "/tmp/second".to_string()]);
        assert_eq!(paths[0], PathBuf::from("/tmp/first"));
        assert_eq!(paths[1], PathBuf::from("/tmp/second"));
        assert_eq!(paths[paths.len() - 2], PathBuf::from("/usr/local/include"));
        assert_eq!(paths[paths.len() - 1], PathBuf::from("/usr/include"));
    }
}
