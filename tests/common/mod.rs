//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

/// Directory holding on-disk test fixtures.
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Path to a named fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// A configuration file that loads and validates cleanly.
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// A configuration file that parses but fails validation.
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_dir_exists() {
        assert!(fixtures_dir().exists(), "tests/fixtures directory missing");
    }

    #[test]
    fn test_valid_config_fixture_exists() {
        assert!(valid_config_fixture().exists());
    }

    #[test]
    fn test_invalid_config_fixture_exists() {
        assert!(invalid_config_fixture().exists());
    }
}
