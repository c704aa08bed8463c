//! Build configuration handed to the step by its caller.

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::paths::find_in_system_path;

/// Build argument that gates the step. Packing is disabled unless it is set
/// to something other than [`OPT_OUT_DEFAULT`].
pub const OPT_OUT_ARGUMENT: &str = "no_upx";

/// Default value of [`OPT_OUT_ARGUMENT`].
pub const OPT_OUT_DEFAULT: &str = "1";

/// Name of the packer executable looked up on `PATH`.
pub const PACKER_NAME: &str = "upx";

/// Host platform, as far as the step cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    Unix,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }

    /// Path of the null device.
    pub fn null_device(&self) -> &'static str {
        match self {
            Platform::Windows => "nul",
            Platform::Unix => "/dev/null",
        }
    }

    /// Shell suffix discarding stdout.
    pub fn discard_stdout(&self) -> String {
        format!(">{}", self.null_device())
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Windows => write!(f, "win32"),
            Platform::Unix => write!(f, "posix"),
        }
    }
}

/// Explicit build environment: arguments, platform, and the discovered packer.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub arguments: BTreeMap<String, String>,
    pub platform: Platform,
    pub packer: Option<PathBuf>,
}

impl BuildConfig {
    pub fn new(platform: Platform) -> Self {
        Self {
            arguments: BTreeMap::new(),
            platform,
            packer: None,
        }
    }

    /// Configuration for the current host, with the packer looked up on `PATH`.
    pub fn from_environment(arguments: BTreeMap<String, String>) -> Self {
        Self {
            arguments,
            platform: Platform::current(),
            packer: find_in_system_path(PACKER_NAME),
        }
    }

    pub fn with_argument(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    pub fn with_packer(mut self, packer: impl Into<PathBuf>) -> Self {
        self.packer = Some(packer.into());
        self
    }

    pub fn argument(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).map(String::as_str)
    }

    /// Whether the opt-out argument was moved off its default.
    pub fn upx_opted_in(&self) -> bool {
        self.argument(OPT_OUT_ARGUMENT).unwrap_or(OPT_OUT_DEFAULT) != OPT_OUT_DEFAULT
    }
}

/// Parse a `KEY=VALUE` build argument. The value may be empty or contain `=`.
pub fn parse_argument(raw: &str) -> Result<(String, String)> {
    let Some((key, value)) = raw.split_once('=') else {
        bail!("Invalid build argument '{}': expected KEY=VALUE", raw);
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("Invalid build argument '{}': empty key", raw);
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opt_in_default_disabled() {
        let config = BuildConfig::new(Platform::Unix);
        assert!(!config.upx_opted_in());
    }

    #[test]
    fn test_opt_in_explicit_default_disabled() {
        let config = BuildConfig::new(Platform::Unix).with_argument(OPT_OUT_ARGUMENT, "1");
        assert!(!config.upx_opted_in());
    }

    #[test]
    fn test_opt_in_other_values() {
        for value in ["0", "", "yes", "true"] {
            let config = BuildConfig::new(Platform::Unix).with_argument(OPT_OUT_ARGUMENT, value);
            assert!(config.upx_opted_in(), "value {:?} should opt in", value);
        }
    }

    #[test]
    fn test_unrelated_argument_ignored() {
        let config = BuildConfig::new(Platform::Unix).with_argument("debug", "0");
        assert!(!config.upx_opted_in());
        assert_eq!(config.argument("debug"), Some("0"));
    }

    #[test]
    fn test_parse_argument() {
        assert_eq!(
            parse_argument("no_upx=0").unwrap(),
            ("no_upx".to_string(), "0".to_string())
        );
        assert_eq!(
            parse_argument("flags=a=b").unwrap(),
            ("flags".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_argument("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
    }

    #[test]
    fn test_parse_argument_invalid() {
        assert!(parse_argument("no_upx").is_err());
        let err = parse_argument("=0").unwrap_err();
        assert!(err.to_string().contains("empty key"));
    }

    #[test]
    fn test_null_device() {
        assert_eq!(Platform::Windows.null_device(), "nul");
        assert_eq!(Platform::Unix.null_device(), "/dev/null");
        assert_eq!(Platform::Windows.discard_stdout(), ">nul");
        assert_eq!(Platform::Unix.discard_stdout(), ">/dev/null");
    }
}
