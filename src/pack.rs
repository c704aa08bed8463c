//! External packer invocation.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::config::Platform;

/// Flags passed to UPX on every run: best compression, quiet.
pub const UPX_FLAGS: [&str; 2] = ["--best", "-q"];

/// Result of one packer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackStatus {
    Success,
    /// Non-zero exit code. A packer killed by a signal reports 1.
    Failed(i32),
}

impl PackStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PackStatus::Success)
    }

    /// Exit code to hand back to the build tool.
    pub fn code(&self) -> i32 {
        match self {
            PackStatus::Success => 0,
            PackStatus::Failed(code) => *code,
        }
    }
}

impl From<ExitStatus> for PackStatus {
    fn from(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => PackStatus::Success,
            Some(code) => PackStatus::Failed(code),
            None => PackStatus::Failed(1),
        }
    }
}

/// An external executable packer with a fixed set of flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packer {
    pub executable: PathBuf,
    pub flags: Vec<String>,
}

impl Packer {
    pub fn upx(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            flags: UPX_FLAGS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Arguments for packing `source` into `target`.
    pub fn args(&self, target: &Path, source: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.flags.iter().map(OsString::from).collect();
        args.push("-o".into());
        args.push(target.as_os_str().to_owned());
        args.push(source.as_os_str().to_owned());
        args
    }

    /// Shell-style rendering of the invocation, for logs.
    pub fn command_line(&self, target: &Path, source: &Path, platform: Platform) -> String {
        format!(
            "\"{}\" {} -o \"{}\" \"{}\"{}",
            self.executable.display(),
            self.flags.join(" "),
            target.display(),
            source.display(),
            platform.discard_stdout()
        )
    }

    /// Run the packer and wait for it.
    ///
    /// Stdout is discarded; stdin and stderr are inherited. A non-zero exit is reported
    /// through [`PackStatus`], not as an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the packer could not be started.
    pub fn run(&self, target: &Path, source: &Path) -> Result<PackStatus> {
        let status = Command::new(&self.executable)
            .args(self.args(target, source))
            .stdout(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run packer: {}", self.executable.display()))?;

        Ok(status.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upx_args() {
        let packer = Packer::upx("/usr/bin/upx");
        let args = packer.args(Path::new("out/stub.bin"), Path::new("stub.bin"));
        assert_eq!(
            args,
            vec!["--best", "-q", "-o", "out/stub.bin", "stub.bin"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_empty_source_arg() {
        let packer = Packer::upx("upx");
        let args = packer.args(Path::new("out.bin"), Path::new(""));
        assert_eq!(args.last().unwrap(), "");
        assert_eq!(args.len(), 5);
    }

    #[test]
    fn test_command_line() {
        let packer = Packer::upx("/usr/bin/upx");
        let line = packer.command_line(Path::new("out.bin"), Path::new("in.bin"), Platform::Unix);
        assert_eq!(
            line,
            r#""/usr/bin/upx" --best -q -o "out.bin" "in.bin">/dev/null"#
        );

        let line = packer.command_line(Path::new("out.bin"), Path::new("in.bin"), Platform::Windows);
        assert!(line.ends_with(">nul"));
    }

    #[test]
    fn test_pack_status_code() {
        assert_eq!(PackStatus::Success.code(), 0);
        assert!(PackStatus::Success.is_success());
        assert_eq!(PackStatus::Failed(2).code(), 2);
        assert!(!PackStatus::Failed(2).is_success());
    }

    #[test]
    fn test_missing_packer_is_error() {
        let packer = Packer::upx("/nonexistent/path/to/upx");
        let err = packer
            .run(Path::new("out.bin"), Path::new("in.bin"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to run packer"));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_status_conversion() {
        let ok = Command::new("sh").args(["-c", "exit 0"]).status().unwrap();
        let bad = Command::new("sh").args(["-c", "exit 3"]).status().unwrap();
        assert_eq!(PackStatus::from(ok), PackStatus::Success);
        assert_eq!(PackStatus::from(bad), PackStatus::Failed(3));
    }
}
