//! The UPX build step: mask stubs, pack, restore.

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{BuildConfig, Platform, OPT_OUT_ARGUMENT};
use crate::pack::{PackStatus, Packer};
use crate::sentinel::{mask_stubs, RestorePolicy};

/// A registered UPX step.
#[derive(Debug, Clone)]
pub struct UpxStep {
    pub packer: Packer,
    pub platform: Platform,
    pub policy: RestorePolicy,
}

impl UpxStep {
    /// Register the step for `config`.
    ///
    /// Returns `None` when no packer was found or when the `no_upx` argument
    /// is left at its default.
    #[must_use = "an unused step never packs anything"]
    pub fn register(config: &BuildConfig) -> Option<Self> {
        let Some(packer) = config.packer.as_ref() else {
            debug!("upx not found, step not registered");
            return None;
        };
        if !config.upx_opted_in() {
            debug!(argument = OPT_OUT_ARGUMENT, "upx not opted in, step not registered");
            return None;
        }

        Some(Self {
            packer: Packer::upx(packer),
            platform: config.platform,
            policy: RestorePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: RestorePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pack the first of `sources` into `target`.
    ///
    /// Every source starting with the `NV` sentinel carries `MZ` while the
    /// packer runs. On success they get `NV` back. On failure the packer's
    /// status is returned at once; under [`RestorePolicy::OnSuccess`] the
    /// sources stay masked.
    ///
    /// With no sources the packer still runs, with an empty source argument.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or written, or if the
    /// packer cannot be started.
    pub fn run<P: AsRef<Path>>(&self, sources: &[P], target: &Path) -> Result<PackStatus> {
        let masked = mask_stubs(sources, self.policy)?;

        let source = sources.first().map_or(Path::new(""), AsRef::<Path>::as_ref);
        info!(
            platform = %self.platform,
            command = %self.packer.command_line(target, source, self.platform),
            "packing stub"
        );

        let status = self.packer.run(target, source)?;
        if let PackStatus::Failed(code) = status {
            warn!(code, target = %target.display(), "packer failed");
            match self.policy {
                RestorePolicy::OnSuccess => {
                    let left = masked.leave_masked();
                    if !left.is_empty() {
                        warn!(count = left.len(), "stubs left masked after packer failure");
                    }
                }
                RestorePolicy::Always => masked.restore()?,
            }
            return Ok(status);
        }

        masked.restore()?;
        Ok(PackStatus::Success)
    }
}
