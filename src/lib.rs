//! UPX packing for NV-tagged executable stubs.
//!
//! Stubs carry `NV` where a PE executable has `MZ`, so that tools scanning
//! for executables ignore them. UPX only packs files starting with `MZ`.
//! Rewriting the stub after packing would make the build tool see a changed
//! source and repack on every run, so instead the step masks `NV` as `MZ`
//! just for the packer run and restores it afterwards.

mod config;
mod pack;
mod paths;
mod sentinel;
mod step;

pub use config::{
    parse_argument, BuildConfig, Platform, OPT_OUT_ARGUMENT, OPT_OUT_DEFAULT, PACKER_NAME,
};
pub use pack::{PackStatus, Packer, UPX_FLAGS};
pub use paths::{find_executable, find_in_system_path};
pub use sentinel::{
    mask_stubs, read_marker, swap_marker, write_marker, MaskedStubs, RestorePolicy, EXE_HEADER,
    STUB_SENTINEL,
};
pub use step::UpxStep;
