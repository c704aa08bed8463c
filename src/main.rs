use anyhow::Result;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use upx_stub::{parse_argument, BuildConfig, PackStatus, RestorePolicy, UpxStep, OPT_OUT_ARGUMENT};

/// Pack an executable stub with UPX, keeping its NV sentinel intact
#[derive(Parser)]
#[command(name = "upx-stub")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Packed output file
    #[arg(short, long)]
    target: PathBuf,

    /// Stub files; the first one is packed
    sources: Vec<PathBuf>,

    /// Build argument as KEY=VALUE (repeatable), e.g. -D no_upx=0
    #[arg(short = 'D', long = "define", value_name = "KEY=VALUE", value_parser = parse_argument)]
    defines: Vec<(String, String)>,

    /// Value of the no_upx build argument; packing runs only when it is not "1"
    #[arg(long, env = "NO_UPX")]
    no_upx: Option<String>,

    /// Packer executable to use instead of searching PATH
    #[arg(long, env = "UPX_STUB_PACKER")]
    upx: Option<PathBuf>,

    /// Restore stub sentinels even when the packer fails
    #[arg(long)]
    always_restore: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run(cli) {
        Ok(PackStatus::Success) => ExitCode::SUCCESS,
        Ok(PackStatus::Failed(code)) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<PackStatus> {
    let mut arguments: BTreeMap<String, String> = cli.defines.into_iter().collect();
    if let Some(value) = cli.no_upx {
        arguments.insert(OPT_OUT_ARGUMENT.to_string(), value);
    }

    let mut config = BuildConfig::from_environment(arguments);
    if let Some(upx) = cli.upx {
        config = config.with_packer(upx);
    }

    let Some(step) = UpxStep::register(&config) else {
        info!("upx step not registered, nothing to do");
        return Ok(PackStatus::Success);
    };
    let policy = if cli.always_restore {
        RestorePolicy::Always
    } else {
        RestorePolicy::OnSuccess
    };

    step.with_policy(policy).run(&cli.sources, &cli.target)
}
