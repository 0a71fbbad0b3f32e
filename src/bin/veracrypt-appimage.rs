use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use veracrypt_appimage::cli::Cli;
use veracrypt_appimage::fetch::select_transport;
use veracrypt_appimage::pipeline::{self, BuildOutcome};
use veracrypt_appimage::{preflight, Config, PackError};

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    init_tracing(cli.debug);

    match build(cli) {
        Ok(outcome) => {
            println!("{}", outcome.artifact.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build(cli: Cli) -> Result<BuildOutcome> {
    let config_path = cli.config.clone();
    let options = cli.into_options()?;
    let config = Config::load(config_path.as_deref()).context("loading configuration")?;

    // host tools first: nothing touches the network before this passes
    let transport = select_transport(options.progress).context("selecting HTTP client")?;
    preflight::check_host_tools().context("checking extractor tools")?;

    pipeline::run_default(&config, &options, &transport).with_context(|| {
        format!(
            "packaging {} {} bundle",
            options.version.as_deref().unwrap_or("latest"),
            options.variant
        )
    })
}

fn report(err: &anyhow::Error) {
    let kind = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<PackError>())
        .map(PackError::kind)
        .unwrap_or("Error");
    eprintln!("error[{kind}]: {err:#}");
}
