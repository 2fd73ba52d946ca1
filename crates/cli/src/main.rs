use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use wpbuild_cli::{Cli, Logging};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = match Logging::init(cli.log_level.as_deref()) {
        Ok(logging) => logging,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    match cli.execute(&logging).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
