//! rshd: remote shell server, started by inetd for each connection

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;

use rcmd_core::config;
use rcmd_server::{auth, launch, Acceptor, SystemAccounts};

const PROG: &str = "rshd";

#[derive(Parser, Debug)]
#[command(name = "rshd")]
#[command(about = "Remote shell server; runs under inetd with the connection on stdin")]
#[command(version)]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    rcmd_server::init_logging(PROG, &args.log_level);

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let path = config::server_config_path();
    let config = rcmd_server::load_server_config(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    let stream = rcmd_server::inherited_connection()
        .context("Standard input is not a TCP connection")?;

    let authenticator = auth::from_config(&config.auth);
    let accounts = SystemAccounts;
    let acceptor = Acceptor::new(config.ports, authenticator.as_ref(), &accounts);

    let accepted = acceptor.accept_shell(stream).await?;
    Err(launch::exec_shell(accepted).into())
}
