//! rsh: run a command on a remote host over the BSD rsh protocol

use std::process::ExitCode;

use anyhow::Result;
use clap::error::ErrorKind;
use clap::Parser;

use rcmd_client::{output, session, Target};
use rcmd_core::config;

const PROG: &str = "rsh";

#[derive(Parser, Debug)]
#[command(name = "rsh")]
#[command(about = "Run a command on a remote host over the rsh protocol")]
#[command(override_usage = "rsh [-n] [-l user] [-p port] host [command...]")]
#[command(version)]
struct Args {
    /// Do not read standard input
    #[arg(short = 'n')]
    no_input: bool,

    /// Remote user name (defaults to the local user)
    #[arg(short = 'l', value_name = "user")]
    user: Option<String>,

    /// Service name or port number (defaults to "shell")
    #[arg(short = 'p', value_name = "port")]
    port: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Remote host
    host: String,

    /// Command words, sent joined by single spaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
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

    rcmd_client::init_logging(&args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(PROG, &format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = rcmd_client::load_client_config(&config::client_config_path());

    let service = args.port.unwrap_or_else(|| config.shell_service.clone());
    let target = Target::new(args.host, service, whoami::username(), args.user);

    let closed = session::shell(&config, &target, &args.command, !args.no_input).await?;
    tracing::debug!(?closed, "Session ended");
    Ok(())
}
