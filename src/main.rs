use clap::Parser;
use tracing_subscriber::EnvFilter;
use ticktrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = match cli.log_level() {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info")),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    run(cli)
}
