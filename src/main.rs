use clap::Parser;
use portsweep::cli::Cli;
use portsweep::output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_directive());

    if let Err(e) = cli.run().await {
        output::print_error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

/// Log to stderr; `RUST_LOG` takes precedence over the verbosity flags.
fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
