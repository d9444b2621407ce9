use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dsa_rag::cli::commands::{
    handle_ask, handle_config, handle_search, handle_serve, handle_status,
};
use dsa_rag::cli::output::get_formatter;
use dsa_rag::cli::{Cli, Commands};

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "dsa_rag=debug,tower_http=debug"
    } else {
        "dsa_rag=info,tower_http=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let format = cli.format;
    if let Err(e) = run(cli).await {
        eprint!("{}", get_formatter(format).format_error(&format!("{e:#}")));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve(args) => handle_serve(args, config_path).await,
        Commands::Ask(args) => handle_ask(args, cli.format, config_path).await,
        Commands::Search(args) => handle_search(args, cli.format, cli.verbose, config_path).await,
        Commands::Status(args) => handle_status(args, cli.format, config_path).await,
        Commands::Config(cmd) => handle_config(cmd, cli.format, config_path).await,
    }
}
