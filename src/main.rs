//! Lanzar CLI — declarative serverless provisioning.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "lanzar",
    version,
    about = "Declarative serverless provisioning — roles and functions as code, content-addressed artifacts, provenance tracing"
)]
struct Cli {
    #[command(subcommand)]
    command: lanzar::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = lanzar::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
