//! amibake CLI — golden-AMI factory declarations.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "amibake",
    version,
    about = "Compiles stack parameters into an EC2 Image Builder resource graph"
)]
struct Cli {
    #[command(subcommand)]
    command: amibake::cli::Commands,
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = amibake::cli::dispatch(cli.command) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
