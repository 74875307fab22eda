use anyhow::Result;
use clap::Parser;
use ruwai_check::cli;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        eprintln!("aborted: {:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
