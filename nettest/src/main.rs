//! Standalone CLI for managing the test veth pair outside of a test
//! run, useful when iterating on an integration test without paying
//! the setup/teardown cost on every invocation.

use clap::{Parser, Subcommand};
use nettest::runner::{DEV_PREFIX, IP_PREFIX};
use nettest::veth;
use std::io::Result;

#[derive(Parser)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the veth pair and bring both ends up.
    Up,
    /// Tear the veth pair down.
    Down,
    /// Check whether the veth pair currently exists.
    Status,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Command::Up => veth::setup_pair(DEV_PREFIX, IP_PREFIX),
        Command::Down => veth::teardown_pair(DEV_PREFIX),
        Command::Status => match veth::check_pair(DEV_PREFIX) {
            Ok(()) => {
                println!("{}0/{}1 present", DEV_PREFIX, DEV_PREFIX);
                Ok(())
            }
            Err(e) => {
                println!("{}0/{}1 absent: {e}", DEV_PREFIX, DEV_PREFIX);
                Ok(())
            }
        },
    }
}
