mod cli;

use clap::{Parser, Subcommand};
use cli::config::ConfigCmd;
use wafgate_core::logging::init_logging;

#[derive(Parser, Debug)]
#[command(
    name = "wafgate",
    version,
    about = "wafgate: WAF middleware configuration tooling"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect a WAF configuration file
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Command::Config { cmd } => {
            if let Err(e) = cli::config::run(cmd) {
                eprintln!("config error: {e}");
                std::process::exit(1);
            }
        }
    }
}
