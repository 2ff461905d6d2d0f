use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "privtx", version, about = "Private transaction manager node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the node.
    Run {
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Log at debug level unless RUST_LOG says otherwise.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print a fresh key pair as a config snippet.
    Keygen,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_takes_a_config_path() {
        let cli = Cli::try_parse_from(["privtx", "run", "--config", "node.toml", "--verbose"])
            .expect("valid arguments");

        match cli.command {
            Command::Run { config, verbose } => {
                assert_eq!(config, PathBuf::from("node.toml"), "config path is kept");
                assert!(verbose, "verbose flag is set");
            }
            Command::Keygen => panic!("expected the run command"),
        }
    }

    #[test]
    fn run_requires_a_config() {
        assert!(
            Cli::try_parse_from(["privtx", "run"]).is_err(),
            "a node cannot start without a config"
        );
    }
}
