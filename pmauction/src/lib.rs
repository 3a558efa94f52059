use clap::Parser;
use std::{path::PathBuf, sync::Arc};

mod config;
pub use config::*;

mod io;
pub use io::*;

mod scenario;
pub use scenario::*;

mod commands;
pub use commands::*;

// The top-level arguments: where configuration comes from, and which subcommand to execute
#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct BaseArgs {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "PM_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl BaseArgs {
    pub fn evaluate(self) -> anyhow::Result<()> {
        let AppConfig { market, codec } = AppConfig::load(self.config.as_deref())?;
        let market = Arc::new(market.basis()?);
        let codec = codec.build(&market);

        match self.command {
            Commands::Clear { io } => {
                let scenario = io.read_json::<Scenario>()?;
                let outcome = scenario.run(&market)?;
                io.write_json(&outcome)?;
            }
            Commands::EncodePrice { price } => {
                let bytes = encode_price(&codec, &market, price)?;
                println!("{}", hex::encode(bytes));
            }
            Commands::EncodeBid { io } => {
                let spec = io.read_json::<BidSpec>()?;
                let bytes = encode_bid(&codec, &market, spec)?;
                io.write_line(&hex::encode(bytes))?;
            }
            Commands::Decode { message } => {
                let decoded = decode(&codec, &market, &message)?;
                println!("{}", serde_json::to_string_pretty(&decoded)?);
            }
        }

        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Scenario has no agents, nothing to clear")]
    NoAgents,
    #[error("Agent {0} appears more than once in the scenario")]
    DuplicateAgent(String),
}
