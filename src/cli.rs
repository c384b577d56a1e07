use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::utils::get_config_path;

#[derive(Parser)]
#[command(name = "pricecast")]
#[command(about = "Crypto OHLCV collector and LSTM price forecaster", long_about = None)]
pub struct Cli {
    /// Path to config.yaml (falls back to $PRICECAST_CONFIG, then ./config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API
    Serve {
        /// Override server.port from the config
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one collection cycle and print the engineered frames
    Collect {
        /// Also write one CSV per pair into this directory
        #[arg(long)]
        csv_dir: Option<PathBuf>,
    },
    /// Train the model on freshly collected data and save it
    Train {
        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(short, long)]
        batch_size: Option<usize>,
    },
    /// Forecast the next closes for a symbol, e.g. BTC/USD
    Predict { symbol: String },
    /// Check whether an API key is on the allow-list
    VerifyKey { key: String },
}

pub fn run() {
    let cli = Cli::parse();
    let config_path = get_config_path(cli.config.as_deref());

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(&config_path, port);
        }
        Commands::Collect { csv_dir } => {
            commands::collect::run(&config_path, csv_dir);
        }
        Commands::Train { epochs, batch_size } => {
            commands::train::run(&config_path, epochs, batch_size);
        }
        Commands::Predict { symbol } => {
            commands::predict::run(&config_path, symbol);
        }
        Commands::VerifyKey { key } => {
            commands::verify_key::run(&config_path, key);
        }
    }
}
