use clap::Parser;
use std::path::PathBuf;

use crate::config;

#[derive(Parser, Debug)]
#[command(name = "remoteview-core")]
#[command(author = "Remoteview Team")]
#[command(version = "0.2.0")]
#[command(about = "Client-side remote desktop control core", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/etc/remoteview-core.toml")]
    pub config: PathBuf,

    /// Signaling server URL override
    #[arg(long)]
    pub url: Option<String>,

    /// Transmission id to join on startup
    #[arg(short, long)]
    pub transmission: Option<String>,

    /// Transmission password
    #[arg(short, long, default_value = "")]
    pub password: String,

    /// Verbose logging
    #[arg(short, long, action)]
    pub verbose: bool,
}

impl Args {
    pub fn load_config(&self) -> Result<config::Config, Box<dyn std::error::Error>> {
        let mut config = config::Config::load(&self.config)?;
        if let Some(url) = &self.url {
            config.signaling.url = url.clone();
        }
        if self.verbose {
            config.logging.level = "debug".to_string();
            config.logging.log_actions = true;
        }
        Ok(config)
    }
}
