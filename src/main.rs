//! remoteview-core binary
//!
//! Headless session driver: connects to the signaling server, joins a
//! transmission when one is given on the command line, and surfaces
//! session events in the log until Ctrl+C.

use clap::Parser;
use log::{error, info};
use std::sync::Arc;

use remoteview_core::args::Args;
use remoteview_core::session::{ClientCommand, SessionClient};
use remoteview_core::surface::{NullSurface, VideoSurface};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match args.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.clone()),
    )
    .init();

    if let Err(e) = config.validate() {
        error!("invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!(
        "remoteview-core starting (signaling {})",
        config.signaling.url
    );

    let surface: Arc<dyn VideoSurface> = Arc::new(NullSurface);
    let (client, handle, mut events) = SessionClient::new(Arc::new(config), surface);
    let runner = tokio::spawn(client.run());

    if let Some(transmission_id) = args.transmission.clone() {
        handle.send(ClientCommand::Connect {
            transmission_id,
            password: args.password.clone(),
        });
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                handle.send(ClientCommand::Shutdown);
                break;
            }
            event = events.recv() => match event {
                Some(event) => info!("session event: {:?}", event),
                None => break,
            }
        }
    }

    let _ = runner.await;
}
