use clap::Parser;
use client::bot::{run_bot, BotConfig};
use log::{error, info};
use shared::PositionMode;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the server
    #[arg(short = 's', long, default_value = "ws://127.0.0.1:3000")]
    server: String,

    /// Number of bots to run
    #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    bots: u32,

    /// Milliseconds between position reports
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    move_interval_ms: u64,

    /// Coordinate system the bots report in; must match the server
    #[arg(long, default_value_t = PositionMode::Polar)]
    coordinates: PositionMode,

    /// Color each bot sends after connecting
    #[arg(long)]
    color: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = BotConfig {
        server: args.server,
        move_interval: Duration::from_millis(args.move_interval_ms),
        mode: args.coordinates,
        color: args.color,
    };

    info!(
        "Starting {} bot(s) against {} ({} coordinates)",
        args.bots, config.server, config.mode
    );

    let mut bots = JoinSet::new();
    for _ in 0..args.bots {
        bots.spawn(run_bot(config.clone()));
    }

    loop {
        tokio::select! {
            finished = bots.join_next() => match finished {
                Some(Ok(Err(e))) => error!("Bot stopped: {}", e),
                Some(Ok(Ok(()))) => {}
                Some(Err(e)) => error!("Bot task failed: {}", e),
                None => {
                    info!("All bots stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                bots.abort_all();
                break;
            }
        }
    }

    Ok(())
}
