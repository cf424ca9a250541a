mod bot;
mod config;

use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use bot::Bot;
use config::ClientConfig;

#[derive(Parser)]
#[command(name = "arena-client")]
#[command(about = "Headless bot that joins an arena server and plays randomly")]
struct Args {
    #[arg(short, long, default_value_t = SocketAddr::from(([127, 0, 0, 1], arena::DEFAULT_PORT)))]
    server: SocketAddr,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = 250, help = "Milliseconds between input changes")]
    input_interval: u64,

    #[arg(long, help = "Stop after this many seconds")]
    duration: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = ClientConfig {
        input_interval: Duration::from_millis(args.input_interval),
        seed: args.seed,
        ..Default::default()
    };
    let mut bot = Bot::connect(args.server, config)?;

    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));
    let mut last = Instant::now();
    loop {
        let now = Instant::now();
        if deadline.is_some_and(|d| now >= d) {
            break;
        }
        bot.frame(now, (now - last).as_secs_f32())?;
        last = now;
        thread::sleep(Duration::from_millis(1));
    }

    log::info!("bot finished");
    Ok(())
}
