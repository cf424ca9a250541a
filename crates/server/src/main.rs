mod config;
mod events;
mod logbuf;
mod server;
mod tui;

use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, execute};
use log::LevelFilter;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use arena::LinkSimulation;
use config::ServerConfig;
use logbuf::LogBuffer;
use server::ArenaServer;

#[derive(Parser)]
#[command(name = "arena-server")]
#[command(about = "Authoritative arena game server")]
struct Args {
    #[arg(short, long, help = "RON file with server settings")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    bind: Option<IpAddr>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long, help = "Number of player slots")]
    slots: Option<usize>,

    #[arg(long, help = "Simulation tick in ms")]
    sim_tick: Option<u64>,

    #[arg(long, help = "Snapshot tick in ms")]
    net_tick: Option<u64>,

    #[arg(long, help = "Seed for powerup placement")]
    seed: Option<u64>,

    #[arg(long)]
    headless: bool,

    #[arg(long, help = "Enable outgoing packet loss simulation")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(ip) = self.bind {
            config.host.bind.set_ip(ip);
        }
        if let Some(port) = self.port {
            config.host.bind.set_port(port);
        }
        if let Some(slots) = self.slots {
            config.slots = slots;
        }
        if let Some(ms) = self.sim_tick {
            config.ticks.simulation = Duration::from_millis(ms);
        }
        if let Some(ms) = self.net_tick {
            config.ticks.network = Duration::from_millis(ms);
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.simulate_packet_loss {
            config.host.link = LinkSimulation {
                enabled: true,
                loss_percent: self.loss_percent,
                min_latency_ms: self.min_latency,
                max_latency_ms: self.max_latency,
                jitter_ms: self.jitter,
            };
        }
        config.host.max_peers = config.host.max_peers.max(config.slots);

        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let headless = args.headless;
    let config = args.into_config()?;

    if headless {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let mut server = ArenaServer::new(&config)?;
        log::info!("Server started on {}", server.local_addr());
        server.run_headless()?;
        log::info!("Server shutting down");
    } else {
        let log_buffer = LogBuffer::default();
        log_buffer.install(LevelFilter::Info)?;
        let mut server = ArenaServer::new(&config)?;
        log::info!("Server started on {}", server.local_addr());
        run_with_tui(&mut server, &log_buffer)?;
    }

    Ok(())
}

fn run_with_tui(server: &mut ArenaServer, log_buffer: &LogBuffer) -> Result<()> {
    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = tui_loop(server, log_buffer, &mut terminal);

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;

    result
}

fn tui_loop(
    server: &mut ArenaServer,
    log_buffer: &LogBuffer,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<()> {
    while server.frame()? {
        if event::poll(Duration::from_millis(1))? {
            if let Event::Key(key) = event::read()? {
                if let Some(input) = events::translate_key(&key) {
                    server.push_input(input);
                }
            }
        }

        let status = server.status();
        let lines = log_buffer.tail(200);
        terminal.draw(|frame| tui::render(frame, &status, &lines))?;
    }

    log::info!("Shutting down...");
    Ok(())
}
