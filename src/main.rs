//! ScapeProp host runner.
//!
//! Runs one prop's control loop against std TCP sockets and a simulated
//! panel.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                    │
//! │                                                             │
//! │  TcpControlListener  TcpOrchestratorLink  MonotonicClock    │
//! │  (InboundListener)   (OutboundLink)       (Clock)           │
//! │  SimulatedPanel      LogEventSink                           │
//! │  (Sensor+Indicator)  (EventSink)                            │
//! │                                                             │
//! │  ───────────────── Port Trait Boundary ─────────────────    │
//! │                                                             │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │                 PropService (pure logic)              │  │
//! │  │  listener · supervisor · fsm · sampler · reporter     │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use scapeprop::adapters::hardware::SimulatedPanel;
use scapeprop::adapters::log_sink::LogEventSink;
use scapeprop::adapters::net::{TcpControlListener, TcpOrchestratorLink};
use scapeprop::adapters::time::MonotonicClock;
use scapeprop::app::ports::Clock;
use scapeprop::app::service::PropService;
use scapeprop::config::{PropConfig, Variant};

/// Pause between ticks; keeps the host from spinning a core.
const TICK_PAUSE: Duration = Duration::from_millis(1);

#[derive(Parser)]
#[command(name = "scapeprop")]
#[command(about = "Puzzle prop control loop")]
struct Args {
    /// JSON configuration file; variant presets apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Prop variant (buttons, cables, pelotas, rfid, or the long names).
    #[arg(short, long)]
    variant: Option<Variant>,

    #[arg(long)]
    device_id: Option<String>,

    #[arg(short = 'p', long)]
    listen_port: Option<u16>,

    /// Orchestrator address as `host:port`.
    #[arg(short, long)]
    server: Option<String>,

    /// IP announced in the `/connect` handshake.
    #[arg(long)]
    advertise_ip: Option<String>,
}

fn load_config(args: &Args) -> Result<PropConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<PropConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PropConfig::for_variant(args.variant.unwrap_or(Variant::ButtonPanel)),
    };

    if let (Some(variant), Some(_)) = (args.variant, &args.config) {
        config.variant = variant;
    }
    if let Some(id) = &args.device_id {
        config.device_id.clone_from(id);
    }
    if let Some(port) = args.listen_port {
        config.listen_port = port;
    }
    if let Some(server) = &args.server {
        let (host, port) = server
            .rsplit_once(':')
            .context("--server must be host:port")?;
        config.server_host = host.to_string();
        config.server_port = port
            .parse()
            .with_context(|| format!("invalid orchestrator port '{port}'"))?;
    }
    if args.advertise_ip.is_some() {
        config.advertise_ip.clone_from(&args.advertise_ip);
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("ScapeProp v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "prop '{}' ({}) → orchestrator {}:{}",
        config.device_id,
        config.variant.as_str(),
        config.server_host,
        config.server_port
    );

    let clock = MonotonicClock::new();
    let mut sink = LogEventSink::new();
    let mut inbound = TcpControlListener::bind(config.listen_port)
        .with_context(|| format!("binding port {}", config.listen_port))?;
    let mut outbound = TcpOrchestratorLink::resolve(config.server_host.clone(), config.server_port)
        .with_context(|| {
            format!("resolving orchestrator {}:{}", config.server_host, config.server_port)
        })?;
    let mut panel = SimulatedPanel::for_config(&config).verbose(true);

    let mut service: PropService<TcpOrchestratorLink> =
        PropService::new(&config, clock.now_ms(), &mut sink);

    loop {
        service.tick(&mut inbound, &mut outbound, &mut panel, &clock, &mut sink);
        std::thread::sleep(TICK_PAUSE);
    }
}
