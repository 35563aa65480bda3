//! fingerbridge: fingerprint sensor to matching service bridge.
//!
//! Reads JSON requests on stdin, one per line, and writes one JSON response
//! per request on stdout. Logs go to stderr.
//!
//! ```bash
//! fingerbridge --config /etc/fingerbridge.toml --port /dev/ttyAMA0 --host 10.0.0.7
//! echo '{"cmd":"DETECT"}' | fingerbridge
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fingerbridge_bridge::{
    BridgeConfig, CommandChannel, CycleRunner, Orchestrator, PresenceMonitor, Reclaimer,
};
use fingerbridge_hardware::{SensorDriver, SerialPortLink};
use fingerbridge_network::UploadClient;

#[derive(Parser, Debug)]
#[command(name = "fingerbridge", version)]
#[command(about = "Bridge a serial fingerprint sensor to an HTTP matching service")]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "FINGERBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Serial device of the sensor
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate of the serial link
    #[arg(long)]
    baud: Option<u32>,

    /// Matching service host
    #[arg(long)]
    host: Option<String>,

    /// Matching service port
    #[arg(long)]
    upload_port: Option<u16>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = BridgeConfig::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(port) = args.port {
        config.serial.port = port;
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(host) = args.host {
        config.upload.host = host;
    }
    if let Some(upload_port) = args.upload_port {
        config.upload.port = upload_port;
    }
    config.validate().context("invalid configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = fingerbridge_core::VERSION,
        serial = %config.serial.port,
        upload = %format!("{}:{}{}", config.upload.host, config.upload.port, config.upload.path),
        "fingerbridge starting"
    );

    let link = SerialPortLink::open(&config.serial.port, config.serial.baud_rate)
        .with_context(|| format!("failed to open sensor port {}", config.serial.port))?;
    let mut sensor = SensorDriver::new(link, config.sensor_config());
    sensor
        .verify_password()
        .await
        .context("sensor did not accept the handshake")?;
    info!("Sensor ready");

    let client = UploadClient::new(config.upload_config());
    client.probe().await.with_context(|| {
        format!(
            "matching service {}:{} unreachable",
            config.upload.host, config.upload.port
        )
    })?;
    info!("Matching service reachable");

    let mut runner = CycleRunner::new(
        sensor,
        config.indicator(),
        client,
        PresenceMonitor::new(config.presence_timing()),
        Reclaimer::new(config.settle(), config.cleanup_idle_timeout()),
    );
    runner.announce_ready().await;

    let mut orchestrator = Orchestrator::new(
        CommandChannel::stdin(),
        tokio::io::stdout(),
        runner,
        config.geometry()?,
        config.enrollment_plan()?,
    );
    orchestrator.run().await?;

    info!("fingerbridge stopped");
    Ok(())
}
