use anyhow::Context;
use clap::Parser;
use infinity_bus::constants::{DEFAULT_BAUD_RATE, DEFAULT_HTTP_PORT};
use infinity_bus::logging::{log_error, log_warn};
use infinity_bus::{http, init_logger, log_info, BusConfig, Gateway};
use std::future::IntoFuture;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "infinitive")]
#[command(about = "Infinity HVAC bus gateway")]
struct Cli {
    /// HTTP port to listen on
    #[arg(long = "httpport", default_value_t = DEFAULT_HTTP_PORT)]
    http_port: u16,

    /// Path to serial port
    #[arg(long)]
    serial: String,

    #[arg(long, default_value_t = DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Per-attempt response timeout for table reads
    #[arg(long = "timeout-ms", default_value_t = 500)]
    timeout_ms: u64,

    /// Writes per table read before giving up
    #[arg(long, default_value_t = 2)]
    attempts: u32,

    #[arg(long = "poll-interval-ms", default_value_t = 1000)]
    poll_interval_ms: u64,
}

impl Cli {
    fn bus_config(&self) -> BusConfig {
        let mut config = BusConfig::default();
        config.serial.baudrate = self.baud;
        config.transaction.response_timeout = Duration::from_millis(self.timeout_ms);
        config.transaction.attempts = self.attempts;
        config.poller.interval = Duration::from_millis(self.poll_interval_ms);
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let config = cli.bus_config();

    let gateway = Gateway::open(&cli.serial, &config)
        .with_context(|| format!("error opening serial port {}", cli.serial))?;

    let addr = format!("0.0.0.0:{}", cli.http_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    log_info(&format!("serving state on http://{addr}"));

    let app = http::router(gateway.state());
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .into_future();

    let served = tokio::select! {
        served = server => Some(served),
        _ = gateway.closed() => None,
    };

    log_warn("shutting down");
    let stopped = gateway.shutdown().await;
    match served {
        Some(served) => {
            if let Err(e) = stopped {
                log_error(&format!("bus shutdown: {e}"));
            }
            served.context("http server")
        }
        None => match stopped {
            Err(e) => Err(e).context("serial link lost"),
            Ok(()) => Err(anyhow::anyhow!("serial link lost")),
        },
    }
}
