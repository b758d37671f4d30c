//! Desktop simulator for the connection manager.
//!
//! Runs the controller over mock hardware in real time, plugs simulated
//! devices into ports, logs every classification change, and serves the
//! HTTP API.
//!
//! # Usage
//!
//! ```sh
//! cargo run --bin dcm_sim --features sim -- --plug in1=uart --plug outA=large-motor
//! RUST_LOG=brick_dcm=debug cargo run --bin dcm_sim --features sim -- --plug in3=analog:2500
//! ```
//!
//! Devices:
//!
//! | Port | Device |
//! |------|--------|
//! | `in1`..`in4` | `uart`, `iic`, `short`, `analog:<mV>`, `open` |
//! | `outA`..`outD` (or `out1`..`out4`) | `large-motor`, `medium-motor`, `new-large-motor`, `intelligent`, `actuator:<mV>`, `open` |

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use brick_dcm::hal::{InputDevice, MockAdc, MockPins, OutputDevice};
use brick_dcm::services::{run_server_with_state, SharedDcmState, WebServerConfig};
use brick_dcm::{
    BrickSnapshot, Classification, Config, DcmConfig, DcmController, Port, WebConfig,
};

/// A simulated device on one port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plug {
    Input(Port, InputDevice),
    Output(Port, OutputDevice),
}

fn parse_millivolts(value: Option<&str>) -> Result<u16, String> {
    value
        .ok_or_else(|| "missing millivolts, e.g. analog:2500".to_string())?
        .parse()
        .map_err(|e| format!("bad millivolts: {e}"))
}

fn parse_output_port(name: &str) -> Option<Port> {
    match name {
        "a" | "A" | "1" => Some(Port::P1),
        "b" | "B" | "2" => Some(Port::P2),
        "c" | "C" | "3" => Some(Port::P3),
        "d" | "D" | "4" => Some(Port::P4),
        _ => None,
    }
}

impl FromStr for Plug {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, device) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <port>=<device>, got {s:?}"))?;
        let mut parts = device.splitn(2, ':');
        let kind = parts.next().unwrap_or_default();
        let arg = parts.next();

        if let Some(index) = port.strip_prefix("in") {
            let port = index
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(Port::from_index)
                .ok_or_else(|| format!("unknown input port {port:?}"))?;
            let device = match kind {
                "open" => InputDevice::Open,
                "uart" => InputDevice::Uart,
                "iic" => InputDevice::NxtIic,
                "short" => InputDevice::ShortedPin5,
                "analog" => InputDevice::Analog {
                    pin1_mv: parse_millivolts(arg)?,
                },
                other => return Err(format!("unknown input device {other:?}")),
            };
            return Ok(Plug::Input(port, device));
        }

        if let Some(name) = port.strip_prefix("out") {
            let port = parse_output_port(name).ok_or_else(|| format!("unknown output port {port:?}"))?;
            let device = match kind {
                "open" => OutputDevice::Open,
                "large-motor" => OutputDevice::LargeMotor,
                "medium-motor" => OutputDevice::MediumMotor,
                "new-large-motor" => OutputDevice::NewLargeMotor,
                "intelligent" => OutputDevice::Intelligent,
                "actuator" => OutputDevice::Actuator {
                    pin5_mv: parse_millivolts(arg)?,
                },
                other => return Err(format!("unknown output device {other:?}")),
            };
            return Ok(Plug::Output(port, device));
        }

        Err(format!("unknown port {port:?}"))
    }
}

/// Simulated brick: mock ports, real-time sampler and connection manager,
/// HTTP API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to serve the API on.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to serve the API on.
    #[arg(short, long, default_value_t = 8080)]
    port: u16,
    /// Device to plug at startup (repeatable), e.g. `in1=uart`, `outA=large-motor`.
    #[arg(long = "plug", value_name = "PORT=DEVICE")]
    plugs: Vec<Plug>,
    /// Power-up hold-off in milliseconds.
    #[arg(long, default_value_t = 2000)]
    reset_ms: u16,
    /// Watch pin 2 for legacy sensors.
    #[arg(long)]
    pin2_detection: bool,
    /// Controller catch-up interval in milliseconds.
    #[arg(long, default_value_t = 1)]
    tick_ms: u64,
    /// Run without the HTTP API.
    #[arg(long)]
    no_web: bool,
    /// Do not send CORS headers.
    #[arg(long)]
    no_cors: bool,
}

fn log_changes(previous: &BrickSnapshot, current: &BrickSnapshot) {
    let pairs = previous
        .inputs
        .iter()
        .zip(current.inputs.iter())
        .map(|pair| ("in", pair))
        .chain(
            previous
                .outputs
                .iter()
                .zip(current.outputs.iter())
                .map(|pair| ("out", pair)),
        );
    for (kind, (before, after)) in pairs {
        if before.classification != after.classification {
            if after.classification == Classification::NONE {
                info!(port = %after.port, kind, "device removed");
            } else {
                info!(
                    port = %after.port,
                    kind,
                    device = ?after.classification.device,
                    connection = ?after.classification.connection,
                    millivolts = after.millivolts,
                    "device detected"
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    tokio::select! {
        res = run(cli) => {
            if let Err(e) = res {
                error!("simulator failed: {:?}", e);
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down.");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::default()
        .with_dcm(
            DcmConfig::default()
                .with_device_reset_ms(cli.reset_ms)
                .with_pin2_detection(cli.pin2_detection),
        )
        .with_web(
            WebConfig::default()
                .with_host(&cli.host)
                .with_port(cli.port)
                .with_cors(!cli.no_cors)
                .with_enabled(!cli.no_web),
        );

    let mut pins = MockPins::new();
    let mut adc = MockAdc::new();
    for plug in &cli.plugs {
        match *plug {
            Plug::Input(port, device) => device.plug(port, &mut pins, &mut adc),
            Plug::Output(port, device) => device.plug(port, &mut pins, &mut adc),
        }
        info!(?plug, "plugged");
    }

    let controller =
        DcmController::new(pins, adc, &config).context("failed to configure the ADC")?;
    let state = Arc::new(SharedDcmState::new(controller));

    let period = Duration::from_millis(cli.tick_ms.max(1));
    let controller_loop = spawn_controller_loop(Arc::clone(&state), period);

    if !config.web.enabled {
        info!("HTTP API disabled");
        return controller_loop.await.context("controller loop stopped");
    }

    let web_config = WebServerConfig::from_config(&config.web);
    info!("API: http://{}/api/ports", web_config.addr);
    run_server_with_state(state, web_config)
        .await
        .context("web server failed")
}

/// Spawn the loop that keeps the controller clock on wall time and logs
/// classification changes.
fn spawn_controller_loop(
    state: Arc<SharedDcmState<MockPins, MockAdc>>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        let mut last = state.snapshot();
        loop {
            interval.tick().await;
            if let Err(e) = state.catch_up() {
                error!("ADC exchange failed: {e}");
                continue;
            }
            let current = state.snapshot();
            if current != last {
                log_changes(&last, &current);
                last = current;
            }
        }
    })
}
