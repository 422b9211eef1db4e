//! CLI client for the LVGL smartwatch simulator.
//!
//! Sends one protocol command per invocation to a running simulator.
//!
//! # Usage
//!
//! ```bash
//! # Click a widget by ID
//! simtap click btn_heart
//!
//! # Long-press for 2 seconds
//! simtap longpress btn_alarm --ms 2000
//!
//! # Swipe up
//! simtap swipe 240 400 240 100
//!
//! # Read a label
//! simtap get-state lbl_time
//!
//! # Type into a text field
//! simtap set-text txt_name "Alice"
//!
//! # Capture a screenshot to a file (or raw PNG on stdout if omitted)
//! simtap screenshot watchface.png
//!
//! # Launch the simulator and wait until it accepts commands
//! simtap start --headless
//!
//! # Target a non-default endpoint
//! simtap --host 127.0.0.1 --port 23456 click btn_heart
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use simtap_core::client::SimulatorClient;
use simtap_core::config::SimtapConfig;
use simtap_core::connection::{ConnectionConfig, DEFAULT_HOST, DEFAULT_PORT};
use simtap_core::lifecycle::{LifecycleConfig, SimulatorLifecycle};

/// CLI client for the LVGL smartwatch simulator.
#[derive(Parser)]
#[command(name = "simtap")]
#[command(about = "Drive a running LVGL smartwatch simulator over TCP")]
#[command(version)]
struct Cli {
    /// Simulator host (falls back to the config file, then loopback)
    #[arg(long, env = "SIMTAP_HOST")]
    host: Option<String>,

    /// Simulator TCP port (falls back to the config file, then the default)
    #[arg(long, env = "SIMTAP_PORT")]
    port: Option<u16>,

    /// Receive timeout in milliseconds
    #[arg(short = 'o', long, default_value = "30000", env = "SIMTAP_TIMEOUT")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Click a widget by ID
    Click {
        /// Widget identifier
        id: String,
    },

    /// Press and hold a widget
    Longpress {
        /// Widget identifier
        id: String,
        /// Hold duration in milliseconds
        #[arg(long, default_value = "1000")]
        ms: u32,
    },

    /// Swipe between two points
    Swipe { x1: i32, y1: i32, x2: i32, y2: i32 },

    /// Drag from one point to another
    Drag { x1: i32, y1: i32, x2: i32, y2: i32 },

    /// Click at screen coordinates
    ClickAt { x: i32, y: i32 },

    /// Move the pointer without clicking
    MouseMove { x: i32, y: i32 },

    /// Send a key event
    Key {
        /// Key code
        code: u32,
    },

    /// Print a widget's text content
    GetState {
        /// Widget identifier
        id: String,
    },

    /// Set a widget's text content
    SetText {
        /// Widget identifier
        id: String,
        /// New text content
        text: String,
    },

    /// Let the simulator idle for a duration
    Wait {
        /// Duration in milliseconds
        ms: u32,
    },

    /// Capture a screenshot as PNG
    Screenshot {
        /// Destination file; raw PNG bytes go to stdout when omitted
        output: Option<PathBuf>,
    },

    /// Launch the simulator and wait until it accepts commands
    Start {
        /// Path to the simulator executable
        #[arg(short, long)]
        executable: Option<PathBuf>,
        /// Run without opening a window
        #[arg(long)]
        headless: bool,
    },

    /// Print the path of the persistent config file
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let stored = SimtapConfig::load();
    let host = cli
        .host
        .or(stored.host)
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = cli.port.or(stored.port).unwrap_or(DEFAULT_PORT);
    debug!(%host, port, "resolved simulator endpoint");

    // Subcommands that do not need a protocol connection.
    match &cli.command {
        Command::ConfigPath => {
            println!("{}", SimtapConfig::path().display());
            return Ok(());
        }
        Command::Start {
            executable,
            headless,
        } => {
            let config = LifecycleConfig {
                executable: executable.clone().or(stored.simulator_path),
                headless: *headless || LifecycleConfig::default().headless,
                host: host.clone(),
                port,
                ..Default::default()
            };
            let mut lifecycle = SimulatorLifecycle::new(config);
            lifecycle.ensure_running().await?;
            lifecycle.detach();
            println!("simulator ready on {host}:{port}");
            return Ok(());
        }
        _ => {}
    }

    let mut client = SimulatorClient::new(ConnectionConfig {
        host,
        port,
        connect_timeout: Duration::from_secs(5),
        read_timeout: Duration::from_millis(cli.timeout),
    });
    client.connect().await?;

    let ok = match cli.command {
        Command::Click { id } => client.click(&id).await,
        Command::Longpress { id, ms } => client.longpress(&id, ms).await,
        Command::Swipe { x1, y1, x2, y2 } => client.swipe(x1, y1, x2, y2).await,
        Command::Drag { x1, y1, x2, y2 } => client.drag(x1, y1, x2, y2).await,
        Command::ClickAt { x, y } => client.click_at(x, y).await,
        Command::MouseMove { x, y } => client.mouse_move(x, y).await,
        Command::Key { code } => client.key(code).await,
        Command::GetState { id } => match client.get_state(&id).await {
            Some(text) => {
                println!("{text}");
                true
            }
            None => false,
        },
        Command::SetText { id, text } => client.set_text(&id, &text).await,
        Command::Wait { ms } => client.wait(ms).await,
        Command::Screenshot { output } => match output {
            Some(path) => client.screenshot(Some(&path)).await.is_some(),
            None => {
                let png = client.try_screenshot().await?;
                std::io::stdout().write_all(&png)?;
                true
            }
        },
        Command::Start { .. } | Command::ConfigPath => unreachable!("handled above"),
    };

    client.disconnect();
    if ok {
        Ok(())
    } else {
        Err("command failed".into())
    }
}
