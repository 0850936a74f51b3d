//! Command-line control for PowerShades controllers: discovery, status and
//! movement commands against a single device.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use powershades_rs::constants::UNKNOWN_POSITION_RETRIES;
use powershades_rs::device::{DeviceIdentity, PowerShade};
use powershades_rs::discovery;
use std::net::IpAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Scan the local network for shade controllers.
    Discover {
        /// Scan window in seconds.
        #[arg(short, long, default_value_t = 5)]
        timeout: u64,
        /// Emit results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Confirm an address is a shade controller.
    Verify { ip: IpAddr },
    /// Look up a device's human-readable name.
    Name { ip: IpAddr },
    /// Request and print current status.
    Status {
        ip: IpAddr,
        /// Emit the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Open fully.
    Open { ip: IpAddr },
    /// Close fully.
    Close { ip: IpAddr },
    /// Stop movement.
    Stop { ip: IpAddr },
    /// Stop if moving, otherwise head for the far end of travel.
    Toggle { ip: IpAddr },
    /// Drive to a percent-open position.
    Position { ip: IpAddr, percent: u8 },
    /// Store the current position as a travel limit.
    Limit { ip: IpAddr, which: LimitArg },
    /// Clear both travel limits.
    ClearLimits { ip: IpAddr },
    /// Nudge the motor one step, for trimming limits.
    Step { ip: IpAddr, direction: DirectionArg },
    /// Jog continuously until stopped.
    Jog { ip: IpAddr, direction: DirectionArg },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LimitArg {
    Upper,
    Lower,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Up,
    Down,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity.tracing_level_filter())
        .init();

    match cli.command {
        Action::Discover { timeout, json } => {
            let found = discovery::discover_for(Duration::from_secs(timeout)).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else if found.is_empty() {
                println!("no devices found");
            } else {
                for device in &found {
                    let name = discovery::get_device_name(device.ip)
                        .await
                        .unwrap_or_else(|| "<unnamed>".to_string());
                    println!(
                        "{}  serial {}  model {}  {}",
                        device.ip, device.serial, device.model, name
                    );
                }
            }
        }
        Action::Verify { ip } => match discovery::verify_device(ip).await {
            Some(device) => println!(
                "{} is a shade controller (serial {}, model {})",
                device.ip, device.serial, device.model
            ),
            None => bail!("{ip} did not verify as a shade controller"),
        },
        Action::Name { ip } => match discovery::get_device_name(ip).await {
            Some(name) => println!("{name}"),
            None => bail!("no name obtained from {ip}"),
        },
        Action::Status { ip, json } => {
            let session = connect(ip).await?;
            session
                .request_status_with_retry(UNKNOWN_POSITION_RETRIES)
                .await;
            let snapshot = session.snapshot();
            if json {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            } else {
                match snapshot.position {
                    Some(position) => println!("position: {position}%"),
                    None => println!("position: unknown"),
                }
                if let (Some(mv), Some(pct)) =
                    (snapshot.battery_millivolts, snapshot.battery_percentage)
                {
                    println!("battery: {pct}% ({mv} mV)");
                }
                println!("available: {}", snapshot.available);
            }
            session.shutdown().await;
        }
        Action::Open { ip } => run_command(ip, |s| async move { s.open().await }).await?,
        Action::Close { ip } => run_command(ip, |s| async move { s.close().await }).await?,
        Action::Stop { ip } => {
            let session = connect(ip).await?;
            session.stop().await;
            session.request_status().await;
            session.shutdown().await;
        }
        Action::Toggle { ip } => run_command(ip, |s| async move { s.toggle().await }).await?,
        Action::Position { ip, percent } => {
            let session = connect(ip).await?;
            session.set_position(percent).await?;
            session.shutdown().await;
        }
        Action::Limit { ip, which } => {
            run_command(ip, move |s| async move {
                match which {
                    LimitArg::Upper => s.set_upper_limit().await,
                    LimitArg::Lower => s.set_lower_limit().await,
                }
            })
            .await?
        }
        Action::ClearLimits { ip } => {
            run_command(ip, |s| async move { s.clear_limits().await }).await?
        }
        Action::Step { ip, direction } => {
            run_command(ip, move |s| async move {
                match direction {
                    DirectionArg::Up => s.step_up().await,
                    DirectionArg::Down => s.step_down().await,
                }
            })
            .await?
        }
        Action::Jog { ip, direction } => {
            run_command(ip, move |s| async move {
                match direction {
                    DirectionArg::Up => s.jog_up().await,
                    DirectionArg::Down => s.jog_down().await,
                }
            })
            .await?
        }
    }
    Ok(())
}

async fn connect(ip: IpAddr) -> Result<std::sync::Arc<PowerShade>> {
    Ok(PowerShade::connect(DeviceIdentity {
        ip,
        serial: None,
        model: None,
        name: None,
    })
    .await?)
}

async fn run_command<F, Fut>(ip: IpAddr, action: F) -> Result<()>
where
    F: FnOnce(std::sync::Arc<PowerShade>) -> Fut,
    Fut: Future<Output = ()>,
{
    let session = connect(ip).await?;
    action(session.clone()).await;
    session.shutdown().await;
    Ok(())
}
