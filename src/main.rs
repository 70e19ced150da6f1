//! GymSense CLI
//!
//! Command-line front end for the GymSense client core:
//! - Sign in and out, inspect the session and its permissions
//! - List, inspect and administer devices
//! - Ask to be notified when a machine frees up
//! - Watch live occupancy changes

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use gymsense::device::{occupied_ratio, timeline_segments};
use gymsense::{
    AppContext, Config, ConfigSource, Device, DevicePatch, LoggingConfig, TerminalNotifier,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gymsense")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live gym equipment occupancy from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// API base URL, overrides the config file
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in
    Login { email: String, password: String },

    /// Create an account and sign in
    Register { email: String, password: String },

    /// Sign out and forget the stored session
    Logout,

    /// Restore the session from the server cookie
    Recover,

    /// Show the current session
    Whoami,

    /// Check a permission, e.g. `can iot update d1`
    Can {
        domain: String,
        action: String,
        target: String,
    },

    /// List all devices
    Devices,

    /// Show one device
    Device {
        id: String,
        /// Include the occupancy timeline
        #[arg(short, long)]
        timeline: bool,
        /// Width of the timeline bar
        #[arg(long, default_value = "60")]
        width: usize,
    },

    /// Update a device's name, location or key
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        key: Option<String>,
    },

    /// Register a new device
    Create,

    /// Remove a device
    Delete { id: String },

    /// Get notified when a device becomes available
    Notify {
        id: String,
        /// Keep running until the notification arrives
        #[arg(short, long)]
        wait: bool,
    },

    /// Follow live updates until interrupted
    Watch {
        /// Behave as if the terminal were unfocused (system notifications)
        #[arg(long)]
        away: bool,
    },

    /// Generate a default config file, or show the effective one
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print the effective configuration instead
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, source) = match &cli.config {
        Some(path) => (
            Config::load_with_env(path)?,
            ConfigSource {
                loaded: Some(path.clone()),
                skipped: Vec::new(),
            },
        ),
        None => Config::discover(&Config::default_paths()),
    };
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    init_logging(&config.logging);
    source.log();

    let notifier = TerminalNotifier::new(config.notifications.allow_system);
    let ctx = AppContext::new(config, Arc::new(notifier))?;

    match cli.command {
        Commands::Login { email, password } => {
            let session = ctx.session().login(&email, &password).await.map_err(user_error)?;
            println!("Signed in as {}", session.email);
        }

        Commands::Register { email, password } => {
            let session = ctx
                .session()
                .register(&email, &password)
                .await
                .map_err(user_error)?;
            println!("Registered and signed in as {}", session.email);
        }

        Commands::Logout => {
            ctx.session().load_state().await?;
            ctx.session().logout().await?;
            println!("Signed out");
        }

        Commands::Recover => {
            if ctx.session().recover_session().await? {
                println!("Session recovered for {}", ctx.session().snapshot().await.email);
            } else {
                println!("No session to recover");
            }
        }

        Commands::Whoami => {
            ctx.restore_session().await?;
            let session = ctx.session().snapshot().await;
            if cli.format == "json" {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "email": session.email,
                        "authenticated": session.is_authenticated,
                        "permissions": session.permissions,
                    }))?
                );
            } else if session.is_authenticated {
                println!("{} ({:?})", session.email, session.phase());
                for permission in &session.permissions {
                    println!("  {}", permission);
                }
            } else {
                println!("Not signed in");
            }
        }

        Commands::Can {
            domain,
            action,
            target,
        } => {
            ctx.restore_session().await?;
            let allowed = ctx.session().has_permission(&domain, &action, &target).await;
            println!("{}", if allowed { "yes" } else { "no" });
            if !allowed {
                std::process::exit(1);
            }
        }

        Commands::Devices => {
            ctx.restore_session().await?;
            let devices = ctx.devices().list_devices().await.map_err(user_error)?;
            print_devices(&devices, &cli.format)?;
        }

        Commands::Device {
            id,
            timeline,
            width,
        } => {
            ctx.restore_session().await?;
            let device = ctx
                .devices()
                .get_device(&id, timeline)
                .await
                .map_err(user_error)?;
            print_device(&device, width, &cli.format)?;
        }

        Commands::Update {
            id,
            name,
            location,
            key,
        } => {
            require_permission(&ctx, "update", &id).await?;
            let patch = DevicePatch {
                name,
                location,
                key,
                ..Default::default()
            };
            if patch.is_empty() {
                bail!("Nothing to update: pass --name, --location or --key");
            }
            // Prime the single-device entry so the edit is applied optimistically
            ctx.devices().get_device(&id, false).await.map_err(user_error)?;
            let device = ctx
                .devices()
                .update_device(&id, &patch)
                .await
                .map_err(user_error)?;
            println!("Updated {}", device.display_name());
        }

        Commands::Create => {
            require_permission(&ctx, "create", "*").await?;
            ctx.devices().list_devices().await.map_err(user_error)?;
            let device = ctx.devices().create_device().await.map_err(user_error)?;
            println!("Created device {}", device.id);
            if let Some(key) = &device.key {
                println!("Security key: {}", key);
            }
        }

        Commands::Delete { id } => {
            require_permission(&ctx, "delete", &id).await?;
            ctx.devices().list_devices().await.map_err(user_error)?;
            ctx.devices().delete_device(&id).await.map_err(user_error)?;
            println!("Deleted {}", id);
        }

        Commands::Notify { id, wait } => {
            ctx.restore_session().await?;
            let live = if wait { ctx.start_live_updates() } else { None };

            if !ctx
                .notifications()
                .notify_when_available(&id)
                .await
                .map_err(user_error)?
            {
                bail!("The server refused the notification request");
            }

            if let Some(live) = live {
                println!("Waiting for {} to become available (Ctrl-C to stop)", id);
                let before = ctx.notifications().notifications().await.len();
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        _ = tokio::time::sleep(std::time::Duration::from_millis(250)) => {
                            if ctx.notifications().notifications().await.len() > before {
                                break;
                            }
                        }
                    }
                }
                live.abort();
            }
        }

        Commands::Watch { away } => {
            ctx.restore_session().await?;
            let devices = ctx.devices().list_devices().await.map_err(user_error)?;
            print_devices(&devices, &cli.format)?;

            ctx.notifications().set_focused(!away).await;
            let Some(live) = ctx.start_live_updates() else {
                bail!("Live updates are disabled in the configuration");
            };

            println!();
            println!("Watching for changes (Ctrl-C to stop)");
            let mut last = devices;
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {
                        let Some(current) = ctx.devices().cached_list().await else {
                            continue;
                        };
                        for device in changed(&last, &current) {
                            println!("{:<24} {}", device.display_name(), device.status());
                        }
                        last = current;
                    }
                }
            }

            live.abort();
            println!();
            println!("Cache: {}", ctx.devices().stats().await);
        }

        Commands::Config { output, show } => {
            let content = if show {
                toml::to_string_pretty(ctx.config())?
            } else {
                gymsense::config::generate_default_config()
            };
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

/// Initialize tracing from the `[logging]` section. `RUST_LOG` wins.
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gymsense={}", config.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Surface the server's message rather than the error chain
fn user_error<E>(e: E) -> anyhow::Error
where
    E: Into<UserFacing>,
{
    anyhow::anyhow!(e.into().0)
}

struct UserFacing(String);

impl From<gymsense::ApiError> for UserFacing {
    fn from(e: gymsense::ApiError) -> Self {
        UserFacing(e.user_message())
    }
}

impl From<gymsense::SessionError> for UserFacing {
    fn from(e: gymsense::SessionError) -> Self {
        UserFacing(e.user_message())
    }
}

async fn require_permission(ctx: &AppContext, action: &str, target: &str) -> anyhow::Result<()> {
    if !ctx.restore_session().await? {
        bail!("Not signed in");
    }
    if !ctx.session().has_permission("iot", action, target).await {
        let email = ctx.session().snapshot().await.email;
        bail!("{} lacks iot:{}:{}", email, action, target);
    }
    Ok(())
}

fn changed<'a>(before: &[Device], after: &'a [Device]) -> Vec<&'a Device> {
    after
        .iter()
        .filter(|d| !before.iter().any(|b| b == *d))
        .collect()
}

fn print_devices(devices: &[Device], format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No devices registered yet.");
        return Ok(());
    }

    println!("{:<24} {:<20} {:<10} {:>8}  {}", "Name", "Location", "Status", "Battery", "ID");
    println!("{}", "-".repeat(80));
    for device in devices {
        println!(
            "{:<24} {:<20} {:<10} {:>8}  {}",
            device.display_name(),
            device.location.as_deref().unwrap_or("-"),
            device.status().to_string(),
            device
                .battery_percent()
                .map(|b| format!("{:.0}%", b))
                .unwrap_or_else(|| "-".to_string()),
            device.id
        );
    }
    Ok(())
}

fn print_device(device: &Device, width: usize, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        println!("{}", serde_json::to_string_pretty(device)?);
        return Ok(());
    }

    println!("{}", device.display_name());
    println!("  ID:       {}", device.id);
    println!("  Status:   {}", device.status());
    if let Some(location) = &device.location {
        println!("  Location: {}", location);
    }
    if let Some(battery) = device.battery_percent() {
        println!("  Battery:  {:.0}%", battery);
    }
    if let Some(key) = &device.key {
        println!("  Key:      {}", key);
    }
    if let Some(updated) = device.updated_at {
        println!("  Updated:  {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    if let Some(timeline) = device.timeline.as_deref().filter(|t| !t.is_empty()) {
        let bar: String = timeline_segments(timeline, width as f64)
            .iter()
            .map(|s| {
                let cells = s.width.round() as usize;
                let cell = if s.occupancy { "#" } else { "." };
                cell.repeat(cells)
            })
            .collect();
        println!();
        println!("  [{}]", bar);
        if let Some(ratio) = occupied_ratio(timeline) {
            println!("  Occupied {:.0}% of the time", ratio * 100.0);
        }
    }
    Ok(())
}
