//! rfidreg CLI
//!
//! Runs the tag registry server and talks to a running one.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rfidreg_api::{ApiServer, AppState, ServiceConfig};
use rfidreg_core::types::{TagRecord, TagUid};
use rfidreg_reader::{ScriptedReader, ScriptedRelay};

/// rfidreg - RFID tag registry for cash register access
#[derive(Parser)]
#[command(name = "rfidreg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Registry server URL for client commands
    #[arg(long, global = true, env = "RFIDREG_SERVER", default_value = "http://127.0.0.1:3001")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the registry server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3001")]
        port: u16,
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: String,
        /// Store file (overrides RFIDREG_STORE_PATH)
        #[arg(long)]
        store: Option<PathBuf>,
        /// Seconds a registration waits for a tag
        #[arg(long)]
        scan_timeout: Option<u64>,
        /// Milliseconds between reader polls
        #[arg(long)]
        poll_interval_ms: Option<u64>,
        /// Read tag UIDs from stdin instead of a reader
        #[arg(long)]
        simulate: bool,
        /// Open the cash register when a registered tag is presented
        #[arg(long)]
        access_monitor: bool,
    },

    /// List registered tags
    List,

    /// Register the next scanned tag to a user
    Register {
        /// Name to bind the tag to
        username: String,
    },

    /// Remove a tag (present it to the reader if no UID is given)
    Remove {
        /// Tag UID
        uid: Option<String>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show server and reader status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "rfidreg=debug,info"
    } else {
        "rfidreg=info,warn"
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .with(cli.log_json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!cli.log_json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    let client = Client::new(&cli.server);

    match cli.command {
        Commands::Serve {
            port,
            bind,
            store,
            scan_timeout,
            poll_interval_ms,
            simulate,
            access_monitor,
        } => {
            let mut config = ServiceConfig::from_env().context("Invalid configuration")?;
            if let Some(path) = store {
                config.store_path = Some(path);
            }
            if let Some(secs) = scan_timeout {
                config.scan_timeout = Duration::from_secs(secs);
            }
            if let Some(ms) = poll_interval_ms {
                config.poll_interval = Duration::from_millis(ms);
            }
            cmd_serve(config, &bind, port, simulate, access_monitor).await
        }
        Commands::List => cmd_list(&client).await,
        Commands::Register { username } => cmd_register(&client, &username).await,
        Commands::Remove { uid, yes } => cmd_remove(&client, uid, yes).await,
        Commands::Status => cmd_status(&client).await,
    }
}

/// Run the registry server
async fn cmd_serve(
    config: ServiceConfig,
    bind: &str,
    port: u16,
    simulate: bool,
    access_monitor: bool,
) -> Result<()> {
    println!("{}", "🚀 Starting rfidreg server...".cyan().bold());
    println!("   {} http://{}:{}", "Listening on:".green(), bind, port);
    match &config.store_path {
        Some(path) => println!("   {} {}", "Store:".dimmed(), path.display()),
        None => println!("   {} in-memory (records are lost on exit)", "Store:".dimmed()),
    }
    println!("   {} {}s", "Scan timeout:".dimmed(), config.scan_timeout.as_secs());

    let device = Arc::new(ScriptedReader::new());
    if simulate {
        println!("\n   {}", "Simulated reader: type a tag UID and press Enter to present it.".yellow());
        tokio::spawn(feed_from_stdin(device.clone()));
    } else {
        device.disconnect();
        warn!("No reader attached; registrations will fail until one is (try --simulate)");
    }
    println!("\n   Press Ctrl+C to stop.\n");

    let state = AppState::open(config, device)
        .await
        .context("Failed to open tag store")?;
    let server = ApiServer::new(state);

    let monitor = access_monitor.then(|| {
        println!("   {} relay pulses for registered tags", "Access monitor:".green());
        server
            .state()
            .service
            .access_monitor(Arc::new(ScriptedRelay::new()))
            .spawn()
    });

    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .context("Invalid bind address")?;
    server
        .run_until(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    if let Some(handle) = monitor {
        handle.abort();
    }

    Ok(())
}

/// Presents each stdin line as a tag. `!fault` injects a reader fault.
async fn feed_from_stdin(device: Arc<ScriptedReader>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "!fault" {
            device.fail("simulated reader fault");
            continue;
        }
        match TagUid::new(line) {
            Ok(uid) => {
                info!(%uid, "Simulated tag presented");
                device.present(uid);
            }
            Err(e) => warn!(error = %e, "Ignoring input"),
        }
    }
}

/// List registered tags
async fn cmd_list(client: &Client) -> Result<()> {
    #[derive(Deserialize)]
    struct Listing {
        tags: Vec<TagRecord>,
        total: usize,
    }

    let listing: Listing = client.send(client.http.get(client.url("/api/v1/tags"))).await?;

    if listing.total == 0 {
        println!("{}", "No tags registered.".yellow());
        return Ok(());
    }

    println!("{} {} tag(s):\n", "📋".cyan(), listing.total);
    for record in listing.tags {
        println!(
            "   {:<24} {:<20} {}",
            record.uid.to_string().green(),
            record.username,
            record.registered_at.format("%Y-%m-%d %H:%M:%S UTC").to_string().dimmed()
        );
    }

    Ok(())
}

/// Register the next scanned tag
async fn cmd_register(client: &Client, username: &str) -> Result<()> {
    #[derive(Deserialize)]
    struct Registered {
        record: TagRecord,
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg} ({elapsed})")?);
    spinner.set_message(format!("Present a tag to the reader for {}", username.bold()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let request = client
        .http
        .put(client.url("/api/v1/tags"))
        .json(&serde_json::json!({ "username": username }));
    let result: Result<Registered> = client.send(request).await;
    spinner.finish_and_clear();

    let registered = result?;
    println!("{}", "✅ Tag registered:".green().bold());
    println!("   {} {}", "UID:".yellow(), registered.record.uid);
    println!("   {} {}", "User:".yellow(), registered.record.username);

    Ok(())
}

/// Remove a tag by UID or by scan
async fn cmd_remove(client: &Client, uid: Option<String>, yes: bool) -> Result<()> {
    #[derive(Deserialize)]
    struct Removed {
        success: bool,
        uid: Option<TagUid>,
    }

    let prompt = match &uid {
        Some(uid) => format!("Remove tag {}?", uid),
        None => "Remove the next tag presented to the reader?".to_string(),
    };
    if !yes
        && !dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()?
    {
        println!("Aborted.");
        return Ok(());
    }

    let mut request = client.http.delete(client.url("/api/v1/tags"));
    let spinner = match &uid {
        Some(uid) => {
            request = request.query(&[("uid", uid)]);
            None
        }
        None => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_message("Present the tag to remove");
            spinner.enable_steady_tick(Duration::from_millis(100));
            Some(spinner)
        }
    };

    let result: Result<Removed> = client.send(request).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let removed = result?;

    let shown = removed.uid.map(|u| u.to_string()).or(uid).unwrap_or_default();
    if removed.success {
        println!("{} {}", "🗑  Removed".green(), shown);
    } else {
        println!("{} {} was not registered", "ℹ️ ".cyan(), shown);
    }

    Ok(())
}

/// Show server status
async fn cmd_status(client: &Client) -> Result<()> {
    let health: serde_json::Value = client.send(client.http.get(client.url("/health"))).await?;
    let reader: serde_json::Value = client.send(client.http.get(client.url("/api/v1/reader"))).await?;

    println!("{}", "📡 rfidreg status".cyan().bold());
    println!("   {} {}", "Server:".dimmed(), client.base);
    println!("   {} {}", "Version:".dimmed(), health["version"].as_str().unwrap_or("?"));
    println!("   {} {}s", "Uptime:".dimmed(), health["uptime_seconds"]);
    println!("   {} {}", "Tags:".dimmed(), health["tag_count"]);
    if reader["armed"].as_bool().unwrap_or(false) {
        println!("   {} {}", "Reader:".dimmed(), "waiting for a tag".yellow());
    } else {
        println!(
            "   {} idle (last attempt: {})",
            "Reader:".dimmed(),
            reader["state"].as_str().unwrap_or("?")
        );
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// HTTP client
// ═══════════════════════════════════════════════════════════════════════════

struct Client {
    http: reqwest::Client,
    base: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl Client {
    fn new(base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn send<T: serde::de::DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base))?;

        if response.status().is_success() {
            return response.json().await.context("Unexpected response body");
        }

        let status = response.status();
        match response.json::<ErrorResponse>().await {
            Ok(body) => bail!("{} ({}): {}", body.error.code, status, body.error.message),
            Err(_) => bail!("Request failed with {}", status),
        }
    }
}
