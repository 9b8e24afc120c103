use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use opencontroller_link::codec::{FrameEncoder, ProtocolMode};
use opencontroller_link::config::AppConfig;
use opencontroller_link::link::{ConnectionState, LinkHandle, LinkStatus};
use opencontroller_link::mapping::ControlLayout;
use opencontroller_link::scheduler::SubmitOptions;
use opencontroller_link::LinkError;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Streams control values read from stdin to a virtual input device server
///
/// Each input line is `<control id> <raw value>`, for example `1 -0.35`.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Server websocket url, overrides the configured one
    #[arg(long)]
    url: Option<String>,

    /// Configuration file, defaults to the user config directory
    #[arg(long)]
    config: Option<PathBuf>,

    /// Send JSON snapshots instead of binary frames
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::ensure_default(&config_path).await?;
    info!("Configuration loaded from {}", config_path.display());

    if args.json {
        config.link.protocol = ProtocolMode::Json;
    }
    let url = args.url.unwrap_or_else(|| config.server_url.clone());

    let encoder = FrameEncoder::for_mode(
        config.link.protocol,
        config.layout.bindings(),
        Some(config.layout.layout_id.clone()),
    );
    let mut link = LinkHandle::spawn(config.link.clone(), encoder)?;
    link.connect(&url).await?;

    let status_task = tokio::spawn(watch_status(link.subscribe()));

    let outcome = tokio::select! {
        result = forward_stdin(&link, &config.layout) => result,
        result = status_task => match result {
            Ok(result) => result,
            Err(e) => Err(eyre!("Status watcher failed: {}", e)),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted");
            Ok(())
        }
    };

    match link.stats().await {
        Ok(stats) => info!(
            "Sent {} frames, coalesced {}, dropped {}, average latency {:?}ms",
            stats.frames_sent,
            stats.messages_coalesced,
            stats.queue_evictions + stats.queue_rejections + stats.messages_dropped,
            stats.average_latency_ms
        ),
        Err(e) => debug!("No final stats: {}", e),
    }

    link.shutdown().await?;
    outcome
}

/// Reads `<id> <raw>` lines and submits them until stdin closes
async fn forward_stdin(link: &LinkHandle, layout: &ControlLayout) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((id, raw)) = parse_line(line) else {
            warn!("Ignoring malformed input line: {}", line);
            continue;
        };

        let Some(control) = layout.control(id) else {
            warn!("Unknown control {}", id);
            continue;
        };

        let result = match &control.shaping {
            Some(shaping) if control.is_analog() => link.submit_control(id, raw, shaping),
            _ if control.is_analog() => link.submit_value(id, raw, SubmitOptions::default()),
            // Button edges must not be coalesced away
            _ => link.submit_value(id, raw, SubmitOptions::priority()),
        };
        if let Err(e) = result {
            warn!("Submission of {} for {} failed: {}", raw, control.label, e);
        }
    }

    info!("Input closed");
    Ok(())
}

fn parse_line(line: &str) -> Option<(u16, f32)> {
    let mut parts = line.split_whitespace();
    let id = parts.next()?.parse().ok()?;
    let raw = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((id, raw))
}

/// Logs status changes, fails once reconnection is given up
async fn watch_status(mut status: watch::Receiver<LinkStatus>) -> Result<()> {
    loop {
        if status.changed().await.is_err() {
            return Ok(());
        }
        let current = status.borrow_and_update().clone();
        match current.state {
            ConnectionState::Open => info!("Connected"),
            ConnectionState::Reconnecting => {
                warn!("Connection lost, reconnect attempt {}", current.reconnect_attempt)
            }
            ConnectionState::Failed => {
                error!("Giving up after {} attempts", current.reconnect_attempt);
                return Err(LinkError::ReconnectExhausted(current.reconnect_attempt).into());
            }
            state => debug!("Link {} (latency {:?}ms)", state, current.latency_ms),
        }
    }
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(std::env::var("RUST_LOG").ok().as_deref());
    Ok(())
}

/// Honors `RUST_LOG`, e.g. `RUST_LOG=opencontroller_link=debug`
fn setup_logging_env(directives: Option<&str>) {
    FmtSubscriber::builder()
        .with_env_filter(log_filter(directives))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

/// Falls back to `info` when the directives are missing or unparsable
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_follows_directives() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(
            log_filter(Some("opencontroller_link=trace")).to_string(),
            "opencontroller_link=trace"
        );
        assert_eq!(log_filter(Some("opencontroller_link=loud")).to_string(), "info");
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("1 -0.35"), Some((1, -0.35)));
        assert_eq!(parse_line("1"), None);
        assert_eq!(parse_line("x 0.5"), None);
        assert_eq!(parse_line("1 0.5 extra"), None);
    }
}
