// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless table client: connects to the store, runs the configured feature
//! sessions at a fixed tick, and nudges the companion producer over HTTP.

mod control;
mod prefs;
mod sink;

use anyhow::{Context, Result};
use clap::Parser;
use control::HttpControl;
use natar_app_core::config_port::ConfigPort;
use natar_app_core::control_port::{ControlPort, NoControl};
use natar_services::build::{link_config, sessions_from_prefs};
use natar_services::{ConnectionState, Table};
use natar_store_client::StoreLink;
use prefs::FsPrefs;
use sink::TracingSink;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Natar table client")]
struct Args {
    /// Store host (overrides saved preferences)
    #[arg(long)]
    host: Option<String>,
    /// Store port (overrides saved preferences)
    #[arg(long)]
    port: Option<u16>,
    /// Tick rate in Hz (overrides saved preferences)
    #[arg(long)]
    tick_hz: Option<u32>,
    /// Never call the companion control endpoint
    #[arg(long)]
    no_control: bool,
    /// Write the effective preferences back to the config directory
    #[arg(long)]
    save: bool,
    /// Seconds between rate reports (0 disables)
    #[arg(long, default_value_t = 10)]
    stats_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = FsPrefs::open();
    let mut prefs = config.load_prefs().unwrap_or_default();
    if let Some(host) = args.host {
        prefs.store.host = host;
    }
    if let Some(port) = args.port {
        prefs.store.port = port;
    }
    if let Some(tick_hz) = args.tick_hz {
        prefs.tick_hz = tick_hz;
    }
    if args.save {
        config.save_prefs(&prefs);
    }

    let mut link = StoreLink::new(link_config(&prefs.store));
    if let Err(err) = link.connect() {
        warn!(addr = %link.config().address(), %err, "store not reachable yet; will retry");
    }
    let mut table = Table::new(link);
    for session in sessions_from_prefs(&prefs) {
        table.add_session(session);
    }

    let control: Box<dyn ControlPort> = if prefs.control.enabled && !args.no_control {
        Box::new(
            HttpControl::new(prefs.control.clone(), tokio::runtime::Handle::current())
                .context("building control client")?,
        )
    } else {
        Box::new(NoControl)
    };

    let mut sink = TracingSink::new(Duration::from_secs(args.stats_secs));
    let period = Duration::from_secs_f64(1.0 / f64::from(prefs.tick_hz.max(1)));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        addr = %table.link().config().address(),
        sessions = table.sessions().len(),
        tick_hz = prefs.tick_hz,
        "table running"
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                table.tick(now, &mut sink, control.as_ref());
                sink.end_tick(now);
            }
            res = &mut shutdown => {
                if let Err(err) = res {
                    warn!(%err, "signal handler failed");
                }
                break;
            }
        }
    }

    info!(
        working = table.count_in(ConnectionState::Working),
        "shutting down"
    );
    table.shutdown();
    Ok(())
}
