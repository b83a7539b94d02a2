//! WiFi-Manager node entry point.
//!
//! Wires together the storage backend, the credential store, the connection
//! scheduler, and the captive DNS redirector, then blocks until shutdown.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- TOML, defaults on first boot
//!  └─ start services
//!       ├─ CaptiveRedirector  -- UDP background thread
//!       └─ ConnectionScheduler-- Tokio task (tick + radio events)
//! ```
//!
//! The radio driver is the platform's to supply: firmware embedding this
//! crate passes its own `RadioDriver` implementation and forwards hardware
//! events into the scheduler channel.  This standalone binary runs with the
//! simulated driver so the rest of the system can be exercised end to end.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wifimgr_node::application::credential_store::{CredentialStore, KvStore};
use wifimgr_node::application::radio::RadioDriver;
use wifimgr_node::application::scheduler::{spawn_scheduler, ConnectionScheduler};
use wifimgr_node::infrastructure::config;
use wifimgr_node::infrastructure::network::{start_captive_redirector, RedirectorConfig};
use wifimgr_node::infrastructure::radio::MockRadioDriver;
use wifimgr_node::infrastructure::storage::FileKvStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config()?;

    // Initialise structured logging.  `RUST_LOG` overrides the config level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cfg.node.log_level.clone())),
        )
        .init();

    info!("WiFi-Manager node starting");

    // ── Storage and credential store ──────────────────────────────────────────
    let data_dir = match &cfg.storage.data_dir {
        Some(dir) => dir.clone(),
        None => config::config_dir()?.join("data"),
    };
    let kv: Arc<dyn KvStore> = FileKvStore::shared(&data_dir);
    let store = Arc::new(CredentialStore::new(Arc::clone(&kv)));

    // ── Captive DNS redirector ────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let ap_address = cfg.access_point.ipv4()?;
    let redirector_config = RedirectorConfig {
        bind_address: (ap_address, cfg.access_point.dns_port).into(),
        ap_address,
    };
    match start_captive_redirector(redirector_config, Arc::clone(&running)) {
        Ok(addr) => info!("captive DNS redirector started on {addr}"),
        // Not fatal: the station side still works without the portal.
        Err(e) => error!("failed to start captive DNS redirector: {e}"),
    }

    // ── Connection scheduler ──────────────────────────────────────────────────
    let (events_tx, events_rx) = tokio::sync::mpsc::unbounded_channel();
    let radio = Arc::new(MockRadioDriver::new());
    radio.attach_events(events_tx);
    info!("no platform radio driver compiled in; running with the simulated driver");

    let scheduler = Arc::new(tokio::sync::Mutex::new(ConnectionScheduler::new(
        Arc::clone(&store),
        Arc::clone(&radio) as Arc<dyn RadioDriver>,
        kv,
        cfg.wifi.scheduler_config(),
    )));
    let scheduler_task = spawn_scheduler(
        scheduler,
        events_rx,
        cfg.wifi.tick_interval(),
        Arc::clone(&running),
    );

    // ── Ctrl-C / SIGTERM handler ──────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("WiFi-Manager node ready.  Press Ctrl-C to exit.");

    scheduler_task.await?;
    info!("WiFi-Manager node stopped");
    Ok(())
}
