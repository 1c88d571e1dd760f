//! LunaTrack - a small self-hosted cycle tracker.
//!
//! # Overview
//!
//! The server stores recorded cycle start dates and settings as JSON files and
//! answers every statistics request by recomputing from scratch: average cycle
//! length, upcoming predicted starts, and optional ovulation/fertile windows.
//!
//! # Configuration
//!
//! - `LUNATRACK_PORT` - listen port (default 3001)
//! - `LUNATRACK_DATA_DIR` - directory for `settings.json` and entry files (default `data`)
//! - `RUST_LOG` - tracing filter (default `lunatrack=info`)
//!
//! # API Endpoints
//!
//! - `GET /api/entries` - Statistics and predictions
//! - `POST /api/entries` - Record a date
//! - `DELETE /api/entries/:date` - Remove a date
//! - `GET|PUT /api/settings` - Settings record
//! - `GET|PUT /api/enable-ovulation`, `GET|PUT /api/ports` - Single-setting shortcuts
//! - `GET /api/inspiration/:id` - Inspiration message lookup
//! - `GET /api/health` - Health check

use std::env;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use lunatrack::api::{AppState, router};
use lunatrack::storage::Storage;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3001;

/// Default data directory if not specified via environment variable.
const DEFAULT_DATA_DIR: &str = "data";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("lunatrack=info".parse()?))
        .init();

    let port: u16 = env::var("LUNATRACK_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(DEFAULT_PORT);

    let data_dir = env::var("LUNATRACK_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string());

    info!(port, data_dir = %data_dir, "Starting LunaTrack server");

    let storage = Storage::new(&data_dir).await?;
    let settings = storage.read_settings().await?;
    info!(
        data_file = %settings.data_file,
        default_cycle_length = settings.default_cycle_length,
        enable_ovulation = settings.enable_ovulation,
        "Settings loaded"
    );

    let app = router(AppState { storage });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(%addr, "LunaTrack is listening");

    axum::serve(listener, app).await?;

    Ok(())
}
