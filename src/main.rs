use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use color_eyre::Result;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthVerifier;
use crate::cli::Cli;
use crate::hub::ConnectionHub;
use crate::rate_limit::RateLimiter;
use crate::registry::RoomRegistry;
use crate::stats_sink::LoggingStatsSink;
use crate::track_source::{HttpTrackSource, MockTrackSource, TrackSource};
use crate::ws::AppState;

mod auth;
mod cli;
mod clock;
mod error;
mod fuzzy;
mod health;
mod hub;
mod model;
mod protocol;
mod rate_limit;
mod registry;
mod room;
mod score;
mod stats_sink;
mod track_source;
mod ws;

const SHUTDOWN_DRAIN: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().unwrap();
    setup_tracing();

    let options = Cli::parse();

    let track_source: Arc<dyn TrackSource> = match options.track_source_url {
        Some(url) => Arc::new(HttpTrackSource::new(url)),
        None => Arc::new(MockTrackSource::new()),
    };
    let auth = Arc::new(AuthVerifier::new(options.auth_secret));
    let hub = Arc::new(ConnectionHub::new(
        Arc::new(RoomRegistry::new()),
        Arc::new(RateLimiter::new()),
        track_source,
        Arc::new(LoggingStatsSink),
    ));

    let ticker = tokio::spawn(hub.clone().run_background_ticks());

    let app = Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/health", get(health::liveness))
        .route("/ready", get(health::readiness))
        .with_state(AppState { hub, auth })
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", options.port)).await?;
    info!(port = options.port, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ticker.abort();
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

    tokio::select! {
        _ = sigint.recv() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    info!(drain_secs = SHUTDOWN_DRAIN.as_secs(), "draining connections before exit");
    tokio::time::sleep(SHUTDOWN_DRAIN).await;
}

pub fn setup_tracing() {
    use tracing_subscriber::filter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = filter::EnvFilter::builder().from_env().unwrap();
    let fmt = fmt::layer().pretty().with_line_number(true);

    let _ignore_err = tracing_subscriber::registry()
        .with(fmt)
        .with(filter)
        .try_init();
}
