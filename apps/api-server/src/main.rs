//! # Vitae API Server
//!
//! Actix-web gateway in front of the LLM-backed CV features. Every costly
//! endpoint is gated by the per-feature multi-window rate limiter.

use actix_web::{App, HttpServer, web};
use tracing_actix_web::TracingLogger;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod observability;
mod state;
mod telemetry;

use config::AppConfig;
use observability::RequestIdMiddleware;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        backend = ?config.store_backend,
        "Starting Vitae API Server on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config)
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))?;

    #[cfg(feature = "scheduler")]
    let mut scheduler = start_scheduler(&config, &state).await;

    let server_state = state.clone();
    let result = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .wrap(RequestIdMiddleware)
            .app_data(web::Data::new(server_state.clone()))
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await;

    #[cfg(feature = "scheduler")]
    if let Some(scheduler) = scheduler.as_mut() {
        if let Err(e) = scheduler.shutdown().await {
            tracing::error!("Failed to stop scheduler: {}", e);
        }
    }

    tracing::info!("Server stopped");
    result
}

/// Start the hourly idle-bucket sweep. Failures are logged and the server
/// runs without it.
#[cfg(feature = "scheduler")]
async fn start_scheduler(config: &AppConfig, state: &AppState) -> Option<background::Scheduler> {
    use background::{Scheduler, SchedulerConfig};

    let scheduler = match Scheduler::new(SchedulerConfig::from_env()).await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            tracing::error!("Failed to create scheduler: {}", e);
            return None;
        }
    };

    if let Err(e) =
        background::register_sweep(&scheduler, &config.sweep_schedule, state.limiter.clone()).await
    {
        tracing::error!(schedule = %config.sweep_schedule, "Failed to register sweep: {}", e);
        return None;
    }

    if let Err(e) = scheduler.start().await {
        tracing::error!("Failed to start scheduler: {}", e);
        return None;
    }

    Some(scheduler)
}
