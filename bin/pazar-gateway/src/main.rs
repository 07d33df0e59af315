//! # Pazar Gateway Binary
//!
//! The entry point that assembles the application based on compile-time
//! features.

use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use pg_api::controller::Controller;
use pg_api::handlers::AppState;
use pg_api::middleware;
use pg_core::config::GatewayConfig;
use pg_core::Store;

// Feature-gated imports: the binary is compiled to order
#[cfg(feature = "agent-http")]
use pg_agent_http::AgentHttpBackend;
#[cfg(feature = "db-sqlite")]
use pg_db_sqlite::SqliteStore;
#[cfg(feature = "safety-http")]
use pg_safety_http::SafetyHttpClassifier;

/// Belt-and-suspenders next to the lazy timeout in the session manager.
const SWEEP_INTERVAL_SECS: u64 = 300;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = GatewayConfig::from_env();

    // 1. Initialize the persistence implementation
    #[cfg(feature = "db-sqlite")]
    let store = {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:pazar_gateway.db?mode=rwc".to_string());
        Arc::new(SqliteStore::new(&url).await.expect("Failed to init SQLite"))
    };

    // 2. Initialize the safety classifier client
    let classifier_configured = std::env::var("SAFETY_CLASSIFIER_URL").is_ok();
    #[cfg(feature = "safety-http")]
    let classifier = {
        let url = std::env::var("SAFETY_CLASSIFIER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8100".to_string());
        Arc::new(SafetyHttpClassifier::new(&url, config.safety_timeout))
    };

    // 3. Initialize the agent backend client
    let agent_configured = std::env::var("AGENT_BACKEND_URL").is_ok();
    #[cfg(feature = "agent-http")]
    let agent = {
        let url = std::env::var("AGENT_BACKEND_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        Arc::new(AgentHttpBackend::new(&url, config.agent_timeout))
    };

    // 4. Assemble the controller behind dynamic dispatch
    let controller = Controller::new(
        config.clone(),
        store.clone(),
        store.clone(),
        classifier,
        agent,
    );
    let state = web::Data::new(AppState {
        controller,
        turn_deadline: config.turn_deadline,
        classifier_configured,
        agent_configured,
    });

    // 5. Periodic sweep of expired sessions
    let sweep_store = store.clone();
    actix_web::rt::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            ticker.tick().await;
            match sweep_store.sweep_expired_sessions(chrono::Utc::now()).await {
                Ok(0) => {}
                Ok(n) => log::info!("session sweep timed out {n} expired sessions"),
                Err(e) => log::warn!("session sweep failed: {e}"),
            }
        }
    });

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("🚀 pazar-gateway starting on http://{bind}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::cors_policy())
            .wrap(middleware::standard_middleware())
            .configure(pg_api::configure_routes)
    })
    .bind(bind)?
    .run()
    .await
}
