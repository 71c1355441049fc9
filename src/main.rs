pub mod analysis;
pub mod api;
pub mod config;
pub mod csv_history;
pub mod data_structures;
pub mod history;
pub mod jquants;

use crate::config::SharedAppConfig;
use crate::history::{HistoryProvider, HistorySource, SharedHistoryProvider};
use axum::{Router, extract::FromRef, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::cors::CorsLayer;

#[derive(Clone)]
struct AppState {
    provider: SharedHistoryProvider,
    config: SharedAppConfig,
}

impl FromRef<AppState> for SharedHistoryProvider {
    fn from_ref(app_state: &AppState) -> SharedHistoryProvider {
        app_state.provider.clone()
    }
}

impl FromRef<AppState> for SharedAppConfig {
    fn from_ref(app_state: &AppState) -> SharedAppConfig {
        app_state.config.clone()
    }
}

#[tokio::main]
async fn main() {
    let app_config = config::AppConfig::load();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    tracing::info!("Starting stock-buddy");
    tracing::info!(
        environment = %app_config.environment,
        port = app_config.port,
        index_code = %app_config.market_index_code,
        "Loaded configuration"
    );

    let source = match &app_config.csv_data_dir {
        Some(dir) => {
            tracing::info!(data_dir = %dir, "Using local CSV history store");
            HistorySource::Csv(csv_history::CsvHistoryStore::new(dir))
        }
        None => {
            let refresh_token = app_config
                .jquants_refresh_token
                .clone()
                .expect("JQUANTS_REFRESH_TOKEN must be set when CSV_DATA_DIR is not configured");
            let client = jquants::JquantsClient::new(
                app_config.jquants_base_url.clone(),
                refresh_token,
                app_config.jquants_rate_limit_per_minute,
            )
            .expect("Failed to build J-Quants client");
            tracing::info!(base_url = %app_config.jquants_base_url, "Using J-Quants history client");
            HistorySource::Jquants(Mutex::new(client))
        }
    };

    let provider: SharedHistoryProvider =
        Arc::new(HistoryProvider::new(source, app_config.clone()));

    let app_state = AppState {
        provider,
        config: Arc::new(app_config.clone()),
    };

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .finish()
            .unwrap(),
    );

    let app = Router::new()
        .route("/health", get(api::health_handler))
        .route(
            "/beta/{code}",
            get(api::beta_handler).layer(GovernorLayer::new(governor_conf)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
