//! HTTP entry point: method gate, body parsing, key check and dispatch.

use crate::ai::{GeminiHttpClient, UpstreamService};
use crate::models::{Config, InboundRequest, StatusPolicy};
use crate::{payload, relay, Error, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Path the browser client has always posted to.
pub const FUNCTION_PATH: &str = "/.netlify/functions/generate";
pub const API_PATH: &str = "/api/generate";

/// Shared, read-only handler state.
///
/// `upstream` is `None` when no provider key is configured, so a request can
/// never reach the provider without one.
#[derive(Clone)]
pub struct AppState {
    upstream: Option<Arc<dyn UpstreamService>>,
    status_policy: StatusPolicy,
}

impl AppState {
    pub fn new(upstream: Option<Arc<dyn UpstreamService>>, status_policy: StatusPolicy) -> Self {
        Self {
            upstream,
            status_policy,
        }
    }

    pub fn from_config(config: &Config, http_client: reqwest::Client) -> Self {
        let upstream = config.api_key.as_ref().map(|api_key| {
            Arc::new(GeminiHttpClient::new_with_client(
                api_key.clone(),
                &config.upstream,
                http_client,
            )) as Arc<dyn UpstreamService>
        });

        if upstream.is_none() {
            warn!("GOOGLE_API_KEY is not set; every request will fail until it is configured");
        }

        Self::new(upstream, config.status_policy)
    }
}

pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route(FUNCTION_PATH, any(generate))
        .route(API_PATH, any(generate))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// Build the full application from configuration.
pub fn app(config: &Config) -> Router {
    // One connection pool for every upstream call.
    let state = AppState::from_config(config, reqwest::Client::new());
    router(state, config.max_body_bytes)
}

pub async fn serve(config: Config) -> Result<()> {
    let listener = TcpListener::bind(config.bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    info!(
        "Text model: {}, image model: {}",
        config.upstream.text_model, config.upstream.image_model
    );

    axum::serve(listener, app(&config)).await?;
    Ok(())
}

async fn generate(State(state): State<AppState>, method: Method, body: Bytes) -> Response {
    let span = tracing::info_span!("generate", request_id = %Uuid::new_v4());
    handle(state, method, body).instrument(span).await
}

async fn handle(state: AppState, method: Method, body: Bytes) -> Response {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let request = match InboundRequest::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            error!("Malformed request body: {}", e);
            return relay::failure(&e, state.status_policy);
        }
    };

    let Some(upstream) = state.upstream.as_deref() else {
        error!("API key is not set.");
        return relay::failure(&Error::MissingApiKey, state.status_policy);
    };

    let payload = payload::build(&request);
    info!("Forwarding {} request", payload.label());

    relay::relay(upstream, &payload, state.status_policy).await
}
