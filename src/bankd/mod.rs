//! HTTP shell: shared state, router and server loop.

use crate::{account::AccountPolicy, config::Config, storage::AccountStore, token::TokenService};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

pub mod auth;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

/// Everything a request needs, built once at startup.
pub struct AppState {
    store: Arc<dyn AccountStore>,
    tokens: TokenService,
    policy: AccountPolicy,
    token_header: HeaderName,
}

impl AppState {
    #[must_use]
    pub fn new(config: &Config, store: Arc<dyn AccountStore>) -> Self {
        Self {
            store,
            tokens: TokenService::new(config),
            policy: config.account_policy().clone(),
            token_header: config.token_header().clone(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn AccountStore {
        self.store.as_ref()
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn account_policy(&self) -> &AccountPolicy {
        &self.policy
    }

    #[must_use]
    pub fn token_header(&self) -> &HeaderName {
        &self.token_header
    }
}

/// Build the application router.
///
/// `/accounts/:id` is gated on account ownership, `/transfer` on a valid token.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let owner = Router::new()
        .route(
            "/accounts/:id",
            get(handlers::accounts::get_account).delete(handlers::accounts::delete_account),
        )
        .route_layer(middleware::from_fn(auth::require_account_owner));

    let authenticated = Router::new()
        .route("/transfer", post(handlers::transfer::transfer))
        .route_layer(middleware::from_fn(auth::require_token));

    Router::new()
        .route("/login", post(handlers::login::login))
        .route(
            "/accounts",
            get(handlers::accounts::list_accounts).post(handlers::accounts::create_account),
        )
        .route("/health", get(handlers::health))
        .merge(owner)
        .merge(authenticated)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests;
