use std::{any::Any, net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    auth::{self, session::with_sessions},
    config::AppConfig,
    error::AppError,
    state::AppState,
    users,
};

/// Turns a handler panic into the standard JSON 500. The panic itself is
/// logged, with its backtrace, by the hook installed in `main`.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::internal("Internal server error", anyhow::anyhow!(detail)).into_response()
}

pub fn build_app(state: AppState) -> Router {
    let config = state.config.clone();

    let mut user_routes = users::router(config.max_upload_bytes);
    if config.require_auth {
        user_routes = user_routes.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session::require_session,
        ));
    }

    let routes = Router::new()
        .merge(user_routes)
        .merge(auth::router())
        .nest_service("/public", ServeDir::new(&config.static_dir))
        .route_service("/", ServeFile::new(config.static_dir.join("index.html")));

    with_middleware(routes, state)
}

/// Panic recovery, timeout, sessions and request tracing, innermost first.
fn with_middleware(routes: Router<AppState>, state: AppState) -> Router {
    let config = state.config.clone();
    let router = routes
        .with_state(state)
        .layer(CatchPanicLayer::custom(handle_panic));
    let router = with_timeout(router, Duration::from_secs(config.request_timeout_secs));

    with_sessions(router, &config.session).layer(
        TraceLayer::new_for_http()
            .make_span_with(|req: &axum::http::Request<_>| {
                let method = req.method().clone();
                let uri = req.uri().clone();
                tracing::info_span!(
                    "http_request",
                    %method,
                    uri = %uri,
                    status = tracing::field::Empty
                )
            })
            .on_response(
                |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                    let status = res.status();
                    span.record("status", tracing::field::display(status));
                    let latency_ms = latency.as_millis();
                    if status.is_server_error() {
                        tracing::error!(%status, latency_ms, "response");
                    } else {
                        tracing::info!(%status, latency_ms, "response");
                    }
                },
            ),
    )
}

/// `TimeoutLayer` answers with an empty 408; the outer map gives it the usual
/// error body.
fn with_timeout(router: Router, timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(timeout))
        .layer(middleware::map_response(timeout_body))
}

async fn timeout_body(res: Response) -> Response {
    if res.status() == StatusCode::REQUEST_TIMEOUT {
        tracing::warn!("request timed out");
        AppError::Timeout.into_response()
    } else {
        res
    }
}

pub async fn serve(app: Router, config: &AppConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
