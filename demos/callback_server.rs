//! Example merchant server using Axum.
//!
//! This example demonstrates how to redirect customers to the payment page and
//! answer the gateway's check and register callbacks.
//!
//! Run with:
//! ```bash
//! cargo run --example callback_server
//! ```
//!
//! Environment variables:
//! - BOG_PAYMENT_CONFIG: Path to a JSON gateway configuration
//! - PORT: Server port (default: 3000)

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, Uri},
    response::Response,
    routing::get,
    Router,
};
use bog_payment::{
    CallbackHandler, CallbackOutcome, CallbackRequest, GatewayClient, GatewayConfig, HttpResponse,
    ResponseMode,
};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
struct AppState {
    config: Arc<GatewayConfig>,
    client: GatewayClient,
    callbacks: Arc<CallbackHandler>,
}

fn into_axum(response: HttpResponse) -> Response {
    let mut builder = axum::http::Response::builder().status(response.status.as_u16());
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

fn callback_request(peer: SocketAddr, headers: &HeaderMap, uri: &Uri) -> Option<CallbackRequest> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let request = CallbackRequest::new("GET", format!("https://{}{}", host, uri), peer.ip().to_string()).ok()?;

    Some(match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(auth) => request.with_authorization_header(auth),
        None => request,
    })
}

/// Sends the customer to the payment page.
async fn pay(State(state): State<AppState>) -> Response {
    match state.client.redirect(&[("o.order_id", "42")], false) {
        Ok(response) => into_axum(response),
        Err(e) => into_axum(HttpResponse::text(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            e.to_string(),
        )),
    }
}

/// Gateway asks whether order `o.order_id` can be paid.
async fn check(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let Some(request) = callback_request(peer, &headers, &uri) else {
        return into_axum(state.callbacks.responder().check_error("Bad request"));
    };

    let config = state.config.clone();
    into_axum(state.callbacks.handle(&request, ResponseMode::Check, |request| {
        match request.param("o.order_id") {
            Some(order) => CallbackOutcome::Accept(Some(config.check_result(
                request.param_or("trx_id", ""),
                format!("Order {}", order),
                format!("Payment for order {}", order),
                2500,
            ))),
            None => CallbackOutcome::Reject("Order not found".to_string()),
        }
    }))
}

/// Gateway reports the final payment result.
async fn register(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let Some(request) = callback_request(peer, &headers, &uri) else {
        return into_axum(state.callbacks.responder().register_error("Bad request"));
    };

    into_axum(state.callbacks.handle(&request, ResponseMode::Register, |request| {
        tracing::info!(
            trx_id = request.param_or("trx_id", ""),
            result = request.param_or("result_code", ""),
            "Payment registered"
        );
        CallbackOutcome::Accept(None)
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bog_payment=debug".into()),
        )
        .init();

    dotenvy::dotenv().ok();

    let config_path =
        std::env::var("BOG_PAYMENT_CONFIG").unwrap_or_else(|_| "bogpayment.json".to_string());
    let config = Arc::new(GatewayConfig::from_json(&std::fs::read_to_string(&config_path)?)?);

    let state = AppState {
        client: GatewayClient::new(config.clone())?,
        callbacks: Arc::new(CallbackHandler::from_config(config.clone())?),
        config,
    };

    let app = Router::new()
        .route("/pay", get(pay))
        .route("/bog/check", get(check))
        .route("/bog/register", get(register))
        .with_state(state);

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    tracing::info!(port, "Merchant server listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
