//! Server-side functionality for gateway callbacks.
//!
//! This module ties the access guard, signature verifier and XML responder
//! into the pipeline every callback goes through:
//!
//! 1. **Access guard**: basic auth, then source address. Failures end the
//!    exchange with a plain 401/403 before any XML is produced.
//! 2. **Signature**: failures end the exchange with the mode's XML error
//!    document, still with status 200.
//! 3. **Business logic**: supplied by the application.
//! 4. **Response**: the mode's success or error document.
//!
//! Every step that ends the exchange hands back an [`HttpResponse`]; the web
//! layer writes it and runs nothing further for that request.

use crate::config::GatewayConfig;
use crate::errors::{GatewayError, Result};
use crate::guard::{denial_response, AccessGuard};
use crate::response::XmlResponder;
use crate::signature::SignatureVerifier;
use crate::types::{CallbackRequest, CheckResult, HttpResponse, ResponseMode};
use std::sync::Arc;

/// A callback that must not be processed further.
#[derive(Debug)]
pub struct Rejection {
    /// Why the callback was rejected
    pub error: GatewayError,

    /// What to send back
    pub response: HttpResponse,
}

/// What the application decided about a verified callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// Accept; check callbacks carry the purchase details
    Accept(Option<CheckResult>),
    /// Reject with a description for the gateway
    Reject(String),
}

/// Runs gateway callbacks through guard, verification and response.
#[derive(Clone, Debug)]
pub struct CallbackHandler {
    guard: AccessGuard,
    verifier: SignatureVerifier,
    responder: XmlResponder,
}

impl CallbackHandler {
    /// Creates a handler with an already loaded verifier.
    pub fn new(config: Arc<GatewayConfig>, verifier: SignatureVerifier) -> Self {
        Self {
            responder: XmlResponder::new(config.debug),
            guard: AccessGuard::new(config),
            verifier,
        }
    }

    /// Creates a handler, loading the certificate from `cert_path`.
    pub fn from_config(config: Arc<GatewayConfig>) -> Result<Self> {
        let verifier = SignatureVerifier::from_config(&config)?;
        Ok(Self::new(config, verifier))
    }

    /// The responder used for callback documents.
    pub fn responder(&self) -> &XmlResponder {
        &self.responder
    }

    /// Checks basic-auth credentials.
    pub fn check_auth(&self, request: &CallbackRequest) -> std::result::Result<(), Rejection> {
        self.guard.check_auth(request).map_err(deny)
    }

    /// Checks the client address.
    pub fn check_ip_allowed(&self, request: &CallbackRequest) -> std::result::Result<(), Rejection> {
        self.guard.check_ip_allowed(request).map_err(deny)
    }

    /// Checks the callback signature, answering in `mode` on failure.
    pub fn check_signature(
        &self,
        request: &CallbackRequest,
        mode: ResponseMode,
    ) -> std::result::Result<(), Rejection> {
        self.verifier.check_signature(request).map_err(|error| {
            let response = self.responder.send_error(mode, &error.to_string());
            Rejection { error, response }
        })
    }

    /// Runs every check in order, stopping at the first rejection.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use bog_payment::config::GatewayConfig;
    /// use bog_payment::server::CallbackHandler;
    /// use bog_payment::types::{CallbackRequest, HttpResponse, ResponseMode};
    /// use std::sync::Arc;
    ///
    /// # fn example() -> Result<HttpResponse, Box<dyn std::error::Error>> {
    /// let handler = CallbackHandler::from_config(Arc::new(GatewayConfig::default()))?;
    /// let request = CallbackRequest::new(
    ///     "GET",
    ///     "https://shop.example.ge/bog/register?trx_id=1&signature=abc",
    ///     "213.131.36.62",
    /// )?;
    ///
    /// if let Err(rejection) = handler.authorize(&request, ResponseMode::Register) {
    ///     return Ok(rejection.response);
    /// }
    /// Ok(handler.responder().register_success())
    /// # }
    /// ```
    pub fn authorize(
        &self,
        request: &CallbackRequest,
        mode: ResponseMode,
    ) -> std::result::Result<(), Rejection> {
        self.check_auth(request)?;
        self.check_ip_allowed(request)?;
        self.check_signature(request, mode)
    }

    /// Renders the application's decision.
    pub fn respond(&self, mode: ResponseMode, outcome: &CallbackOutcome) -> HttpResponse {
        match outcome {
            CallbackOutcome::Accept(result) => self.responder.send_success(mode, result.as_ref()),
            CallbackOutcome::Reject(message) => self.responder.send_error(mode, message),
        }
    }

    /// Authorizes the callback, runs `business` on it and renders the outcome.
    ///
    /// `business` only runs for callbacks that passed every check.
    pub fn handle<F>(&self, request: &CallbackRequest, mode: ResponseMode, business: F) -> HttpResponse
    where
        F: FnOnce(&CallbackRequest) -> CallbackOutcome,
    {
        if let Err(rejection) = self.authorize(request, mode) {
            return rejection.response;
        }

        let outcome = business(request);
        self.respond(mode, &outcome)
    }
}

fn deny(error: GatewayError) -> Rejection {
    let response = denial_response(&error).unwrap_or_else(|| {
        HttpResponse::text(reqwest::StatusCode::FORBIDDEN, "Access denied")
    });
    Rejection { error, response }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::raw_url_encode;
    use reqwest::StatusCode;

    const CERT_PEM: &str = include_str!("../tests/fixtures/gateway.cer");
    const SIGNATURE: &str = include_str!("../tests/fixtures/check.sig");
    const CALLBACK_URL: &str = "https://merchant.example.ge/bog/check?merch_id=DEMO1&trx_id=8F1D2C&o.order_id=42&lang=KA&o.desc=Coffee%20beans";

    fn handler() -> CallbackHandler {
        let config = GatewayConfig::new("DEMO1", "PAGE1")
            .with_shop_name("Coffee Shop")
            .with_account_id("ACC-1")
            .with_http_auth("bog", "secret");
        CallbackHandler::new(
            Arc::new(config),
            SignatureVerifier::from_pem(CERT_PEM).unwrap(),
        )
    }

    fn signed_request() -> CallbackRequest {
        let url = format!("{}&signature={}", CALLBACK_URL, raw_url_encode(SIGNATURE.trim()));
        CallbackRequest::new("GET", url, "213.131.36.62")
            .unwrap()
            .with_basic_auth("bog", "secret")
    }

    #[test]
    fn test_authorize_accepts_genuine_callback() {
        assert!(handler().authorize(&signed_request(), ResponseMode::Check).is_ok());
    }

    #[test]
    fn test_guard_rejections_are_plain_http() {
        let handler = handler();

        let mut request = signed_request();
        request.basic_auth = None;
        let rejection = handler.authorize(&request, ResponseMode::Check).unwrap_err();
        assert_eq!(rejection.response.status, StatusCode::UNAUTHORIZED);
        assert!(matches!(rejection.error, GatewayError::Unauthorized { .. }));

        let mut request = signed_request();
        request.client_ip = "10.1.1.1".to_string();
        let rejection = handler.authorize(&request, ResponseMode::Check).unwrap_err();
        assert_eq!(rejection.response.status, StatusCode::FORBIDDEN);
        assert_eq!(rejection.response.body, "Access denied for IP: 10.1.1.1");
    }

    #[test]
    fn test_signature_rejections_are_xml() {
        let handler = handler();
        let unsigned = CallbackRequest::new("GET", CALLBACK_URL, "213.131.36.62")
            .unwrap()
            .with_basic_auth("bog", "secret");

        let rejection = handler.authorize(&unsigned, ResponseMode::Register).unwrap_err();
        assert!(matches!(rejection.error, GatewayError::MissingSignature));
        assert_eq!(rejection.response.status, StatusCode::OK);
        assert!(rejection.response.body.starts_with("<register-payment-response>"));
        assert!(rejection.response.body.contains("<desc>Signature is missing!</desc>"));

        let forged = CallbackRequest::new(
            "GET",
            format!("{}&signature={}", CALLBACK_URL.replace("42", "43"), raw_url_encode(SIGNATURE.trim())),
            "213.131.36.62",
        )
        .unwrap()
        .with_basic_auth("bog", "secret");

        let rejection = handler.authorize(&forged, ResponseMode::Check).unwrap_err();
        assert!(matches!(rejection.error, GatewayError::InvalidSignature));
        assert!(rejection.response.body.starts_with("<payment-avail-response>"));
        assert!(rejection.response.body.contains("<code>2</code>"));
    }

    #[test]
    fn test_handle_runs_business_logic_only_when_authorized() {
        let handler = handler();

        let response = handler.handle(&signed_request(), ResponseMode::Check, |request| {
            let order = request.param_or("o.order_id", "");
            CallbackOutcome::Accept(Some(CheckResult::new(
                request.param_or("trx_id", ""),
                format!("Order {}", order),
                "Coffee beans",
                "ACC-1",
                2500,
                "981",
            )))
        });
        assert!(response.body.contains("<merchant-trx>8F1D2C</merchant-trx>"));
        assert!(response.body.contains("<shortDesc>Order 42</shortDesc>"));

        let mut request = signed_request();
        request.client_ip = "10.1.1.1".to_string();
        let mut called = false;
        let response = handler.handle(&request, ResponseMode::Check, |_| {
            called = true;
            CallbackOutcome::Reject("unreachable".to_string())
        });
        assert!(!called);
        assert_eq!(response.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_respond_reject() {
        let response = handler().respond(
            ResponseMode::Register,
            &CallbackOutcome::Reject("Order already paid".to_string()),
        );
        assert!(response.body.contains("<code>2</code>"));
        assert!(response.body.contains("<desc>Order already paid</desc>"));
    }

    #[test]
    fn test_from_config_missing_certificate() {
        let config = GatewayConfig::new("M1", "P1").with_cert_path("/nonexistent/bog.cer");
        assert!(CallbackHandler::from_config(Arc::new(config)).is_err());
    }
}
