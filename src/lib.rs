//! # bog-payment
//!
//! Integration with the Bank of Georgia hosted card payment gateway.
//!
//! The merchant redirects the customer to the bank's payment page. While the
//! payment is processed the bank calls back to the merchant twice, first to
//! check the payment may proceed and then to register its outcome, and expects
//! a small XML document in reply each time. Recurring charges and refunds go
//! through the bank's merchant API.
//!
//! ## Features
//!
//! - **Redirects**: Payment page URLs with optional pre-authorization
//! - **Callback guard**: HTTP basic auth and source address allow-list
//! - **Signatures**: RSA/SHA-1 verification of the signed callback URL
//! - **Responses**: `payment-avail-response` and `register-payment-response` documents
//! - **Merchant API**: Repeat (recurring) charges and refunds
//!
//! ## Quick Start
//!
//! ### Redirect
//!
//! ```rust
//! use bog_payment::client::GatewayClient;
//! use bog_payment::config::GatewayConfig;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::new("MERCHANT01", "PAGE01")
//!     .with_app_url("https://shop.example.ge");
//!
//! let client = GatewayClient::new(Arc::new(config))?;
//! let response = client.redirect(&[("o.order_id", "42")], false)?;
//! assert_eq!(response.status.as_u16(), 302);
//! # Ok(())
//! # }
//! ```
//!
//! ### Callback
//!
//! ```rust,no_run
//! use bog_payment::config::GatewayConfig;
//! use bog_payment::server::{CallbackHandler, CallbackOutcome};
//! use bog_payment::types::{CallbackRequest, ResponseMode};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Arc::new(GatewayConfig::from_json(r#"{"cert_path": "storage/app/bog.cer"}"#)?);
//! let handler = CallbackHandler::from_config(config.clone())?;
//!
//! let request = CallbackRequest::new(
//!     "GET",
//!     "https://shop.example.ge/bog/check?trx_id=ABC&o.order_id=42&signature=...",
//!     "213.131.36.62",
//! )?
//! .with_authorization_header("Basic Ym9nOnNlY3JldA==");
//!
//! let response = handler.handle(&request, ResponseMode::Check, |request| {
//!     let trx_id = request.param_or("trx_id", "");
//!     CallbackOutcome::Accept(Some(config.check_result(trx_id, "Order 42", "Order 42", 2500)))
//! });
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```
//!
//! ## Security
//!
//! - **Exact reconstruction**: The signed string is the callback URL as received,
//!   minus the trailing `signature` parameter, percent-decoded
//! - **Legacy algorithm**: The bank signs with SHA-1; verification must match it
//! - **Constant-time**: Callback credentials are compared in constant time

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod config;
pub mod errors;
pub mod guard;
pub mod refund;
pub mod response;
pub mod server;
pub mod signature;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use client::GatewayClient;
pub use config::GatewayConfig;
pub use errors::{GatewayError, Result};
pub use server::{CallbackHandler, CallbackOutcome, Rejection};
pub use types::{CallbackRequest, CheckResult, HttpResponse, RefundResult, ResponseMode};
