//! Core type definitions for the gateway protocol.
//!
//! This module contains the inbound callback request, the payloads the merchant
//! reports back to the gateway, and the response value every terminal outcome
//! is expressed as.

use crate::errors::{GatewayError, Result};
use crate::utils::parse_basic_auth;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// Content type of every callback reply.
pub const XML_CONTENT_TYPE: &str = "text/xml";

/// Which callback flow is being answered.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Payment availability check, answered with `payment-avail-response`
    #[default]
    Check,
    /// Payment registration, answered with `register-payment-response`
    Register,
}

impl ResponseMode {
    /// Root element of the XML document for this mode.
    pub fn root_tag(self) -> &'static str {
        match self {
            ResponseMode::Check => "payment-avail-response",
            ResponseMode::Register => "register-payment-response",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Check => f.write_str("check"),
            ResponseMode::Register => f.write_str("register"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "check" => Ok(ResponseMode::Check),
            "register" => Ok(ResponseMode::Register),
            other => Err(GatewayError::ConfigError(format!("unknown response mode: {}", other))),
        }
    }
}

/// Successful payment-check payload.
///
/// Values are stored raw; escaping and truncation happen when the response is
/// rendered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    /// Merchant transaction ID
    pub trx_id: String,

    /// Short purchase description (rendered up to 30 characters)
    pub short_desc: String,

    /// Long purchase description (rendered up to 125 characters)
    pub long_desc: String,

    /// Account ID (rendered up to 32 characters)
    pub account_id: String,

    /// Amount in minor units
    pub amount: i64,

    /// ISO 4217 numeric currency code
    pub currency: String,

    /// Primary transaction of a recurring charge, if this is a repeat
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_trx_id: Option<String>,
}

impl CheckResult {
    /// Creates a check payload for a one-off payment.
    pub fn new(
        trx_id: impl Into<String>,
        short_desc: impl Into<String>,
        long_desc: impl Into<String>,
        account_id: impl Into<String>,
        amount: i64,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            trx_id: trx_id.into(),
            short_desc: short_desc.into(),
            long_desc: long_desc.into(),
            account_id: account_id.into(),
            amount,
            currency: currency.into(),
            primary_trx_id: None,
        }
    }

    /// Marks the payment as a repeat of a primary transaction.
    ///
    /// An empty ID means no primary transaction.
    pub fn with_primary_trx_id(mut self, primary_trx_id: impl Into<String>) -> Self {
        let primary_trx_id = primary_trx_id.into();
        self.primary_trx_id = if primary_trx_id.is_empty() {
            None
        } else {
            Some(primary_trx_id)
        };
        self
    }
}

/// Outcome of a refund request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RefundResult {
    /// Content of `Message/RefundResponse/Result`
    pub code: String,
}

/// Inbound callback request, as seen by the integration.
#[derive(Debug, Clone)]
pub struct CallbackRequest {
    /// HTTP method
    pub method: String,

    /// Full URL including the original, unmodified query string
    pub url: String,

    /// Decoded query parameters in their original order
    pub params: Vec<(String, String)>,

    /// Client source address
    pub client_ip: String,

    /// Basic-auth credentials, when the request carried any
    pub basic_auth: Option<(String, String)>,
}

impl CallbackRequest {
    /// Creates a request from its method, full URL and client address.
    ///
    /// # Examples
    ///
    /// ```
    /// use bog_payment::types::CallbackRequest;
    ///
    /// let request = CallbackRequest::new(
    ///     "GET",
    ///     "https://shop.example.ge/bog/check?trx_id=ABC&o.order_id=42",
    ///     "213.131.36.62",
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(request.param("trx_id"), Some("ABC"));
    /// assert_eq!(request.param("o.order_id"), Some("42"));
    /// ```
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        client_ip: impl Into<String>,
    ) -> Result<Self> {
        let url = url.into();
        let params = Url::parse(&url)?
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            method: method.into(),
            url,
            params,
            client_ip: client_ip.into(),
            basic_auth: None,
        })
    }

    /// Attaches basic-auth credentials.
    pub fn with_basic_auth(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.basic_auth = Some((user.into(), pass.into()));
        self
    }

    /// Attaches credentials from an `Authorization` header value.
    ///
    /// Anything other than a decodable `Basic` header leaves the request
    /// without credentials.
    pub fn with_authorization_header(mut self, value: &str) -> Self {
        self.basic_auth = parse_basic_auth(value);
        self
    }

    /// Looks up a query parameter.
    ///
    /// Falls back to the name with dots replaced by underscores, the form some
    /// frameworks hand parameters like `o.order_id` over in.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.lookup(name).or_else(|| {
            if name.contains('.') {
                self.lookup(&name.replace('.', "_"))
            } else {
                None
            }
        })
    }

    /// Looks up a query parameter, returning `default` when absent.
    pub fn param_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.param(name).unwrap_or(default)
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A complete HTTP response for the hosting web layer to write out.
///
/// Every terminal outcome of a callback, and the payment redirect, is returned
/// as one of these. Once a component hands one back, the handler must write it
/// and stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code
    pub status: StatusCode,

    /// Response headers
    pub headers: Vec<(String, String)>,

    /// Response body
    pub body: String,
}

impl HttpResponse {
    /// A 200 `text/xml` response.
    pub fn xml(body: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type".to_string(), XML_CONTENT_TYPE.to_string())],
            body: body.into(),
        }
    }

    /// A plain text response with the given status.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: body.into(),
        }
    }

    /// A 302 redirect.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FOUND,
            headers: vec![("location".to_string(), location.into())],
            body: String::new(),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns the first header with the given name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
