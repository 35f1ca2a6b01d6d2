//! Gateway configuration.
//!
//! A single immutable [`GatewayConfig`] is built once and handed to every
//! component. Field defaults match the values the bank documents for a fresh
//! merchant installation.

use crate::errors::{GatewayError, Result};
use crate::types::CheckResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Hosted payment page of the gateway.
pub const DEFAULT_GATEWAY_URL: &str = "https://3dacq.georgiancard.ge/payment/start.wsm";

/// Merchant API refund endpoint.
pub const DEFAULT_REFUND_URL: &str = "https://3dacq.georgiancard.ge/merchantapi/refund";

/// Address the bank sends callbacks from.
pub const DEFAULT_ALLOWED_IPS: &str = "213.131.36.62";

/// Configuration for the gateway integration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Log every response payload at debug level
    pub debug: bool,

    /// Hosted payment page URL
    pub url: String,

    /// Refund endpoint of the merchant API
    pub refund_url: String,

    /// Merchant ID issued by the bank
    pub merchant_id: String,

    /// Payment page ID issued by the bank
    pub page_id: String,

    /// Account ID reported back in check responses
    pub account_id: String,

    /// Shop name, used as the basic-auth realm
    pub shop_name: String,

    /// Where the gateway sends the customer after a successful payment
    pub success_url: String,

    /// Where the gateway sends the customer after a failed payment
    pub fail_url: String,

    /// Base URL used to resolve relative success/fail URLs
    pub app_url: Option<String>,

    /// ISO 4217 numeric currency code
    pub currency: String,

    /// Payment page language (e.g., "KA", "EN")
    pub language: String,

    /// Username the gateway presents on callbacks
    pub http_auth_user: String,

    /// Password the gateway presents on callbacks
    pub http_auth_pass: String,

    /// Comma separated list of addresses allowed to call back
    pub allowed_ips: String,

    /// Path to the gateway certificate
    pub cert_path: PathBuf,

    /// Password for the refund API
    pub refund_api_pass: String,

    /// Timeout applied to outbound requests, in seconds
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            debug: false,
            url: DEFAULT_GATEWAY_URL.to_string(),
            refund_url: DEFAULT_REFUND_URL.to_string(),
            merchant_id: String::new(),
            page_id: String::new(),
            account_id: String::new(),
            shop_name: String::new(),
            success_url: "/payments/success".to_string(),
            fail_url: "/payments/fail".to_string(),
            app_url: None,
            currency: "981".to_string(),
            language: "KA".to_string(),
            http_auth_user: String::new(),
            http_auth_pass: String::new(),
            allowed_ips: DEFAULT_ALLOWED_IPS.to_string(),
            cert_path: PathBuf::from("app/bog.cer"),
            refund_api_pass: String::new(),
            request_timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration for the given merchant and payment page.
    ///
    /// # Examples
    ///
    /// ```
    /// use bog_payment::config::GatewayConfig;
    ///
    /// let config = GatewayConfig::new("MERCHANT01", "PAGE01")
    ///     .with_shop_name("Coffee Shop")
    ///     .with_http_auth("bog", "secret");
    ///
    /// assert_eq!(config.currency, "981");
    /// assert_eq!(config.shop_name, "Coffee Shop");
    /// ```
    pub fn new(merchant_id: impl Into<String>, page_id: impl Into<String>) -> Self {
        Self {
            merchant_id: merchant_id.into(),
            page_id: page_id.into(),
            ..Self::default()
        }
    }

    /// Loads a configuration from a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: GatewayConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Sets the shop name.
    pub fn with_shop_name(mut self, shop_name: impl Into<String>) -> Self {
        self.shop_name = shop_name.into();
        self
    }

    /// Sets the account ID.
    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = account_id.into();
        self
    }

    /// Sets the callback basic-auth credentials.
    pub fn with_http_auth(mut self, user: impl Into<String>, pass: impl Into<String>) -> Self {
        self.http_auth_user = user.into();
        self.http_auth_pass = pass.into();
        self
    }

    /// Sets the comma separated allow-list.
    pub fn with_allowed_ips(mut self, allowed_ips: impl Into<String>) -> Self {
        self.allowed_ips = allowed_ips.into();
        self
    }

    /// Sets the success and fail return URLs.
    pub fn with_return_urls(mut self, success: impl Into<String>, fail: impl Into<String>) -> Self {
        self.success_url = success.into();
        self.fail_url = fail.into();
        self
    }

    /// Sets the application base URL.
    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = Some(app_url.into());
        self
    }

    /// Sets the hosted payment page URL.
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the refund endpoint and its API password.
    pub fn with_refund(mut self, refund_url: impl Into<String>, api_pass: impl Into<String>) -> Self {
        self.refund_url = refund_url.into();
        self.refund_api_pass = api_pass.into();
        self
    }

    /// Sets the certificate path.
    pub fn with_cert_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cert_path = path.into();
        self
    }

    /// Sets the language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Enables or disables debug logging of response payloads.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the outbound request timeout.
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Outbound request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolves a return URL against `app_url`.
    ///
    /// Absolute URLs are returned unchanged. Relative ones need `app_url`.
    pub fn absolute_url(&self, path: &str) -> Result<String> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url.to_string());
        }

        let base = self.app_url.as_deref().ok_or_else(|| {
            GatewayError::ConfigError(format!("relative URL '{}' requires app_url", path))
        })?;

        Ok(Url::parse(base)?.join(path)?.to_string())
    }

    /// Builds a check payload using the configured account and currency.
    pub fn check_result(
        &self,
        trx_id: impl Into<String>,
        short_desc: impl Into<String>,
        long_desc: impl Into<String>,
        amount: i64,
    ) -> CheckResult {
        CheckResult::new(
            trx_id,
            short_desc,
            long_desc,
            self.account_id.clone(),
            amount,
            self.currency.clone(),
        )
    }
}
