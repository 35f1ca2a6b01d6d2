//! Client-side functionality for the gateway.
//!
//! This module builds the redirect to the hosted payment page and performs the
//! two merchant API calls: repeating a recurring charge and refunding one.

use crate::config::GatewayConfig;
use crate::errors::{GatewayError, Result};
use crate::refund::parse_refund_response;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{HttpResponse, RefundResult};
use crate::utils::{build_query, merge_params, raw_url_encode};
use std::sync::Arc;
use url::Url;

/// Client for the hosted payment page and the merchant API.
#[derive(Clone)]
pub struct GatewayClient {
    config: Arc<GatewayConfig>,
    transport: Arc<dyn Transport>,
}

impl GatewayClient {
    /// Creates a client that talks to the gateway over HTTP.
    ///
    /// # Examples
    ///
    /// ```
    /// use bog_payment::client::GatewayClient;
    /// use bog_payment::config::GatewayConfig;
    /// use std::sync::Arc;
    ///
    /// let config = GatewayConfig::new("MERCHANT01", "PAGE01")
    ///     .with_app_url("https://shop.example.ge");
    /// let client = GatewayClient::new(Arc::new(config)).unwrap();
    ///
    /// let url = client.build_redirect_url(&[("o.order_id", "42")], false).unwrap();
    /// assert!(url.starts_with("https://3dacq.georgiancard.ge/payment/start.wsm?lang=KA"));
    /// ```
    pub fn new(config: Arc<GatewayConfig>) -> Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client with a custom transport.
    pub fn with_transport(config: Arc<GatewayConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Parameters every payment page request starts from.
    fn base_params(&self) -> Result<Vec<(String, String)>> {
        let config = &self.config;
        let success_url = config.absolute_url(&config.success_url)?;
        let fail_url = config.absolute_url(&config.fail_url)?;

        Ok(vec![
            ("lang".to_string(), raw_url_encode(&config.language)),
            ("page_id".to_string(), raw_url_encode(&config.page_id)),
            ("merch_id".to_string(), raw_url_encode(&config.merchant_id)),
            ("back_url_s".to_string(), raw_url_encode(&success_url)),
            ("back_url_f".to_string(), raw_url_encode(&fail_url)),
        ])
    }

    fn gateway_url(&self, params: &[(String, String)]) -> String {
        format!("{}?{}", self.config.url, build_query(params))
    }

    /// Builds the URL of the hosted payment page.
    ///
    /// Caller parameters override the defaults on key collision. Defaults are
    /// raw-encoded first and the query is form-encoded on top, so after one
    /// round of query decoding they are still percent-encoded.
    pub fn build_redirect_url(&self, params: &[(&str, &str)], pre_auth: bool) -> Result<String> {
        let mut defaults = self.base_params()?;
        defaults.push((
            "preauth".to_string(),
            if pre_auth { "Y" } else { "N" }.to_string(),
        ));

        let merged = merge_params(defaults, params);
        Ok(self.gateway_url(&merged))
    }

    /// Returns a 302 redirect to the hosted payment page.
    pub fn redirect(&self, params: &[(&str, &str)], pre_auth: bool) -> Result<HttpResponse> {
        let url = self.build_redirect_url(params, pre_auth)?;
        tracing::debug!(url = %url, "Redirecting to payment page");
        Ok(HttpResponse::redirect(url))
    }

    /// Charges a saved card again, referencing the primary transaction.
    ///
    /// Returns the raw gateway reply.
    pub async fn repeat(&self, trx_id: &str, params: &[(&str, &str)]) -> Result<String> {
        let mut defaults = self.base_params()?;
        defaults.push(("o.trx_id".to_string(), trx_id.to_string()));

        let merged = merge_params(defaults, params);
        let url = Url::parse(&self.gateway_url(&merged))?;

        tracing::debug!(trx_id, "Repeating payment");
        self.transport.get(&url).await
    }

    /// Refunds `amount` minor units of a transaction.
    ///
    /// Authenticates with the merchant ID and refund API password.
    pub async fn refund(&self, trx_id: &str, rrn: &str, amount: i64) -> Result<RefundResult> {
        let url = self.refund_url(trx_id, rrn, amount)?;

        tracing::debug!(trx_id, rrn, amount, "Refunding payment");
        let body = self.transport.get(&url).await?;

        let result = parse_refund_response(&body)?;
        tracing::debug!(trx_id, code = %result.code, "Refund processed");
        Ok(result)
    }

    fn refund_url(&self, trx_id: &str, rrn: &str, amount: i64) -> Result<Url> {
        let config = &self.config;
        let mut url = Url::parse(&config.refund_url)?;

        url.set_username(&config.merchant_id)
            .and_then(|_| url.set_password(Some(&config.refund_api_pass)))
            .map_err(|_| {
                GatewayError::ConfigError(format!("refund URL cannot carry credentials: {}", config.refund_url))
            })?;

        let amount = amount.to_string();
        url.set_query(Some(&build_query(&[
            ("trx_id", trx_id),
            ("p.rrn", rrn),
            ("amount", amount.as_str()),
        ])));

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records requested URLs and replies with a canned body.
    struct MockTransport {
        body: String,
        requests: Mutex<Vec<Url>>,
    }

    impl MockTransport {
        fn new(body: &str) -> Arc<Self> {
            Arc::new(Self {
                body: body.to_string(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> Url {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(&self, url: &Url) -> Result<String> {
            self.requests.lock().unwrap().push(url.clone());
            Ok(self.body.clone())
        }
    }

    fn config() -> Arc<GatewayConfig> {
        Arc::new(
            GatewayConfig::new("MERCHANT01", "PAGE/01")
                .with_app_url("https://shop.example.ge")
                .with_refund("https://3dacq.georgiancard.ge/merchantapi/refund", "r3fund:pass"),
        )
    }

    fn query(url: &str) -> Vec<(String, String)> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn client(transport: Arc<MockTransport>) -> GatewayClient {
        GatewayClient::with_transport(config(), transport)
    }

    #[test]
    fn test_redirect_url_parameters() {
        let client = client(MockTransport::new(""));
        let url = client.build_redirect_url(&[], true).unwrap();
        let params = query(&url);

        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["lang", "page_id", "merch_id", "back_url_s", "back_url_f", "preauth"]);
        assert_eq!(params[5].1, "Y");
        assert_eq!(params[1].1, "PAGE%2F01");
        assert_eq!(params[3].1, "https%3A%2F%2Fshop.example.ge%2Fpayments%2Fsuccess");
    }

    #[test]
    fn test_redirect_url_round_trips_config_values() {
        let client = client(MockTransport::new(""));
        let url = client.build_redirect_url(&[], false).unwrap();

        for (key, value) in query(&url) {
            let decoded = String::from_utf8(crate::utils::raw_url_decode(&value)).unwrap();
            match key.as_str() {
                "lang" => assert_eq!(decoded, "KA"),
                "page_id" => assert_eq!(decoded, "PAGE/01"),
                "merch_id" => assert_eq!(decoded, "MERCHANT01"),
                "back_url_s" => assert_eq!(decoded, "https://shop.example.ge/payments/success"),
                "back_url_f" => assert_eq!(decoded, "https://shop.example.ge/payments/fail"),
                "preauth" => assert_eq!(decoded, "N"),
                other => panic!("unexpected parameter {}", other),
            }
        }
    }

    #[test]
    fn test_caller_params_take_precedence() {
        let client = client(MockTransport::new(""));
        let url = client
            .build_redirect_url(&[("lang", "EN"), ("o.order_id", "42"), ("preauth", "Y")], false)
            .unwrap();
        let params = query(&url);

        assert_eq!(params[0], ("lang".to_string(), "EN".to_string()));
        assert_eq!(params[5], ("preauth".to_string(), "Y".to_string()));
        assert_eq!(params[6], ("o.order_id".to_string(), "42".to_string()));
    }

    #[test]
    fn test_redirect_response() {
        let client = client(MockTransport::new(""));
        let response = client.redirect(&[("o.order_id", "42")], false).unwrap();
        assert_eq!(response.status, reqwest::StatusCode::FOUND);
        assert!(response
            .header("location")
            .unwrap()
            .starts_with("https://3dacq.georgiancard.ge/payment/start.wsm?lang=KA&page_id="));
    }

    #[test]
    fn test_relative_return_url_needs_app_url() {
        let client = GatewayClient::with_transport(
            Arc::new(GatewayConfig::new("M1", "P1")),
            MockTransport::new(""),
        );
        assert!(matches!(
            client.build_redirect_url(&[], false),
            Err(GatewayError::ConfigError(_))
        ));
    }

    #[tokio::test]
    async fn test_repeat_sends_trx_id_and_returns_body() {
        let transport = MockTransport::new("<payment-avail-response/>");
        let client = client(transport.clone());

        let body = client.repeat("PRIMARY-1", &[("o.amount", "500")]).await.unwrap();
        assert_eq!(body, "<payment-avail-response/>");

        let url = transport.last();
        assert_eq!(url.host_str(), Some("3dacq.georgiancard.ge"));
        assert_eq!(url.path(), "/payment/start.wsm");
        let params = query(url.as_str());
        assert_eq!(params[5], ("o.trx_id".to_string(), "PRIMARY-1".to_string()));
        assert_eq!(params[6], ("o.amount".to_string(), "500".to_string()));
        assert!(!params.iter().any(|(k, _)| k == "preauth"));
    }

    #[tokio::test]
    async fn test_refund_request_and_result() {
        let transport = MockTransport::new(
            "<AS><Message><RefundResponse><Result>1</Result></RefundResponse></Message></AS>",
        );
        let client = client(transport.clone());

        let result = client.refund("8F1D2C", "123456789012", 2500).await.unwrap();
        assert_eq!(result.code, "1");

        let url = transport.last();
        assert_eq!(url.username(), "MERCHANT01");
        assert_eq!(url.password(), Some("r3fund%3Apass"));
        assert_eq!(url.path(), "/merchantapi/refund");
        assert_eq!(
            query(url.as_str()),
            vec![
                ("trx_id".to_string(), "8F1D2C".to_string()),
                ("p.rrn".to_string(), "123456789012".to_string()),
                ("amount".to_string(), "2500".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_refund_with_malformed_reply() {
        let client = client(MockTransport::new("<html><body>Bad Gateway</html>"));
        let err = client.refund("8F1D2C", "1", 100).await.unwrap_err();
        match err {
            GatewayError::MalformedResponse(diagnostics) => assert!(!diagnostics.is_empty()),
            other => panic!("expected MalformedResponse, got {:?}", other),
        }
    }
}
