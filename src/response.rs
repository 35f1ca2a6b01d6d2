//! XML documents returned to the gateway on callbacks.
//!
//! The gateway understands exactly two document shapes, one per callback
//! mode. Outcome is signalled in-band through `<result><code>`: `1` accepts,
//! `2` rejects. The HTTP status is always 200.

use crate::types::{CheckResult, HttpResponse, ResponseMode};
use crate::utils::clean;

/// Result code accepting the payment.
pub const CODE_OK: u8 = 1;

/// Result code rejecting the payment.
pub const CODE_ERROR: u8 = 2;

/// Description used when the merchant gives none.
pub const DEFAULT_ERROR_DESC: &str = "Unable to accept this payment";

const TRX_ID_MAX: usize = 50;
const SHORT_DESC_MAX: usize = 30;
const LONG_DESC_MAX: usize = 125;
const ACCOUNT_ID_MAX: usize = 32;
const ERROR_DESC_MAX: usize = 125;

/// Builds callback responses.
#[derive(Clone, Debug, Default)]
pub struct XmlResponder {
    debug: bool,
}

impl XmlResponder {
    /// Creates a responder. With `debug` set every payload is logged.
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Accepts a payment-availability check.
    ///
    /// # Examples
    ///
    /// ```
    /// use bog_payment::response::XmlResponder;
    /// use bog_payment::types::CheckResult;
    ///
    /// let result = CheckResult::new("TRX1", "Coffee", "Two bags", "ACC1", 2500, "981");
    /// let response = XmlResponder::default().check_success(&result);
    ///
    /// assert!(response.body.starts_with("<payment-avail-response>"));
    /// assert!(response.body.contains("<amount>2500</amount>"));
    /// assert!(!response.body.contains("primaryTrxPcid"));
    /// ```
    pub fn check_success(&self, result: &CheckResult) -> HttpResponse {
        let mut xml = String::new();
        xml.push_str("<payment-avail-response>\n");
        xml.push_str(&result_element(CODE_OK, "OK"));
        xml.push_str(&format!(
            "    <merchant-trx>{}</merchant-trx>\n",
            clean(&result.trx_id, Some(TRX_ID_MAX))
        ));

        if let Some(primary) = result.primary_trx_id.as_deref().filter(|id| !id.is_empty()) {
            xml.push_str(&format!(
                "    <primaryTrxPcid>{}</primaryTrxPcid>\n",
                clean(primary, None)
            ));
        }

        xml.push_str("    <purchase>\n");
        xml.push_str(&format!(
            "        <shortDesc>{}</shortDesc>\n",
            clean(&result.short_desc, Some(SHORT_DESC_MAX))
        ));
        xml.push_str(&format!(
            "        <longDesc>{}</longDesc>\n",
            clean(&result.long_desc, Some(LONG_DESC_MAX))
        ));
        xml.push_str("        <account-amount>\n");
        xml.push_str(&format!(
            "            <id>{}</id>\n",
            clean(&result.account_id, Some(ACCOUNT_ID_MAX))
        ));
        xml.push_str(&format!("            <amount>{}</amount>\n", result.amount));
        xml.push_str(&format!(
            "            <currency>{}</currency>\n",
            clean(&result.currency, None)
        ));
        xml.push_str("            <exponent>2</exponent>\n");
        xml.push_str("        </account-amount>\n");
        xml.push_str("    </purchase>\n");
        xml.push_str("</payment-avail-response>");

        HttpResponse::xml(xml)
    }

    /// Rejects a payment-availability check.
    pub fn check_error(&self, desc: &str) -> HttpResponse {
        HttpResponse::xml(error_document(ResponseMode::Check, desc))
    }

    /// Accepts a payment registration.
    pub fn register_success(&self) -> HttpResponse {
        HttpResponse::xml(format!(
            "<register-payment-response>\n{}</register-payment-response>",
            result_element(CODE_OK, "OK")
        ))
    }

    /// Rejects a payment registration.
    pub fn register_error(&self, desc: &str) -> HttpResponse {
        HttpResponse::xml(error_document(ResponseMode::Register, desc))
    }

    /// Sends the error document for `mode`.
    pub fn send_error(&self, mode: ResponseMode, message: &str) -> HttpResponse {
        if self.debug {
            tracing::debug!(mode = %mode, message, "BOG Payment -> sendError");
        }

        match mode {
            ResponseMode::Check => self.check_error(message),
            ResponseMode::Register => self.register_error(message),
        }
    }

    /// Sends the success document for `mode`.
    ///
    /// Check mode needs a payload; without one the check is rejected with the
    /// default description. Register mode ignores the payload.
    pub fn send_success(&self, mode: ResponseMode, result: Option<&CheckResult>) -> HttpResponse {
        if self.debug {
            tracing::debug!(mode = %mode, data = ?result, "BOG Payment -> sendSuccess");
        }

        match (mode, result) {
            (ResponseMode::Check, Some(result)) => self.check_success(result),
            (ResponseMode::Check, None) => self.check_error(DEFAULT_ERROR_DESC),
            (ResponseMode::Register, _) => self.register_success(),
        }
    }
}

fn result_element(code: u8, desc: &str) -> String {
    format!(
        "    <result>\n        <code>{}</code>\n        <desc>{}</desc>\n    </result>\n",
        code, desc
    )
}

fn error_document(mode: ResponseMode, desc: &str) -> String {
    let root = mode.root_tag();
    format!(
        "<{root}>\n{}</{root}>",
        result_element(CODE_ERROR, &clean(desc, Some(ERROR_DESC_MAX))),
        root = root
    )
}
