//! Access checks for inbound callbacks.
//!
//! The gateway authenticates with HTTP basic auth and always calls from a
//! known set of addresses. Both checks run before any XML is produced.

use crate::config::GatewayConfig;
use crate::errors::{GatewayError, Result};
use crate::types::{CallbackRequest, HttpResponse};
use crate::utils::secure_eq;
use reqwest::StatusCode;
use std::sync::Arc;

/// Checks callback credentials and source address.
#[derive(Clone, Debug)]
pub struct AccessGuard {
    config: Arc<GatewayConfig>,
}

impl AccessGuard {
    /// Creates a guard over the given configuration.
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        Self { config }
    }

    /// Verifies the request's basic-auth credentials.
    ///
    /// Missing credentials yield an `Unauthorized` carrying a challenge for the
    /// shop's realm; wrong credentials yield one without.
    pub fn check_auth(&self, request: &CallbackRequest) -> Result<()> {
        let realm = self.config.shop_name.clone();

        let (user, pass) = match &request.basic_auth {
            Some(credentials) => credentials,
            None => {
                tracing::warn!(ip = %request.client_ip, "Callback without credentials");
                return Err(GatewayError::Unauthorized {
                    realm,
                    challenge: true,
                });
            }
        };

        // evaluate both so timing does not reveal which one failed
        let user_ok = secure_eq(user, &self.config.http_auth_user);
        let pass_ok = secure_eq(pass, &self.config.http_auth_pass);

        if user_ok && pass_ok {
            Ok(())
        } else {
            tracing::warn!(ip = %request.client_ip, "Callback with wrong credentials");
            Err(GatewayError::Unauthorized {
                realm,
                challenge: false,
            })
        }
    }

    /// Verifies the client address is in the allow-list.
    ///
    /// The list is split on `,` verbatim. An empty list therefore holds a single
    /// empty entry and denies every client.
    pub fn check_ip_allowed(&self, request: &CallbackRequest) -> Result<()> {
        let allowed = self
            .config
            .allowed_ips
            .split(',')
            .any(|ip| ip == request.client_ip);

        if allowed {
            Ok(())
        } else {
            tracing::warn!(ip = %request.client_ip, "Callback from address outside allow-list");
            Err(GatewayError::Forbidden(request.client_ip.clone()))
        }
    }

    /// Runs the credential check, then the address check.
    pub fn check(&self, request: &CallbackRequest) -> Result<()> {
        self.check_auth(request)?;
        self.check_ip_allowed(request)
    }
}

/// Renders an access-guard rejection as a plain text response.
///
/// Returns `None` for errors the guard never raises.
pub fn denial_response(error: &GatewayError) -> Option<HttpResponse> {
    match error {
        GatewayError::Unauthorized { realm, challenge } => {
            let response = HttpResponse::text(StatusCode::UNAUTHORIZED, "Access denied");
            Some(if *challenge {
                response.with_header("www-authenticate", format!("Basic realm=\"{}\"", realm))
            } else {
                response
            })
        }
        GatewayError::Forbidden(ip) => Some(HttpResponse::text(
            StatusCode::FORBIDDEN,
            format!("Access denied for IP: {}", ip),
        )),
        _ => None,
    }
}
