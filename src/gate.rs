//! The admission gate every protected operation goes through.
//!
//! [`Gatekeeper::guard`] is the only way a handler reaches the upstream: it
//! checks the caller's counter for the operation, runs the protected body
//! when admitted, and maps every failure to a [`GateError`].

use axum::http::{header::RETRY_AFTER, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use parking_lot::RwLock;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::identity::Identity;
use crate::ratelimit::{Decision, Operation, RateLimitRules, RateLimiter};

/// Why a guarded call did not produce a payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GateError {
    #[error("rate limited")]
    RateLimited { retry_after: Duration },

    #[error("external api error")]
    Upstream,

    #[error("rate limiter unavailable")]
    LimiterUnavailable,
}

impl GateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GateError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GateError::Upstream => StatusCode::BAD_GATEWAY,
            GateError::LimiterUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Stable error code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            GateError::RateLimited { .. } => "rate_limited",
            GateError::Upstream => "external_api_error",
            GateError::LimiterUnavailable => "rate_limiter_unavailable",
        }
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.code() }));
        let mut response = (self.status(), body).into_response();

        if let GateError::RateLimited { retry_after } = self {
            // Round up so clients never retry inside the window.
            let secs = retry_after.as_millis().div_ceil(1000) as u64;
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
        }
        response
    }
}

/// Admission gate shared by all protected operations.
pub struct Gatekeeper {
    limiter: Arc<RateLimiter>,
    rules: RwLock<RateLimitRules>,
}

impl Gatekeeper {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self::with_rules(limiter, RateLimitRules::new())
    }

    pub fn with_rules(limiter: Arc<RateLimiter>, rules: RateLimitRules) -> Self {
        Self {
            limiter,
            rules: RwLock::new(rules),
        }
    }

    /// Replace the rule overrides.
    pub fn set_rules(&self, rules: RateLimitRules) {
        let mut current = self.rules.write();
        *current = rules;
    }

    /// Get the current rule overrides.
    pub fn rules(&self) -> RateLimitRules {
        self.rules.read().clone()
    }

    /// Effective limits for `op` after overrides.
    pub fn resolve(&self, op: &Operation) -> Operation {
        self.rules.read().resolve(op)
    }

    /// Run `body` for `identity` if `op`'s limit allows it.
    ///
    /// The body never runs when the call is rejected. Errors and panics from
    /// the body are logged here and surface only as [`GateError::Upstream`].
    #[instrument(
        skip_all,
        fields(
            operation = op.key,
            identity = %identity,
            request_id = %uuid::Uuid::new_v4()
        )
    )]
    pub async fn guard<T, E, F, Fut>(
        &self,
        op: &Operation,
        identity: &Identity,
        body: F,
    ) -> Result<T, GateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let op = self.resolve(op);

        match self
            .limiter
            .check(op.key, op.limit, op.window_secs, identity.as_key())
            .await
        {
            Decision::Limited { retry_after } => {
                debug!("Rejecting rate limited call");
                return Err(GateError::RateLimited { retry_after });
            }
            Decision::Unavailable => return Err(GateError::LimiterUnavailable),
            Decision::Admitted { .. } | Decision::Unchecked => {}
        }

        match AssertUnwindSafe(async move { body().await })
            .catch_unwind()
            .await
        {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(err)) => {
                error!(error = %err, "Protected operation failed");
                Err(GateError::Upstream)
            }
            Err(_) => {
                error!("Protected operation panicked");
                Err(GateError::Upstream)
            }
        }
    }

    /// Re-read rule overrides from `path`, swapping them in if they changed.
    ///
    /// Returns whether the active rules were replaced. On error the current
    /// rules stay in place.
    pub async fn reload_rules(&self, path: &Path) -> crate::error::Result<bool> {
        let rules = RateLimitRules::read(path).await?;
        if *self.rules.read() == rules {
            debug!(path = %path.display(), "Rate limit rules unchanged");
            return Ok(false);
        }

        info!(overrides = ?rules.summary(), "Reloaded rate limit rules");
        self.set_rules(rules);
        Ok(true)
    }

    /// Spawn a task that reloads rule overrides from `path` every `every`.
    pub fn spawn_rules_reloader(self: Arc<Self>, path: PathBuf, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(err) = self.reload_rules(&path).await {
                    warn!(path = %path.display(), error = %err, "Keeping previous rate limit rules");
                }
            }
        })
    }
}
