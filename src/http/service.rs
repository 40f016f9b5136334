//! Rate limit decision endpoint.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::identity::extract_identifier;
use crate::ratelimit::{Decision, PolicyName, RateLimiterRegistry};

/// Response body type for every endpoint.
pub type RespBody = Full<Bytes>;

/// Prefix of the decision route; the policy name follows it.
pub const DECISION_PREFIX: &str = "/v1/ratelimit/";

const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Route a request against the registry.
///
/// Only the request head is inspected, so the body type is irrelevant.
#[instrument(
    skip(registry, req),
    fields(method = %req.method(), path = %req.uri().path())
)]
pub fn handle_request<B>(registry: &RateLimiterRegistry, req: &Request<B>) -> Response<RespBody> {
    let path = req.uri().path();

    if path == "/health" {
        return json_response(StatusCode::OK, json!({"status": "healthy"}));
    }

    let Some(policy) = path.strip_prefix(DECISION_PREFIX) else {
        return json_response(StatusCode::NOT_FOUND, json!({"error": "not_found"}));
    };

    if req.method() != Method::GET && req.method() != Method::POST {
        return json_response(
            StatusCode::METHOD_NOT_ALLOWED,
            json!({"error": "method_not_allowed"}),
        );
    }

    let policy: PolicyName = match policy.parse() {
        Ok(policy) => policy,
        Err(_) => {
            warn!(policy = %policy, "Received decision request for unknown policy");
            return json_response(
                StatusCode::NOT_FOUND,
                json!({"error": "unknown_policy", "policy": policy}),
            );
        }
    };

    let identifier = extract_identifier(req.headers());
    let decision = registry.get(policy).check(&identifier);

    if decision.allowed {
        debug!(
            policy = %policy,
            identifier = %identifier,
            remaining = decision.remaining,
            "Request admitted"
        );
    } else {
        info!(
            policy = %policy,
            identifier = %identifier,
            retry_after_ms = ?decision.retry_after_ms,
            "Request rate limited"
        );
    }

    decision_response(policy, &identifier, &decision)
}

/// Map a decision to a 200 or 429 response carrying quota headers.
pub fn decision_response(
    policy: PolicyName,
    identifier: &str,
    decision: &Decision,
) -> Response<RespBody> {
    let mut response = if decision.allowed {
        json_response(
            StatusCode::OK,
            json!({
                "allowed": true,
                "policy": policy,
                "identifier": identifier,
                "limit": decision.limit,
                "remaining": decision.remaining,
            }),
        )
    } else {
        let retry_after_ms = decision.retry_after_ms.unwrap_or(0).max(0);
        let mut response = json_response(
            StatusCode::TOO_MANY_REQUESTS,
            json!({
                "allowed": false,
                "error": "rate_limited",
                "policy": policy,
                "identifier": identifier,
                "limit": decision.limit,
                "remaining": decision.remaining,
                "retry_after_ms": retry_after_ms,
            }),
        );
        let retry_after_secs = (retry_after_ms as u64).div_ceil(1000);
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        response
    };

    let headers = response.headers_mut();
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    response
}

fn json_response(status: StatusCode, body: Value) -> Response<RespBody> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
