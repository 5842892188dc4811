//! Admission middleware: maps verdicts onto HTTP responses.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::auth::Identity;
use super::problem::{retry_after_secs, ApiError};
use super::state::AppState;
use crate::config::QueuedPolicy;
use crate::ratelimit::{AdmissionController, AdmissionVerdict, Decision};

/// Partition key used when a request carries neither an identity nor a host.
pub const UNKNOWN_HOST: &str = "unknown-host";

/// Enforce both the global and the per-identity limiter.
pub async fn enforce_admission(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let claim = request
        .extensions()
        .get::<Identity>()
        .and_then(|identity| identity.partition_claim())
        .map(str::to_owned);
    let key = AdmissionController::resolve_partition_key(claim.as_deref(), &request_host(&request));

    let started = Instant::now();
    let verdict = admit(state.config.rate_limiting.queued, |now| {
        state.admission.evaluate(&key, now)
    })
    .await;
    record(&verdict, started.elapsed());

    if verdict.is_admitted() {
        next.run(request).await
    } else {
        reject(verdict)
    }
}

/// Enforce only the global limiter, for routes without a per-identity policy.
pub async fn enforce_global(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let verdict = admit(state.config.rate_limiting.queued, |now| {
        state.admission.evaluate_global(now)
    })
    .await;
    record(&verdict, started.elapsed());

    if verdict.is_admitted() {
        next.run(request).await
    } else {
        reject(verdict)
    }
}

/// Evaluate once, then apply the queued policy.
///
/// Under `Wait`, a queued request sleeps until its window rolls over and is
/// evaluated again, for as long as the next rollover falls inside the wait
/// budget.
async fn admit<F>(policy: QueuedPolicy, evaluate: F) -> AdmissionVerdict
where
    F: Fn(Instant) -> AdmissionVerdict,
{
    let mut verdict = evaluate(Instant::now());

    let QueuedPolicy::Wait { max_wait_ms } = policy else {
        return verdict;
    };
    let deadline = Instant::now() + Duration::from_millis(max_wait_ms);

    while let Decision::Queued { retry_after } = verdict.decision {
        let budget = deadline.saturating_duration_since(Instant::now());
        if retry_after > budget {
            break;
        }
        debug!(
            partition = %verdict.partition,
            wait_ms = retry_after.as_millis() as u64,
            "Holding queued request until window rollover"
        );
        tokio::time::sleep(retry_after).await;
        verdict = evaluate(Instant::now());
    }

    verdict
}

fn reject(verdict: AdmissionVerdict) -> Response {
    ApiError::RateLimited {
        limiter: verdict.source,
        retry_after: verdict.retry_after().unwrap_or_default(),
    }
    .into_response()
}

fn record(verdict: &AdmissionVerdict, latency: Duration) {
    let latency_us = latency.as_micros() as u64;

    match verdict.retry_after() {
        None => debug!(
            partition = %verdict.partition,
            source = %verdict.source,
            decision = verdict.decision.as_str(),
            latency_us,
            "Request admitted"
        ),
        Some(retry_after) => info!(
            partition = %verdict.partition,
            source = %verdict.source,
            decision = verdict.decision.as_str(),
            latency_us,
            retry_after_secs = retry_after_secs(retry_after),
            "Request not admitted"
        ),
    }
}

/// Transport-level fallback key: the `Host` header, then the URI authority.
fn request_host(request: &Request) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|host| host.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
        .unwrap_or(UNKNOWN_HOST)
        .to_string()
}
