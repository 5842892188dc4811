//! Shared application state.

use tracing::info;

use super::auth::JwtAuthenticator;
use crate::config::AppConfig;
use crate::error::Result;
use crate::ratelimit::AdmissionController;
use crate::validation::ValidatorRegistry;

/// Everything handlers and middleware need, built once at startup.
pub struct AppState {
    pub admission: AdmissionController,
    pub authenticator: JwtAuthenticator,
    pub validators: ValidatorRegistry,
    pub config: AppConfig,
}

impl AppState {
    /// Wire up the service from its configuration.
    pub fn new(config: AppConfig) -> Result<Self> {
        let limits = &config.rate_limiting;
        let admission =
            AdmissionController::configure(limits.global.into(), limits.per_identity.into())?
                .with_mode(limits.evaluation);

        info!(
            global_permit_limit = limits.global.permit_limit,
            global_window_secs = limits.global.window_secs,
            global_queue_limit = limits.global.queue_limit,
            identity_permit_limit = limits.per_identity.permit_limit,
            identity_window_secs = limits.per_identity.window_secs,
            identity_queue_limit = limits.per_identity.queue_limit,
            evaluation = ?limits.evaluation,
            "Admission controller configured"
        );

        Ok(Self {
            admission,
            authenticator: JwtAuthenticator::new(config.jwt.clone()),
            validators: ValidatorRegistry::with_defaults(),
            config,
        })
    }
}
