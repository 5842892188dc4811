//! Request and response bodies.

use serde::{Deserialize, Serialize};

use crate::validation::InputShape;

/// Body of `POST /api/webhooks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub event_type: Option<String>,

    /// Opaque event body
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl InputShape for WebhookPayload {
    const SHAPE: &'static str = "webhook_payload";
}

/// Body returned by the development token endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}
