//! CORS policy.

use axum::http::HeaderValue;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;
use crate::error::{PingyError, Result};

/// Allow the configured origins with any method and any header.
pub fn layer(config: &CorsConfig) -> Result<CorsLayer> {
    let origins = config
        .allowed_origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim()).map_err(|_| {
                PingyError::Config(format!("Invalid CORS origin: {:?}", origin))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_origins_build() {
        assert!(layer(&CorsConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_origin_rejected() {
        let config = CorsConfig {
            allowed_origins: vec!["https://bad\norigin".to_string()],
        };
        assert!(layer(&config).is_err());
    }
}
