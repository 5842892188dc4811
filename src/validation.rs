//! Request validation.
//!
//! Each input shape declares a static identifier, and validators are
//! registered against that identifier up front. Lookups never inspect types
//! at runtime beyond recovering the validator that was registered for the
//! shape.

use std::any::Any;
use std::collections::HashMap;
use tracing::debug;

use crate::models::WebhookPayload;

/// A single failed rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Name of the offending field as it appears on the wire
    pub field: String,
    /// Human readable explanation
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Input is valid
    Valid,
    /// Input broke one or more rules
    Invalid(Vec<FieldError>),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn errors(&self) -> &[FieldError] {
        match self {
            ValidationResult::Valid => &[],
            ValidationResult::Invalid(errors) => errors,
        }
    }
}

/// An input type that validators can be registered for.
pub trait InputShape: 'static {
    /// Registry identifier of this shape.
    const SHAPE: &'static str;
}

/// Rules for one input shape.
pub trait Validator<T>: Send + Sync {
    /// Return every broken rule; an empty list means the input is valid.
    fn validate(&self, input: &T) -> Vec<FieldError>;
}

/// Validators keyed by input shape.
#[derive(Default)]
pub struct ValidatorRegistry {
    validators: HashMap<&'static str, Box<dyn Any + Send + Sync>>,
}

impl ValidatorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every validator the service ships with.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<WebhookPayload, _>(WebhookPayloadValidator);
        registry
    }

    /// Register `validator` for shape `T`, replacing any previous one.
    pub fn register<T, V>(&mut self, validator: V) -> &mut Self
    where
        T: InputShape,
        V: Validator<T> + 'static,
    {
        let validator: Box<dyn Validator<T>> = Box::new(validator);
        self.validators.insert(T::SHAPE, Box::new(validator));
        self
    }

    pub fn is_registered(&self, shape: &str) -> bool {
        self.validators.contains_key(shape)
    }

    /// Validate `input` with the validator registered for its shape.
    ///
    /// Shapes without a registered validator are always valid.
    pub fn validate<T: InputShape>(&self, input: &T) -> ValidationResult {
        let validator = self
            .validators
            .get(T::SHAPE)
            .and_then(|v| v.downcast_ref::<Box<dyn Validator<T>>>());

        let Some(validator) = validator else {
            return ValidationResult::Valid;
        };

        let errors = validator.validate(input);
        if errors.is_empty() {
            ValidationResult::Valid
        } else {
            debug!(shape = T::SHAPE, errors = errors.len(), "Validation failed");
            ValidationResult::Invalid(errors)
        }
    }
}

/// Rules for incoming webhook payloads.
pub struct WebhookPayloadValidator;

impl Validator<WebhookPayload> for WebhookPayloadValidator {
    fn validate(&self, input: &WebhookPayload) -> Vec<FieldError> {
        let mut errors = Vec::new();

        let event_type_blank = input
            .event_type
            .as_deref()
            .map_or(true, |event_type| event_type.trim().is_empty());
        if event_type_blank {
            errors.push(FieldError::new("event_type", "Event type cannot be empty."));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(event_type: Option<&str>) -> WebhookPayload {
        WebhookPayload {
            event_type: event_type.map(str::to_string),
            data: None,
        }
    }

    struct Unchecked;

    impl InputShape for Unchecked {
        const SHAPE: &'static str = "unchecked";
    }

    #[test]
    fn test_webhook_payload_with_event_type_is_valid() {
        let registry = ValidatorRegistry::with_defaults();
        assert!(registry.validate(&payload(Some("order.created"))).is_valid());
    }

    #[test]
    fn test_webhook_payload_requires_event_type() {
        let registry = ValidatorRegistry::with_defaults();

        for event_type in [None, Some(""), Some("   ")] {
            let result = registry.validate(&payload(event_type));
            assert_eq!(
                result.errors(),
                &[FieldError::new("event_type", "Event type cannot be empty.")]
            );
        }
    }

    #[test]
    fn test_unregistered_shape_is_valid() {
        let registry = ValidatorRegistry::new();
        assert!(!registry.is_registered(Unchecked::SHAPE));
        assert!(registry.validate(&Unchecked).is_valid());
    }

    #[test]
    fn test_register_replaces_validator() {
        struct RejectAll;

        impl Validator<WebhookPayload> for RejectAll {
            fn validate(&self, _input: &WebhookPayload) -> Vec<FieldError> {
                vec![FieldError::new("data", "Rejected.")]
            }
        }

        let mut registry = ValidatorRegistry::with_defaults();
        registry.register::<WebhookPayload, _>(RejectAll);

        let result = registry.validate(&payload(Some("order.created")));
        assert_eq!(result.errors(), &[FieldError::new("data", "Rejected.")]);
    }
}
