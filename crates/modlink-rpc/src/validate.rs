//! Payload validation for inbound requests and packets.
//!
//! Validation is a pluggable capability. The RPC layer only knows the
//! [`PayloadSchema`] trait; whether a schema is a serde type, a hand-written
//! closure or something else entirely is up to the registering mod.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Checks a payload. `Err` carries human-readable reasons.
pub trait PayloadSchema: Send + Sync + 'static {
    fn check(&self, payload: &Value) -> Result<(), Vec<String>>;
}

/// Accepts payloads that deserialize into `T`.
pub struct TypedSchema<T>(PhantomData<fn() -> T>);

impl<T> TypedSchema<T> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for TypedSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned + 'static> PayloadSchema for TypedSchema<T> {
    fn check(&self, payload: &Value) -> Result<(), Vec<String>> {
        serde_json::from_value::<T>(payload.clone())
            .map(|_| ())
            .map_err(|e| vec![e.to_string()])
    }
}

/// Adapts a closure into a [`PayloadSchema`].
pub struct SchemaFn<F>(pub F);

impl<F> PayloadSchema for SchemaFn<F>
where
    F: Fn(&Value) -> Result<(), Vec<String>> + Send + Sync + 'static,
{
    fn check(&self, payload: &Value) -> Result<(), Vec<String>> {
        (self.0)(payload)
    }
}

/// Whether, and how, a payload is checked before a handler sees it.
#[derive(Clone, Default)]
pub enum PayloadValidator {
    /// No schema declared. Every payload passes.
    #[default]
    AlwaysValid,
    Schema(Arc<dyn PayloadSchema>),
}

impl PayloadValidator {
    /// Wraps any schema.
    pub fn schema(schema: impl PayloadSchema) -> Self {
        Self::Schema(Arc::new(schema))
    }

    /// Payload must deserialize into `T`.
    pub fn typed<T: DeserializeOwned + 'static>() -> Self {
        Self::schema(TypedSchema::<T>::new())
    }

    /// Payload must pass `check`.
    pub fn from_fn<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), Vec<String>> + Send + Sync + 'static,
    {
        Self::schema(SchemaFn(check))
    }

    pub fn validate(&self, payload: &Value) -> Result<(), Vec<String>> {
        match self {
            Self::AlwaysValid => Ok(()),
            Self::Schema(schema) => schema.check(payload),
        }
    }
}

impl fmt::Debug for PayloadValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlwaysValid => write!(f, "AlwaysValid"),
            Self::Schema(_) => write!(f, "Schema(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Move {
        x: u8,
        y: u8,
    }

    #[test]
    fn test_always_valid_accepts_anything() {
        let v = PayloadValidator::default();
        assert!(v.validate(&json!(null)).is_ok());
        assert!(v.validate(&json!({ "any": [1, 2] })).is_ok());
    }

    #[test]
    fn test_typed_schema_accepts_matching_shape() {
        let v = PayloadValidator::typed::<Move>();
        assert!(v.validate(&json!({ "x": 1, "y": 2 })).is_ok());
    }

    #[test]
    fn test_typed_schema_rejects_wrong_shape() {
        let v = PayloadValidator::typed::<Move>();
        let errors = v.validate(&json!({ "x": "one" })).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_closure_schema() {
        let v = PayloadValidator::from_fn(|p| {
            if p.is_string() {
                Ok(())
            } else {
                Err(vec!["expected a string".into()])
            }
        });
        assert!(v.validate(&json!("hi")).is_ok());
        assert_eq!(v.validate(&json!(3)).unwrap_err(), vec!["expected a string"]);
    }
}
