//! Per-field business rule contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FieldAuthzError;
use crate::models::Record;

/// Everything a validator sees for one field.
#[derive(Debug, Clone)]
pub struct FieldInput {
    pub field: String,
    pub value: serde_json::Value,
    /// The candidate item being created or written.
    pub item: Arc<Record>,
    /// The stored item, for updates.
    pub existing: Option<Arc<Record>>,
}

/// Business-rule outcome. Hard errors are returned as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldVerdict {
    Valid,
    Invalid(String),
}

impl FieldVerdict {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// Validates one field of a candidate item.
#[async_trait]
pub trait FieldValidator: Send + Sync {
    /// # Errors
    ///
    /// A returned error is a hard failure and aborts the whole validation.
    async fn validate(&self, input: FieldInput) -> Result<FieldVerdict, FieldAuthzError>;
}

struct FnValidator<F>(F);

#[async_trait]
impl<F, Fut> FieldValidator for FnValidator<F>
where
    F: Fn(FieldInput) -> Fut + Send + Sync,
    Fut: Future<Output = Result<FieldVerdict, FieldAuthzError>> + Send,
{
    async fn validate(&self, input: FieldInput) -> Result<FieldVerdict, FieldAuthzError> {
        (self.0)(input).await
    }
}

/// Wrap an async closure as a [`FieldValidator`].
pub fn validator_fn<F, Fut>(f: F) -> Arc<dyn FieldValidator>
where
    F: Fn(FieldInput) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<FieldVerdict, FieldAuthzError>> + Send + 'static,
{
    Arc::new(FnValidator(f))
}
