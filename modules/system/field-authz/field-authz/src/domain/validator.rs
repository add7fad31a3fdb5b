use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use field_authz_sdk::{FieldAuthzError, FieldInput, FieldValidator, FieldVerdict, Record};
use tokio::task::JoinSet;
use tracing::{debug, instrument};

/// Per-field validators plus the list of fields an item must carry.
#[derive(Clone, Default)]
pub struct ValidationRules {
    validators: HashMap<String, Arc<dyn FieldValidator>>,
    required: Vec<String>,
}

impl std::fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut fields: Vec<_> = self.validators.keys().collect();
        fields.sort();
        f.debug_struct("ValidationRules")
            .field("validated_fields", &fields)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

impl ValidationRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a validator to `field`, replacing any previous one.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>, validator: Arc<dyn FieldValidator>) -> Self {
        self.validators.insert(field.into(), validator);
        self
    }

    #[must_use]
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }
}

/// Run the required-field check, then every applicable validator concurrently.
///
/// A required field is satisfied by `item` or, for updates, by `existing`.
///
/// Validators run only for fields present in `item`. The first hard error is
/// returned as soon as it is observed and the remaining validators are
/// aborted; otherwise every business-rule failure is collected.
///
/// # Errors
///
/// - `MissingFields` listing every absent required field
/// - the first hard error raised by a validator
/// - `InvalidFields` with one message per failing field
#[instrument(skip_all, fields(fields = item.len()))]
pub async fn validate_fields(
    rules: &ValidationRules,
    item: &Record,
    existing: Option<&Record>,
) -> Result<(), FieldAuthzError> {
    let missing: Vec<String> = rules
        .required
        .iter()
        .filter(|field| {
            !item.contains_key(field.as_str())
                && !existing.is_some_and(|e| e.contains_key(field.as_str()))
        })
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(FieldAuthzError::MissingFields(missing));
    }

    let item = Arc::new(item.clone());
    let existing = existing.map(|e| Arc::new(e.clone()));

    let mut tasks = JoinSet::new();
    for (field, value) in item.iter() {
        let Some(validator) = rules.validators.get(field) else {
            continue;
        };
        let validator = Arc::clone(validator);
        let input = FieldInput {
            field: field.clone(),
            value: value.clone(),
            item: Arc::clone(&item),
            existing: existing.clone(),
        };
        tasks.spawn(async move {
            let field = input.field.clone();
            let outcome = validator.validate(input).await;
            (field, outcome)
        });
    }
    debug!(validators = tasks.len(), "field validation dispatched");

    // Returning early drops the set, which aborts validators still running.
    let mut failures = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        let (field, outcome) = joined
            .map_err(|e| FieldAuthzError::internal(format!("field validator task failed: {e}")))?;
        if let FieldVerdict::Invalid(message) = outcome? {
            failures.insert(field, message);
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(FieldAuthzError::InvalidFields(failures))
    }
}
