use std::sync::Arc;

use field_authz_sdk::operators::{and_into, literal};
use field_authz_sdk::{
    AccessRequest, AuditAction, AuditEntry, AuditSink, AuthorityClient, Condition,
    FieldAuthzError, FilterAction, HistoryRevision, Identity, QueryFilters, Record,
    RecordStore, ResourceKey,
};
use serde_json::Value;
use tracing::{debug, error, instrument};

use super::fields::{authorize_update_fields, reject_excluded_fields, strip_excluded};
use super::filtering::Filtering;
use super::gate::RequestGate;
use super::history::replay;
use super::local::LocalFiltering;
use super::validator::{ValidationRules, validate_fields};
use crate::config::FieldAuthzConfig;

/// Field `AuthZ` facade over an authority table, a record store and an
/// optional audit sink.
///
/// Every operation resolves and authorizes the caller, compiles its row
/// filters for the matching action, lets the store execute the tree, strips
/// excluded fields from what comes back and records an audit entry.
pub struct FieldAuthzService {
    gate: RequestGate,
    store: Arc<dyn RecordStore>,
    audit: Option<Arc<dyn AuditSink>>,
    config: FieldAuthzConfig,
}

impl std::fmt::Debug for FieldAuthzService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldAuthzService")
            .field("gate", &self.gate)
            .field("audit", &self.audit.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FieldAuthzService {
    #[must_use]
    pub fn new(
        authority: Arc<dyn AuthorityClient>,
        store: Arc<dyn RecordStore>,
        audit: Option<Arc<dyn AuditSink>>,
        config: FieldAuthzConfig,
    ) -> Self {
        Self {
            gate: RequestGate::new(authority).with_access_log(config.access_log),
            store,
            audit,
            config,
        }
    }

    #[must_use]
    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    #[must_use]
    pub fn config(&self) -> &FieldAuthzConfig {
        &self.config
    }

    /// Records visible to the caller, narrowed by the request's query filters.
    ///
    /// # Errors
    ///
    /// Gate failures, `BadRequest` for malformed filters, store failures.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn list(&self, request: &AccessRequest) -> Result<Vec<Record>, FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        let records = self.read(&identity, &request.query).await?;

        self.record(AuditEntry::for_request(AuditAction::List, &identity, request))
            .await;
        Ok(records)
    }

    /// Records visible to the caller matching explicit search filters.
    ///
    /// # Errors
    ///
    /// Gate failures, `BadRequest` for malformed filters, store failures.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn search(
        &self,
        request: &AccessRequest,
        filters: &QueryFilters,
    ) -> Result<Vec<Record>, FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        let records = self.read(&identity, filters).await?;

        let mut entry = AuditEntry::for_request(AuditAction::Search, &identity, request);
        entry.query = Some(filters.clone());
        self.record(entry).await;
        Ok(records)
    }

    /// One record by key, if the caller may read it.
    ///
    /// # Errors
    ///
    /// `NotFound` when the record is absent or filtered out; gate and store
    /// failures.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path, key = %key.key))]
    pub async fn get(
        &self,
        request: &AccessRequest,
        key: &ResourceKey,
    ) -> Result<Record, FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        let condition = self.scoped(&identity, FilterAction::Read, &request.query, key)?;

        let mut record = self
            .store
            .find(Some(&condition))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_visible(key))?;
        strip_excluded(&identity, &mut record);

        self.record(
            AuditEntry::for_request(AuditAction::Get, &identity, request)
                .with_resource(key.clone()),
        )
        .await;
        Ok(record)
    }

    /// Records whose `field` is one of `values`, within the caller's read filters.
    ///
    /// Lists longer than `in_batch_size` are split into batched membership leaves.
    ///
    /// # Errors
    ///
    /// `BadRequest` if the store does not support `in`; gate and store failures.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path, values = values.len()))]
    pub async fn multi_get(
        &self,
        request: &AccessRequest,
        field: &str,
        values: &[Value],
    ) -> Result<Vec<Record>, FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        let filtering = Filtering::new(self.store.operators());

        let condition = if values.len() > self.config.in_batch_size {
            let conditions =
                filtering.user_filters(identity.permissions.filters_for(FilterAction::Read))?;
            match filtering.batched_in(field, values, self.config.in_batch_size, false)? {
                Some(members) => Some(and_into(conditions, members)),
                None => conditions,
            }
        } else {
            filtering.multi_filter(&identity, field, values)?
        };

        let records = self.fetch(&identity, condition.as_ref()).await?;
        self.record(AuditEntry::for_request(AuditAction::Search, &identity, request))
            .await;
        Ok(records)
    }

    /// Authorize a candidate item for creation and return the caller.
    ///
    /// Runs the gate, rejects excluded fields, validates the item and checks it
    /// against the caller's create filters.
    ///
    /// # Errors
    ///
    /// - `Unauthorized` listing excluded fields or fields failing create filters
    /// - `MissingFields`/`InvalidFields` or a validator's hard error
    /// - gate failures
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    pub async fn prepare_create(
        &self,
        request: &AccessRequest,
        item: &Record,
        rules: &ValidationRules,
    ) -> Result<Identity, FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        reject_excluded_fields(&identity, item)?;
        validate_fields(rules, item, None).await?;

        let mut local = LocalFiltering::new(item);
        local.user_filters(identity.permissions.filters_for(FilterAction::Create))?;
        let failed = local.into_failed_fields();
        if !failed.is_empty() {
            debug!(fields = ?failed, "create filters rejected item");
            return Err(FieldAuthzError::unauthorized(format!(
                "not permitted to create with these values for fields: {}",
                failed.join(", ")
            )));
        }

        Ok(identity)
    }

    /// Authorize and insert `item`. `key_field` names the field identifying the
    /// record in the audit trail.
    ///
    /// # Errors
    ///
    /// [`Self::prepare_create`] failures and store failures.
    pub async fn create(
        &self,
        request: &AccessRequest,
        key_field: &str,
        item: Record,
        rules: &ValidationRules,
    ) -> Result<Record, FieldAuthzError> {
        let identity = self.prepare_create(request, &item, rules).await?;
        let mut created = self.store.insert(item).await?;

        let mut entry = AuditEntry::for_request(AuditAction::Create, &identity, request)
            .with_body(created.clone());
        if let Some(value) = created.get(key_field) {
            entry = entry.with_resource(ResourceKey::new(key_field, literal(value)));
        }
        self.record(entry).await;

        strip_excluded(&identity, &mut created);
        Ok(created)
    }

    /// Apply `patch` to the record identified by `key`.
    ///
    /// # Errors
    ///
    /// - `BadRequest` for restricted, unlisted or excluded fields
    /// - `NotFound` when the record is absent or outside the update filters
    /// - validation, gate and store failures
    #[instrument(skip_all, fields(method = %request.method, path = %request.path, key = %key.key))]
    pub async fn update(
        &self,
        request: &AccessRequest,
        key: &ResourceKey,
        patch: Record,
        rules: &ValidationRules,
    ) -> Result<Record, FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        authorize_update_fields(&identity, patch.keys().map(String::as_str))?;

        let condition = self.scoped(&identity, FilterAction::Update, &QueryFilters::new(), key)?;
        let existing = self
            .store
            .find(Some(&condition))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_visible(key))?;
        validate_fields(rules, &patch, Some(&existing)).await?;

        let mut updated = self
            .store
            .update(&condition, &patch)
            .await?
            .ok_or_else(|| not_visible(key))?;

        self.record(
            AuditEntry::for_request(AuditAction::Update, &identity, request)
                .with_resource(key.clone())
                .with_body(patch),
        )
        .await;

        strip_excluded(&identity, &mut updated);
        Ok(updated)
    }

    /// Delete the record identified by `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the record is absent or outside the delete filters;
    /// gate and store failures.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path, key = %key.key))]
    pub async fn delete(
        &self,
        request: &AccessRequest,
        key: &ResourceKey,
    ) -> Result<(), FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        let condition = self.scoped(&identity, FilterAction::Delete, &QueryFilters::new(), key)?;

        if !self.store.delete(&condition).await? {
            return Err(not_visible(key));
        }

        self.record(
            AuditEntry::for_request(AuditAction::Delete, &identity, request)
                .with_resource(key.clone()),
        )
        .await;
        Ok(())
    }

    /// Point-in-time revisions of one record, most recent first.
    ///
    /// # Errors
    ///
    /// - `NotFound("audit disabled")` without an audit sink or with auditing off
    /// - `NotFound` when the trail holds no creation record
    /// - gate and sink failures
    #[instrument(skip_all, fields(method = %request.method, path = %request.path, key = %key.key))]
    pub async fn history(
        &self,
        request: &AccessRequest,
        key: &ResourceKey,
    ) -> Result<Vec<HistoryRevision>, FieldAuthzError> {
        let identity = self.gate.initialize_request(request).await?;
        let sink = match &self.audit {
            Some(sink) if self.config.audit_enabled => sink,
            _ => return Err(FieldAuthzError::not_found("audit disabled")),
        };

        let entries: Vec<AuditEntry> = sink
            .query(&key.key, &key.value)
            .await?
            .into_iter()
            .filter(|e| self.config.history_actions.contains(&e.action))
            .collect();

        let mut revisions = replay(entries)?;
        for revision in &mut revisions {
            if let Some(snapshot) = revision.snapshot.as_mut() {
                strip_excluded(&identity, snapshot);
            }
        }
        Ok(revisions)
    }

    async fn read(
        &self,
        identity: &Identity,
        query: &QueryFilters,
    ) -> Result<Vec<Record>, FieldAuthzError> {
        let condition = Filtering::new(self.store.operators()).filter_for(
            Some(identity),
            query,
            FilterAction::Read,
        )?;
        self.fetch(identity, condition.as_ref()).await
    }

    async fn fetch(
        &self,
        identity: &Identity,
        condition: Option<&Condition>,
    ) -> Result<Vec<Record>, FieldAuthzError> {
        let mut records = self.store.find(condition).await?;
        for record in &mut records {
            strip_excluded(identity, record);
        }
        Ok(records)
    }

    /// The caller's filters for `action` AND the query AND `key = value`.
    fn scoped(
        &self,
        identity: &Identity,
        action: FilterAction,
        query: &QueryFilters,
        key: &ResourceKey,
    ) -> Result<Condition, FieldAuthzError> {
        let operators = self.store.operators();
        let conditions = Filtering::new(operators).filter_for(Some(identity), query, action)?;
        let by_key = operators.eq(&key.key, &key.value)?;
        Ok(and_into(conditions, by_key))
    }

    async fn record(&self, entry: AuditEntry) {
        if !self.config.audit_enabled {
            return;
        }
        let Some(sink) = &self.audit else {
            return;
        };
        let action = entry.action;
        if let Err(e) = sink.append(entry).await {
            error!(?action, error = %e, "failed to append audit entry");
        }
    }
}

fn not_visible(key: &ResourceKey) -> FieldAuthzError {
    FieldAuthzError::not_found(format!(
        "{} {} does not exist or you lack permission to access it",
        key.key, key.value
    ))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::test_support::{FailingAuditSink, MockAuthority, identity_with_filters, record};
    use field_authz_sdk::{ErrorKind, FieldVerdict, FilterField, FilterOperator, validator_fn};
    use memory_store_plugin::{InMemoryAuditSink, InMemoryRecordStore};
    use serde_json::json;

    struct Fixture {
        service: FieldAuthzService,
        store: Arc<InMemoryRecordStore>,
        audit: Arc<InMemoryAuditSink>,
    }

    fn fixture(identity: Identity) -> Fixture {
        fixture_with(identity, InMemoryRecordStore::new(), FieldAuthzConfig::default())
    }

    fn fixture_with(
        identity: Identity,
        store: InMemoryRecordStore,
        config: FieldAuthzConfig,
    ) -> Fixture {
        let store = Arc::new(store.with_records(vec![
            record(json!({"id": "1", "owner": "u1", "title": "a", "ssn": "111"})),
            record(json!({"id": "2", "owner": "u2", "title": "b", "ssn": "222"})),
            record(json!({"id": "3", "owner": "u1", "title": "c", "ssn": "333"})),
        ]));
        let audit = Arc::new(InMemoryAuditSink::new());
        let service = FieldAuthzService::new(
            Arc::new(MockAuthority::default().with_identity(identity)),
            store.clone(),
            Some(audit.clone()),
            config,
        );
        Fixture {
            service,
            store,
            audit,
        }
    }

    fn owner_scoped() -> Identity {
        let mut identity =
            identity_with_filters(vec![FilterField::new("owner", FilterOperator::Eq, "u1")]);
        identity.permissions.update_filters = identity.permissions.read_filters.clone();
        identity.permissions.delete_filters = identity.permissions.read_filters.clone();
        identity.permissions.create_filters = identity.permissions.read_filters.clone();
        identity.permissions.excluded_fields = vec!["ssn".to_owned()];
        identity
    }

    fn request(method: &str, path: &str) -> AccessRequest {
        AccessRequest::new(method, path, "u1")
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(|r| r["id"].as_str()).collect()
    }

    #[tokio::test]
    async fn list_applies_read_filters_and_strips_excluded() {
        let f = fixture(owner_scoped());

        let records = f.service.list(&request("GET", "/items")).await.unwrap();

        assert_eq!(ids(&records), vec!["1", "3"]);
        assert!(records.iter().all(|r| !r.contains_key("ssn")));
        assert_eq!(f.audit.entries()[0].action, AuditAction::List);
    }

    #[tokio::test]
    async fn list_ands_query_filters() {
        let f = fixture(owner_scoped());
        let req = request("GET", "/items").query_param("title", "c");

        let records = f.service.list(&req).await.unwrap();
        assert_eq!(ids(&records), vec!["3"]);
    }

    #[tokio::test]
    async fn search_uses_explicit_filters() {
        let f = fixture(owner_scoped());
        let filters: QueryFilters =
            [("title".to_owned(), vec!["a".to_owned(), "b".to_owned()])].into();

        let records = f.service.search(&request("POST", "/items/search"), &filters).await.unwrap();

        assert_eq!(ids(&records), vec!["1"]);
        assert_eq!(f.audit.entries()[0].query, Some(filters));
    }

    #[tokio::test]
    async fn get_outside_filters_is_not_found() {
        let f = fixture(owner_scoped());

        let visible = f
            .service
            .get(&request("GET", "/items/1"), &ResourceKey::new("id", "1"))
            .await
            .unwrap();
        assert_eq!(visible, record(json!({"id": "1", "owner": "u1", "title": "a"})));

        let err = f
            .service
            .get(&request("GET", "/items/2"), &ResourceKey::new("id", "2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.to_string().contains("does not exist or you lack permission"));
    }

    #[tokio::test]
    async fn multi_get_batches_long_lists() {
        let config = FieldAuthzConfig {
            in_batch_size: 2,
            ..FieldAuthzConfig::default()
        };
        let f = fixture_with(owner_scoped(), InMemoryRecordStore::new(), config);
        let values = [json!("1"), json!("2"), json!("3"), json!("4"), json!("5")];

        let records = f
            .service
            .multi_get(&request("GET", "/items"), "id", &values)
            .await
            .unwrap();
        assert_eq!(ids(&records), vec!["1", "3"]);

        let short = f
            .service
            .multi_get(&request("GET", "/items"), "id", &values[..2])
            .await
            .unwrap();
        assert_eq!(ids(&short), vec!["1"]);
    }

    #[tokio::test]
    async fn multi_get_requires_in_operator() {
        let store = InMemoryRecordStore::new().with_operators(&[FilterOperator::Eq]);
        let f = fixture_with(owner_scoped(), store, FieldAuthzConfig::default());

        let err = f
            .service
            .multi_get(&request("GET", "/items"), "id", &[json!("1"), json!("3")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn create_checks_create_filters_locally() {
        let f = fixture(owner_scoped());

        let created = f
            .service
            .create(
                &request("POST", "/items"),
                "id",
                record(json!({"id": "4", "owner": "u1", "title": "d"})),
                &ValidationRules::new(),
            )
            .await
            .unwrap();
        assert_eq!(created["id"], json!("4"));
        assert_eq!(f.store.len(), 4);

        let err = f
            .service
            .create(
                &request("POST", "/items"),
                "id",
                record(json!({"id": "5", "owner": "u2"})),
                &ValidationRules::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(err.to_string().contains("owner"));
        assert_eq!(f.store.len(), 4);
    }

    #[tokio::test]
    async fn create_rejects_excluded_fields() {
        let f = fixture(owner_scoped());
        let err = f
            .service
            .prepare_create(
                &request("POST", "/items"),
                &record(json!({"owner": "u1", "ssn": "999"})),
                &ValidationRules::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, FieldAuthzError::unauthorized("fields not permitted: ssn"));
    }

    #[tokio::test]
    async fn create_runs_validators() {
        let f = fixture(owner_scoped());
        let rules = ValidationRules::new().require("title").field(
            "title",
            validator_fn(|input| async move {
                Ok(if input.value.as_str().is_some_and(|t| t.len() > 3) {
                    FieldVerdict::invalid("title too long")
                } else {
                    FieldVerdict::Valid
                })
            }),
        );

        let missing = f
            .service
            .create(&request("POST", "/items"), "id", record(json!({"owner": "u1"})), &rules)
            .await
            .unwrap_err();
        assert_eq!(missing, FieldAuthzError::MissingFields(vec!["title".to_owned()]));

        let invalid = f
            .service
            .create(
                &request("POST", "/items"),
                "id",
                record(json!({"owner": "u1", "title": "much too long"})),
                &rules,
            )
            .await
            .unwrap_err();
        assert!(matches!(invalid, FieldAuthzError::InvalidFields(_)));
    }

    #[tokio::test]
    async fn update_respects_field_lists_and_filters() {
        let mut identity = owner_scoped();
        identity.permissions.update_restricted_fields = vec!["owner".to_owned()];
        let f = fixture(identity);
        let key = ResourceKey::new("id", "1");

        let updated = f
            .service
            .update(&request("PUT", "/items/1"), &key, record(json!({"title": "z"})), &ValidationRules::new())
            .await
            .unwrap();
        assert_eq!(updated["title"], json!("z"));
        assert!(!updated.contains_key("ssn"));

        let restricted = f
            .service
            .update(&request("PUT", "/items/1"), &key, record(json!({"owner": "u2"})), &ValidationRules::new())
            .await
            .unwrap_err();
        assert_eq!(restricted.kind(), ErrorKind::BadRequest);

        let hidden = f
            .service
            .update(
                &request("PUT", "/items/2"),
                &ResourceKey::new("id", "2"),
                record(json!({"title": "z"})),
                &ValidationRules::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(hidden.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_outside_filters_is_not_found() {
        let f = fixture(owner_scoped());

        f.service
            .delete(&request("DELETE", "/items/3"), &ResourceKey::new("id", "3"))
            .await
            .unwrap();
        assert_eq!(f.store.len(), 2);

        let err = f
            .service
            .delete(&request("DELETE", "/items/2"), &ResourceKey::new("id", "2"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn history_replays_mutations() {
        let f = fixture(owner_scoped());
        let key = ResourceKey::new("id", "9");
        let rules = ValidationRules::new();

        f.service
            .create(&request("POST", "/items"), "id", record(json!({"id": "9", "owner": "u1", "title": "v1"})), &rules)
            .await
            .unwrap();
        f.service.get(&request("GET", "/items/9"), &key).await.unwrap();
        f.service
            .update(&request("PUT", "/items/9"), &key, record(json!({"title": "v2"})), &rules)
            .await
            .unwrap();
        f.service.delete(&request("DELETE", "/items/9"), &key).await.unwrap();

        let revisions = f.service.history(&request("GET", "/items/9/history"), &key).await.unwrap();

        let titles: Vec<_> = revisions
            .iter()
            .map(|r| r.snapshot.as_ref().and_then(|s| s.get("title").cloned()))
            .collect();
        assert_eq!(titles, vec![None, Some(json!("v2")), Some(json!("v1"))]);
    }

    #[tokio::test]
    async fn history_requires_audit() {
        let config = FieldAuthzConfig {
            audit_enabled: false,
            ..FieldAuthzConfig::default()
        };
        let f = fixture_with(owner_scoped(), InMemoryRecordStore::new(), config);

        let err = f
            .service
            .history(&request("GET", "/items/1/history"), &ResourceKey::new("id", "1"))
            .await
            .unwrap_err();
        assert_eq!(err, FieldAuthzError::not_found("audit disabled"));
        assert!(f.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn history_without_creation_is_not_found() {
        let f = fixture(owner_scoped());
        let key = ResourceKey::new("id", "1");
        f.service
            .update(&request("PUT", "/items/1"), &key, record(json!({"title": "x"})), &ValidationRules::new())
            .await
            .unwrap();

        let err = f.service.history(&request("GET", "/items/1/history"), &key).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn audit_failures_are_logged_not_returned() {
        let service = FieldAuthzService::new(
            Arc::new(MockAuthority::default().with_identity(owner_scoped())),
            Arc::new(InMemoryRecordStore::new()),
            Some(Arc::new(FailingAuditSink)),
            FieldAuthzConfig::default(),
        );

        let created = service
            .create(
                &request("POST", "/items"),
                "id",
                record(json!({"id": "1", "owner": "u1"})),
                &ValidationRules::new(),
            )
            .await;

        assert!(created.is_ok());
        assert!(logs_contain("failed to append audit entry"));
    }

    #[tokio::test]
    async fn gate_failure_stops_before_store() {
        let mut identity = owner_scoped();
        identity.permissions.endpoints.clear();
        let f = fixture(identity);

        let err = f
            .service
            .delete(&request("DELETE", "/items/1"), &ResourceKey::new("id", "1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(f.store.len(), 3);
        assert!(f.audit.entries().is_empty());
    }
}
