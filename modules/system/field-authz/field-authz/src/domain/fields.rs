//! Field-level restrictions: excluded, update-permitted and update-restricted fields.

use field_authz_sdk::{FieldAuthzError, Identity, Record};

/// Reject a candidate item that names any excluded field.
///
/// # Errors
///
/// `Unauthorized` listing every offending field.
pub fn reject_excluded_fields(identity: &Identity, item: &Record) -> Result<(), FieldAuthzError> {
    let excluded = &identity.permissions.excluded_fields;
    let offending: Vec<&str> = item
        .keys()
        .filter(|field| excluded.contains(field))
        .map(String::as_str)
        .collect();

    if offending.is_empty() {
        Ok(())
    } else {
        Err(FieldAuthzError::unauthorized(format!(
            "fields not permitted: {}",
            offending.join(", ")
        )))
    }
}

/// Check the fields of an update against the identity's update lists.
///
/// Fields are checked in sorted order: the restricted list first, then the
/// allow-list (when non-empty), then the excluded list.
///
/// # Errors
///
/// `BadRequest` naming the first field that fails a check.
pub fn authorize_update_fields<'f>(
    identity: &Identity,
    fields: impl IntoIterator<Item = &'f str>,
) -> Result<(), FieldAuthzError> {
    let bundle = &identity.permissions;
    let mut fields: Vec<&str> = fields.into_iter().collect();
    fields.sort_unstable();
    fields.dedup();

    let listed = |list: &[String], field: &str| list.iter().any(|f| f == field);

    if let Some(field) = fields
        .iter()
        .find(|f| listed(&bundle.update_restricted_fields, **f))
    {
        return Err(FieldAuthzError::bad_request(format!(
            "field {field} is restricted from updates"
        )));
    }

    if !bundle.update_permitted_fields.is_empty()
        && let Some(field) = fields
            .iter()
            .find(|f| !listed(&bundle.update_permitted_fields, **f))
    {
        return Err(FieldAuthzError::bad_request(format!(
            "field {field} is not permitted for updates"
        )));
    }

    if let Some(field) = fields.iter().find(|f| listed(&bundle.excluded_fields, **f)) {
        return Err(FieldAuthzError::bad_request(format!(
            "field {field} is excluded"
        )));
    }

    Ok(())
}

/// Remove the identity's excluded fields from a record about to be returned.
pub fn strip_excluded(identity: &Identity, record: &mut Record) {
    for field in &identity.permissions.excluded_fields {
        record.remove(field);
    }
}
