//! Audit replay.

use std::collections::VecDeque;

use field_authz_sdk::{AuditAction, AuditEntry, FieldAuthzError, HistoryRevision};

/// Rebuild point-in-time snapshots of one record from its audit entries.
///
/// Entries may arrive in any order. The first CREATE seeds the snapshot;
/// each UPDATE applies its diff onto a fresh copy, each DELETE yields an empty
/// revision, and a later CREATE starts over from its body. Reads contribute
/// nothing. Revisions are returned most recent first.
///
/// # Errors
///
/// `NotFound` when the trail holds no CREATE entry.
pub fn replay(mut entries: Vec<AuditEntry>) -> Result<Vec<HistoryRevision>, FieldAuthzError> {
    entries.sort_by_key(|e| e.timestamp);

    let seed_at = entries
        .iter()
        .position(|e| e.action == AuditAction::Create)
        .ok_or_else(|| FieldAuthzError::not_found("no initial creation record"))?;

    let seed = &entries[seed_at];
    let mut current = seed.body.clone().unwrap_or_default();
    let mut revisions = VecDeque::with_capacity(entries.len() - seed_at);
    revisions.push_front(HistoryRevision {
        timestamp: seed.timestamp,
        snapshot: Some(current.clone()),
    });

    for entry in entries.iter().skip(seed_at + 1) {
        let snapshot = match entry.action {
            AuditAction::Create => {
                current = entry.body.clone().unwrap_or_default();
                Some(current.clone())
            }
            AuditAction::Update => {
                let mut next = current.clone();
                if let Some(diff) = &entry.body {
                    for (field, value) in diff {
                        next.insert(field.clone(), value.clone());
                    }
                }
                current = next;
                Some(current.clone())
            }
            AuditAction::Delete => None,
            AuditAction::Get | AuditAction::List | AuditAction::Search => continue,
        };
        revisions.push_front(HistoryRevision {
            timestamp: entry.timestamp,
            snapshot,
        });
    }

    Ok(revisions.into())
}
