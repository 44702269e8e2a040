//! Client-side view of the alert set.
//!
//! Three sources feed the cache: explicit `list`/`get` results, optimistic writes the
//! client staged before the server answered, and socket frames. All of them go through
//! the same merge so the outcome does not depend on which copy arrives first or how
//! many times it arrives.
//!
//! Merge rule for an incoming record:
//! 0. an id removed since the last resync stays removed;
//! 1. an entry with the same server id is replaced in place (unless the cached copy has
//!    a newer `version`, in which case the incoming copy is stale and ignored);
//! 2. otherwise a pending entry with the same author and title, staged within the match
//!    window of the record's `createdAt`, is promoted in place;
//! 3. otherwise the record is appended.
//!
//! Merging never fails. Malformed input is dropped and reported in the outcome.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::bus::AlertEvent;
use crate::models::{Alert, NewAlert};
use crate::protocol;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    Pending(String),
    Committed(Uuid),
}

/// An optimistic write not yet confirmed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAlert {
    pub local_id: String,
    pub created_by: String,
    pub staged_at: DateTime<Utc>,
    pub draft: NewAlert,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedAlert {
    Pending(PendingAlert),
    Committed(Alert),
}

impl CachedAlert {
    pub fn identity(&self) -> Identity {
        match self {
            CachedAlert::Pending(p) => Identity::Pending(p.local_id.clone()),
            CachedAlert::Committed(a) => Identity::Committed(a.id),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CachedAlert::Pending(p) => &p.draft.title,
            CachedAlert::Committed(a) => &a.title,
        }
    }

    pub fn as_committed(&self) -> Option<&Alert> {
        match self {
            CachedAlert::Committed(a) => Some(a),
            CachedAlert::Pending(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeWarning {
    MissingId,
    Malformed(String),
    UnknownEvent(String),
}

impl fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeWarning::MissingId => f.write_str("record has no id"),
            MergeWarning::Malformed(e) => write!(f, "record could not be decoded: {e}"),
            MergeWarning::UnknownEvent(name) => write!(f, "unknown event '{name}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted { position: usize },
    Replaced { position: usize },
    /// A pending optimistic entry was replaced by its authoritative record.
    Confirmed { local_id: String, position: usize },
    /// The cached copy is newer; nothing changed.
    Stale { cached_version: i64, incoming_version: i64 },
    Removed { position: usize },
    /// The id was removed earlier; late copies do not bring it back.
    Tombstoned,
    /// Identical copy or removal of an unknown id.
    Unchanged,
    Dropped(MergeWarning),
}

pub struct ReconciliationCache {
    entries: Vec<CachedAlert>,
    removed: HashSet<Uuid>,
    match_window: Duration,
    next_local: u64,
}

impl Default for ReconciliationCache {
    fn default() -> Self {
        Self::new(Duration::seconds(60))
    }
}

impl ReconciliationCache {
    pub fn new(match_window: Duration) -> Self {
        Self {
            entries: Vec::new(),
            removed: HashSet::new(),
            match_window,
            next_local: 0,
        }
    }

    pub fn entries(&self) -> &[CachedAlert] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Alert> {
        self.entries
            .iter()
            .filter_map(CachedAlert::as_committed)
            .find(|a| a.id == id)
    }

    pub fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, CachedAlert::Pending(_)))
            .count()
    }

    /// Records an optimistic create and returns its local id.
    pub fn stage(&mut self, draft: NewAlert, created_by: &str, staged_at: DateTime<Utc>) -> String {
        self.next_local += 1;
        let local_id = format!("temp-{}-{}", staged_at.timestamp_millis(), self.next_local);
        self.entries.push(CachedAlert::Pending(PendingAlert {
            local_id: local_id.clone(),
            created_by: created_by.to_string(),
            staged_at,
            draft,
        }));
        local_id
    }

    /// Drops a pending entry, e.g. when the server rejected the create.
    pub fn discard(&mut self, local_id: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !matches!(e, CachedAlert::Pending(p) if p.local_id == local_id));
        before != self.entries.len()
    }

    /// Merges an untyped record as received from the wire.
    pub fn merge(&mut self, incoming: Value) -> MergeOutcome {
        let has_id = ["id", "_id"]
            .iter()
            .any(|key| incoming.get(key).is_some_and(|v| !v.is_null()));
        if !has_id {
            return dropped(MergeWarning::MissingId);
        }

        match serde_json::from_value::<Alert>(incoming) {
            Ok(alert) => self.merge_alert(alert),
            Err(e) => dropped(MergeWarning::Malformed(e.to_string())),
        }
    }

    pub fn merge_alert(&mut self, incoming: Alert) -> MergeOutcome {
        if self.removed.contains(&incoming.id) {
            return MergeOutcome::Tombstoned;
        }

        if let Some(position) = self.position_of(incoming.id) {
            let CachedAlert::Committed(cached) = &self.entries[position] else {
                unreachable!("position_of only returns committed entries");
            };
            if cached.version > incoming.version {
                return MergeOutcome::Stale {
                    cached_version: cached.version,
                    incoming_version: incoming.version,
                };
            }
            if *cached == incoming {
                return MergeOutcome::Unchanged;
            }
            self.entries[position] = CachedAlert::Committed(incoming);
            return MergeOutcome::Replaced { position };
        }

        if let Some(position) = self.pending_match(&incoming) {
            let CachedAlert::Pending(pending) = std::mem::replace(
                &mut self.entries[position],
                CachedAlert::Committed(incoming),
            ) else {
                unreachable!("pending_match only returns pending entries");
            };
            return MergeOutcome::Confirmed {
                local_id: pending.local_id,
                position,
            };
        }

        self.entries.push(CachedAlert::Committed(incoming));
        MergeOutcome::Inserted {
            position: self.entries.len() - 1,
        }
    }

    /// Removes the entry and remembers the id, including ids the cache has not seen
    /// yet, so a removal that overtakes its create still wins.
    pub fn remove(&mut self, id: Uuid) -> MergeOutcome {
        self.removed.insert(id);
        match self.position_of(id) {
            Some(position) => {
                self.entries.remove(position);
                MergeOutcome::Removed { position }
            }
            None => MergeOutcome::Unchanged,
        }
    }

    pub fn apply(&mut self, event: AlertEvent) -> MergeOutcome {
        match event {
            AlertEvent::Created(alert) | AlertEvent::Updated(alert) => self.merge_alert(alert),
            AlertEvent::Deleted { id } => self.remove(id),
        }
    }

    /// Applies a raw socket frame (`{"event": ..., "data": ...}`).
    pub fn apply_frame(&mut self, frame: &str) -> MergeOutcome {
        #[derive(Deserialize)]
        struct RawFrame {
            event: String,
            #[serde(default)]
            data: Value,
        }

        let frame: RawFrame = match serde_json::from_str(frame) {
            Ok(frame) => frame,
            Err(e) => return dropped(MergeWarning::Malformed(e.to_string())),
        };

        match frame.event.as_str() {
            protocol::ALERT_UPDATE => self.merge(frame.data),
            protocol::ALERT_REMOVED => {
                match frame.data.get("id").and_then(Value::as_str).map(Uuid::parse_str) {
                    Some(Ok(id)) => self.remove(id),
                    Some(Err(e)) => dropped(MergeWarning::Malformed(e.to_string())),
                    None => dropped(MergeWarning::MissingId),
                }
            }
            other => dropped(MergeWarning::UnknownEvent(other.to_string())),
        }
    }

    /// Replaces the committed view with a fresh `list()` result after a gap in the
    /// socket stream. Pending entries the server already knows about are dropped; the
    /// rest stay at the end. The fresh list is authoritative, so removals are forgotten.
    pub fn resync(&mut self, alerts: Vec<Alert>) {
        self.removed.clear();
        let pending: Vec<PendingAlert> = std::mem::take(&mut self.entries)
            .into_iter()
            .filter_map(|e| match e {
                CachedAlert::Pending(p) => Some(p),
                CachedAlert::Committed(_) => None,
            })
            .collect();

        self.entries = alerts.into_iter().map(CachedAlert::Committed).collect();

        for p in pending {
            let confirmed = self
                .entries
                .iter()
                .filter_map(CachedAlert::as_committed)
                .any(|a| self.is_confirmation(&p, a));
            if !confirmed {
                self.entries.push(CachedAlert::Pending(p));
            }
        }
    }

    fn position_of(&self, id: Uuid) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, CachedAlert::Committed(a) if a.id == id))
    }

    fn pending_match(&self, incoming: &Alert) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| matches!(e, CachedAlert::Pending(p) if self.is_confirmation(p, incoming)))
    }

    fn is_confirmation(&self, pending: &PendingAlert, alert: &Alert) -> bool {
        pending.created_by == alert.created_by
            && pending.draft.title == alert.title
            && (alert.created_at - pending.staged_at).abs() <= self.match_window
    }
}

fn dropped(warning: MergeWarning) -> MergeOutcome {
    warn!(%warning, "Dropped incoming alert record");
    MergeOutcome::Dropped(warning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{now, AlertPayload, AlertStatus};
    use serde_json::json;

    fn draft(title: &str) -> NewAlert {
        let payload: AlertPayload = serde_json::from_value(json!({
            "title": title,
            "description": "water rising",
            "type": "Flood",
            "severity": "High",
            "location": { "coordinates": [-80.19, 25.76], "address": "Miami, FL" }
        }))
        .unwrap();
        payload.into_new().unwrap()
    }

    fn committed(title: &str, author: &str, at: DateTime<Utc>) -> Alert {
        Alert::create(draft(title), author, at)
    }

    #[test]
    fn test_insert_then_replace_in_place() {
        let mut cache = ReconciliationCache::default();
        let a = committed("a", "u1", now());
        let b = committed("b", "u1", now());

        assert_eq!(cache.merge_alert(a.clone()), MergeOutcome::Inserted { position: 0 });
        assert_eq!(cache.merge_alert(b.clone()), MergeOutcome::Inserted { position: 1 });

        let mut a2 = a.clone();
        a2.status = AlertStatus::Resolved;
        a2.version = 2;
        assert_eq!(cache.merge_alert(a2.clone()), MergeOutcome::Replaced { position: 0 });
        assert_eq!(cache.get(a.id), Some(&a2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_duplicate_delivery_is_idempotent() {
        let mut once = ReconciliationCache::default();
        let mut twice = ReconciliationCache::default();
        let a = committed("a", "u1", now());

        once.apply(AlertEvent::Created(a.clone()));
        twice.apply(AlertEvent::Created(a.clone()));
        assert_eq!(twice.apply(AlertEvent::Created(a)), MergeOutcome::Unchanged);

        assert_eq!(once.entries(), twice.entries());
    }

    #[test]
    fn test_out_of_order_update_is_ignored() {
        let mut cache = ReconciliationCache::default();
        let a = committed("a", "u1", now());
        let mut newer = a.clone();
        newer.version = 3;
        newer.status = AlertStatus::Monitoring;

        cache.merge_alert(newer.clone());
        assert_eq!(
            cache.merge_alert(a),
            MergeOutcome::Stale {
                cached_version: 3,
                incoming_version: 1
            }
        );
        assert_eq!(cache.get(newer.id), Some(&newer));
    }

    #[test]
    fn test_pending_write_is_confirmed_in_place() {
        let mut cache = ReconciliationCache::default();
        let t0 = now();
        let before = committed("earlier", "u2", t0);
        cache.merge_alert(before);

        let local_id = cache.stage(draft("Flood Warning"), "u1", t0);
        cache.merge_alert(committed("later", "u3", t0));
        assert_eq!(cache.pending_count(), 1);

        let authoritative = committed("Flood Warning", "u1", t0 + Duration::seconds(2));
        let outcome = cache.merge_alert(authoritative.clone());

        assert_eq!(
            outcome,
            MergeOutcome::Confirmed {
                local_id,
                position: 1
            }
        );
        assert_eq!(cache.pending_count(), 0);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.entries()[1].identity(), Identity::Committed(authoritative.id));
    }

    #[test]
    fn test_pending_outside_window_or_other_author_not_matched() {
        let mut cache = ReconciliationCache::new(Duration::seconds(10));
        let t0 = now();
        cache.stage(draft("Flood Warning"), "u1", t0);

        let late = committed("Flood Warning", "u1", t0 + Duration::seconds(30));
        assert_eq!(cache.merge_alert(late), MergeOutcome::Inserted { position: 1 });

        let other_author = committed("Flood Warning", "u9", t0);
        assert_eq!(cache.merge_alert(other_author), MergeOutcome::Inserted { position: 2 });
        assert_eq!(cache.pending_count(), 1);
    }

    #[test]
    fn test_malformed_records_are_dropped() {
        let mut cache = ReconciliationCache::default();
        assert_eq!(
            cache.merge(json!({ "title": "no id" })),
            MergeOutcome::Dropped(MergeWarning::MissingId)
        );
        assert!(matches!(
            cache.merge(json!({ "id": "not-a-uuid", "title": "x" })),
            MergeOutcome::Dropped(MergeWarning::Malformed(_))
        ));
        assert!(cache.is_empty());

        let a = committed("a", "u1", now());
        let mut legacy = serde_json::to_value(&a).unwrap();
        let id = legacy.as_object_mut().unwrap().remove("id").unwrap();
        legacy["_id"] = id;
        assert_eq!(cache.merge(legacy), MergeOutcome::Inserted { position: 0 });
    }

    #[test]
    fn test_frames() {
        let mut cache = ReconciliationCache::default();
        let a = committed("a", "u1", now());

        let update = protocol::ServerFrame::from(AlertEvent::Created(a.clone())).to_json().unwrap();
        assert_eq!(cache.apply_frame(&update), MergeOutcome::Inserted { position: 0 });

        let removed = protocol::ServerFrame::AlertRemoved { id: a.id }.to_json().unwrap();
        assert_eq!(cache.apply_frame(&removed), MergeOutcome::Removed { position: 0 });
        assert_eq!(cache.apply_frame(&removed), MergeOutcome::Unchanged);

        assert_eq!(
            cache.apply_frame(r#"{"event":"joinDisaster","data":{}}"#),
            MergeOutcome::Dropped(MergeWarning::UnknownEvent("joinDisaster".into()))
        );
        assert!(matches!(
            cache.apply_frame("{not json"),
            MergeOutcome::Dropped(MergeWarning::Malformed(_))
        ));
    }

    #[test]
    fn test_removed_alert_stays_removed() {
        let mut cache = ReconciliationCache::default();
        let a = committed("a", "u1", now());
        let mut late_update = a.clone();
        late_update.version = 2;

        cache.merge_alert(a.clone());
        assert_eq!(
            cache.apply(AlertEvent::Deleted { id: a.id }),
            MergeOutcome::Removed { position: 0 }
        );

        assert_eq!(cache.merge_alert(a.clone()), MergeOutcome::Tombstoned);
        assert_eq!(
            cache.merge(serde_json::to_value(&late_update).unwrap()),
            MergeOutcome::Tombstoned
        );
        assert!(cache.get(a.id).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_removal_overtaking_create_wins() {
        let mut cache = ReconciliationCache::default();
        let a = committed("a", "u1", now());

        assert_eq!(cache.remove(a.id), MergeOutcome::Unchanged);
        assert_eq!(cache.apply(AlertEvent::Created(a.clone())), MergeOutcome::Tombstoned);
        assert!(cache.is_empty());

        // A fresh list is the server's word; it clears old removals.
        cache.resync(vec![a.clone()]);
        assert_eq!(cache.get(a.id), Some(&a));
    }

    #[test]
    fn test_resync_keeps_unconfirmed_pending() {
        let mut cache = ReconciliationCache::default();
        let t0 = now();
        cache.merge_alert(committed("stale", "u1", t0));
        cache.stage(draft("confirmed"), "u1", t0);
        let still_pending = cache.stage(draft("not yet"), "u1", t0);

        let fresh = vec![committed("confirmed", "u1", t0), committed("other", "u2", t0)];
        cache.resync(fresh.clone());

        let identities: Vec<_> = cache.entries().iter().map(CachedAlert::identity).collect();
        assert_eq!(
            identities,
            vec![
                Identity::Committed(fresh[0].id),
                Identity::Committed(fresh[1].id),
                Identity::Pending(still_pending),
            ]
        );
    }

    #[test]
    fn test_discard_pending() {
        let mut cache = ReconciliationCache::default();
        let local = cache.stage(draft("x"), "u1", now());
        assert!(cache.discard(&local));
        assert!(!cache.discard(&local));
        assert!(cache.is_empty());
    }
}
