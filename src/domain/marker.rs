//! Marker bookkeeping
//!
//! The map SDK is the source of truth for what is drawn. The bridge only
//! keeps a side-table of the markers it added so they can be cleared in bulk.

use std::fmt;

use serde::Serialize;

use crate::domain::core::LatLng;

/// Identifier assigned to a marker by the map SDK
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct MarkerId(String);

impl MarkerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerRecord {
    pub id: MarkerId,
    pub position: LatLng,
    pub title: String,
    pub draggable: bool,
}

/// Insertion-ordered table of live markers
#[derive(Debug, Default)]
pub struct MarkerTable {
    records: Vec<MarkerRecord>,
}

impl MarkerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: MarkerRecord) {
        self.records.retain(|existing| existing.id != record.id);
        self.records.push(record);
    }

    pub fn get(&self, id: &MarkerId) -> Option<&MarkerRecord> {
        self.records.iter().find(|record| &record.id == id)
    }

    pub fn contains(&self, id: &MarkerId) -> bool {
        self.get(id).is_some()
    }

    /// Record a new position after a drag
    pub fn update_position(&mut self, id: &MarkerId, position: LatLng) {
        if let Some(record) = self.records.iter_mut().find(|record| &record.id == id) {
            record.position = position;
        }
    }

    /// Remove every record, returning them in insertion order
    pub fn drain(&mut self) -> Vec<MarkerRecord> {
        std::mem::take(&mut self.records)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> MarkerRecord {
        MarkerRecord {
            id: MarkerId::new(id),
            position: LatLng::new(1.0, 2.0),
            title: format!("marker {id}"),
            draggable: false,
        }
    }

    #[test]
    fn drain_returns_insertion_order() {
        let mut table = MarkerTable::new();
        table.insert(record("m0"));
        table.insert(record("m1"));

        let drained: Vec<_> = table.drain().into_iter().map(|r| r.id).collect();
        assert_eq!(drained, vec![MarkerId::new("m0"), MarkerId::new("m1")]);
        assert!(table.is_empty());
    }

    #[test]
    fn reinserting_replaces_record() {
        let mut table = MarkerTable::new();
        table.insert(record("m0"));
        table.insert(record("m0"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn drag_updates_position() {
        let mut table = MarkerTable::new();
        table.insert(record("m0"));
        table.update_position(&MarkerId::new("m0"), LatLng::new(5.0, 6.0));
        assert_eq!(table.get(&MarkerId::new("m0")).unwrap().position, LatLng::new(5.0, 6.0));
    }
}
