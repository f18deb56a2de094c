//! Named geofence store.

use dashmap::DashMap;
use patrol_core::{Coordinate, Geofence};
use tracing::debug;

/// Geofences keyed by name. Creating one with an existing name replaces it.
#[derive(Default)]
pub struct GeofenceStore {
    fences: DashMap<String, Geofence>,
}

impl GeofenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a geofence. Returns true if one was replaced.
    pub fn upsert(&self, fence: Geofence) -> bool {
        let name = fence.name.clone();
        let replaced = self.fences.insert(name.clone(), fence).is_some();
        debug!(name = %name, replaced, "Geofence stored");
        replaced
    }

    pub fn get(&self, name: &str) -> Option<Geofence> {
        self.fences.get(name).map(|f| f.value().clone())
    }

    /// All geofences sorted by name.
    pub fn list(&self) -> Vec<Geofence> {
        let mut fences: Vec<Geofence> = self.fences.iter().map(|f| f.value().clone()).collect();
        fences.sort_by(|a, b| a.name.cmp(&b.name));
        fences
    }

    /// Names of every geofence containing `point`, sorted.
    pub fn containing(&self, point: Coordinate) -> Vec<String> {
        let mut names: Vec<String> = self
            .fences
            .iter()
            .filter(|f| f.value().contains(point))
            .map(|f| f.key().clone())
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }
}
