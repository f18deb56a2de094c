//! Patrol registry.
//!
//! Each patrol lives behind its own lock so that updates to one patrol never
//! wait on another. The outer map is only locked long enough to clone the
//! entry handle out.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use patrol_core::{is_on_route, Coordinate, NewPatrol, Patrol, PatrolId, DEFAULT_ROUTE_THRESHOLD};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

type PatrolEntry = Arc<RwLock<Patrol>>;

/// Owner of every patrol record.
pub struct PatrolRegistry {
    patrols: DashMap<PatrolId, PatrolEntry>,
    next_id: AtomicU64,
    /// Per-axis route deviation allowance in degrees.
    threshold: f64,
}

impl PatrolRegistry {
    /// Create an empty registry using the default route threshold.
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_ROUTE_THRESHOLD)
    }

    /// Create an empty registry with a custom route threshold.
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            patrols: DashMap::new(),
            next_id: AtomicU64::new(1),
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Register a new patrol with no location yet.
    pub fn create(&self, request: NewPatrol) -> Patrol {
        let id = PatrolId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let patrol = Patrol::new(id, request);
        self.patrols
            .insert(id, Arc::new(RwLock::new(patrol.clone())));
        debug!(patrol_id = %id, unit = %patrol.unit, "Patrol created");
        patrol
    }

    fn entry(&self, id: PatrolId) -> RegistryResult<PatrolEntry> {
        self.patrols
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NotFound(id))
    }

    /// Snapshot of one patrol.
    pub fn get(&self, id: PatrolId) -> RegistryResult<Patrol> {
        Ok(self.entry(id)?.read().clone())
    }

    /// Snapshot of every patrol in creation order.
    pub fn list(&self) -> Vec<Patrol> {
        let mut patrols: Vec<Patrol> = self
            .patrols
            .iter()
            .map(|entry| entry.value().read().clone())
            .collect();
        patrols.sort_by_key(|p| p.id);
        patrols
    }

    /// Apply a location report and recompute route adherence.
    ///
    /// Location, timestamp and `on_track` are written under one lock so
    /// readers never see a location paired with a stale flag.
    pub fn record_update(
        &self,
        id: PatrolId,
        location: Coordinate,
        timestamp: DateTime<Utc>,
    ) -> RegistryResult<Patrol> {
        let entry = self.entry(id)?;
        let mut patrol = entry.write();

        patrol.current_location = Some(location);
        patrol.last_update = Some(timestamp);
        patrol.on_track = is_on_route(location, &patrol.route, self.threshold);

        debug!(
            patrol_id = %id,
            location = %location,
            on_track = patrol.on_track,
            "Location recorded"
        );
        Ok(patrol.clone())
    }

    pub fn len(&self) -> usize {
        self.patrols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patrols.is_empty()
    }
}

impl Default for PatrolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
