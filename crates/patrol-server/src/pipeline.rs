//! Location-update orchestration.
//!
//! One call to [`UpdatePipeline::submit`] per incoming report:
//! authorize, validate, resolve the patrol, record the update, then publish
//! the resulting event. Publishing never changes the outcome returned to the
//! caller.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use patrol_core::{Identity, LocationUpdate, Patrol, PatrolId, Role, UpdateEvent};
use patrol_hub::BroadcastHub;
use patrol_registry::PatrolRegistry;
use patrol_telemetry::Metrics;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::auth::Authorizer;
use crate::error::{ApiError, ApiResult};

/// Lowest role allowed to submit location updates.
pub const MIN_UPDATE_ROLE: Role = Role::PatrolMember;

pub struct UpdatePipeline {
    registry: Arc<PatrolRegistry>,
    hub: Arc<BroadcastHub>,
    authorizer: Arc<dyn Authorizer>,
    /// Held from record to publish so events for one patrol leave in the
    /// order their updates were applied.
    sequencer: DashMap<PatrolId, Arc<Mutex<()>>>,
}

impl UpdatePipeline {
    pub fn new(
        registry: Arc<PatrolRegistry>,
        hub: Arc<BroadcastHub>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        Self {
            registry,
            hub,
            authorizer,
            sequencer: DashMap::new(),
        }
    }

    /// Check that `credential` may submit updates.
    pub fn authorize(&self, credential: Option<&str>) -> ApiResult<Identity> {
        Ok(self.authorizer.authorize(credential, MIN_UPDATE_ROLE)?)
    }

    /// Apply one location report and publish it to observers.
    pub async fn submit(
        &self,
        credential: Option<&str>,
        id: PatrolId,
        update: LocationUpdate,
    ) -> ApiResult<Patrol> {
        let result = self.run(credential, id, update).await;
        if let Err(e) = &result {
            Metrics::update_rejected(e.reason());
        }
        result
    }

    async fn run(
        &self,
        credential: Option<&str>,
        id: PatrolId,
        update: LocationUpdate,
    ) -> ApiResult<Patrol> {
        let identity = self.authorize(credential)?;

        let location = update.coordinate();
        location.validate()?;

        self.registry.get(id)?;

        let timestamp = update.timestamp_or(Utc::now());
        let lock = self.sequence_lock(id);
        let _sequenced = lock.lock().await;

        let patrol = self.registry.record_update(id, location, timestamp)?;
        Metrics::update_applied(patrol.on_track);

        let event = UpdateEvent::from_patrol(&patrol).ok_or_else(|| {
            ApiError::Internal(format!("patrol {id} has no location after update"))
        })?;
        let report = self.hub.broadcast(&event).await;

        info!(
            patrol_id = %id,
            user = %identity.username,
            on_track = patrol.on_track,
            delivered = report.delivered,
            dropped = report.dropped.len(),
            "Location update applied"
        );
        Ok(patrol)
    }

    fn sequence_lock(&self, id: PatrolId) -> Arc<Mutex<()>> {
        let lock = self.sequencer.entry(id).or_default().clone();
        debug!(patrol_id = %id, "Acquiring sequencing lock");
        lock
    }
}
