//! Canonical in-memory state for patrol tracking.
//!
//! - `PatrolRegistry`: owns every patrol record and applies location updates
//!   with per-patrol serialization
//! - `GeofenceStore`: named polygons keyed by name

pub mod error;
pub mod geofences;
pub mod patrols;

pub use error::{RegistryError, RegistryResult};
pub use geofences::GeofenceStore;
pub use patrols::PatrolRegistry;
