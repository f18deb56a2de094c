//! Core domain types for patrol tracking.
//!
//! This crate provides the types shared by every other crate in the workspace:
//! - `Coordinate`: a `(lat, lon)` pair, serialised as a two-element array
//! - `Patrol`, `LocationUpdate`, `UpdateEvent`: the location-update data model
//! - `Role`, `Identity`: ranked roles used for authorization
//! - `geo`: point-in-polygon and route-proximity checks

pub mod error;
pub mod geo;
pub mod role;
pub mod types;

pub use error::{CoreError, Result};
pub use geo::{is_on_route, point_in_polygon, Geofence, DEFAULT_ROUTE_THRESHOLD};
pub use role::{Identity, Role};
pub use types::{
    parse_timestamp, Coordinate, HubMessage, LocationUpdate, NewPatrol, Patrol, PatrolId,
    UpdateEvent,
};
