//! Patrol data model.
//!
//! `Patrol` is the record of truth kept by the registry. `LocationUpdate` is the
//! transient inbound payload, and `UpdateEvent` is the immutable payload fanned
//! out to observers after an update has been applied.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{CoreError, Result};

/// Patrol identifier.
///
/// Allocated by the registry, monotonically increasing and never reused
/// within a process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatrolId(u64);

impl PatrolId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for PatrolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PatrolId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A `(latitude, longitude)` pair in degrees.
///
/// Serialised as a two-element JSON array `[lat, lon]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Reject values that cannot be a position on the globe.
    pub fn validate(&self) -> Result<()> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(CoreError::InvalidCoordinate(format!(
                "non-finite coordinate ({}, {})",
                self.lat, self.lon
            )));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoreError::InvalidCoordinate(format!(
                "latitude {} out of range [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(CoreError::InvalidCoordinate(format!(
                "longitude {} out of range [-180, 180]",
                self.lon
            )));
        }
        Ok(())
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lon): (f64, f64)) -> Self {
        Self { lat, lon }
    }
}

impl From<Coordinate> for (f64, f64) {
    fn from(c: Coordinate) -> Self {
        (c.lat, c.lon)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// A tracked patrol unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patrol {
    pub id: PatrolId,
    pub unit: String,
    pub route_name: String,
    /// Planned waypoints, immutable after creation.
    pub route: Vec<Coordinate>,
    /// Absent until the first location update.
    pub current_location: Option<Coordinate>,
    pub last_update: Option<DateTime<Utc>>,
    /// Result of the most recent route check against `current_location`.
    pub on_track: bool,
}

impl Patrol {
    /// Create a patrol that has not reported a location yet.
    pub fn new(id: PatrolId, request: NewPatrol) -> Self {
        Self {
            id,
            unit: request.unit,
            route_name: request.route_name,
            route: request.route,
            current_location: None,
            last_update: None,
            on_track: true,
        }
    }
}

/// Request body for creating a patrol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatrol {
    pub unit: String,
    pub route_name: String,
    #[serde(default)]
    pub route: Vec<Coordinate>,
}

impl NewPatrol {
    /// Validate every route waypoint.
    pub fn validate(&self) -> Result<()> {
        self.route.iter().try_for_each(Coordinate::validate)
    }
}

/// Inbound location report for a single patrol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub latitude: f64,
    pub longitude: f64,
    /// Defaults to the receipt time when absent.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LocationUpdate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// The reported timestamp, or `received_at` if none was sent.
    pub fn timestamp_or(&self, received_at: DateTime<Utc>) -> DateTime<Utc> {
        self.timestamp.unwrap_or(received_at)
    }
}

/// Parse an ISO-8601 timestamp.
///
/// Accepts RFC 3339 with an explicit offset, or a naive date-time which is
/// taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| CoreError::InvalidTimestamp(format!("{raw}: {e}")))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| parse_timestamp(&s).map_err(serde::de::Error::custom))
        .transpose()
}

/// Broadcast payload describing one applied location update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub patrol_id: PatrolId,
    pub unit: String,
    pub location: Coordinate,
    pub timestamp: DateTime<Utc>,
    pub on_track: bool,
}

impl UpdateEvent {
    /// Build an event from a patrol snapshot.
    ///
    /// Returns `None` if the patrol has never reported a location.
    pub fn from_patrol(patrol: &Patrol) -> Option<Self> {
        Some(Self {
            patrol_id: patrol.id,
            unit: patrol.unit.clone(),
            location: patrol.current_location?,
            timestamp: patrol.last_update?,
            on_track: patrol.on_track,
        })
    }
}

/// Message envelope sent on the observer channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubMessage {
    LocationUpdate(UpdateEvent),
}

impl From<UpdateEvent> for HubMessage {
    fn from(event: UpdateEvent) -> Self {
        Self::LocationUpdate(event)
    }
}
