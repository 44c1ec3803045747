use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ParkingError, Result};

/// Wall-clock instant used for every reservation window and status change.
pub type Timestamp = DateTime<Utc>;

pub type LotId = u64;
pub type VehicleId = u64;
pub type CustomerId = u64;
/// Cell types and vehicle types share one id space: a vehicle of type `n`
/// parks in cells of type `n`.
pub type CellTypeId = u64;

pub type CellId = String;
pub type ReservationId = String;
pub type SensorId = String;

/// Truncates `t` to whole milliseconds, the finest resolution every store
/// keeps. Instants are truncated before they are validated or written, so a
/// record reads back exactly as written.
pub fn to_store_precision(t: Timestamp) -> Timestamp {
    t.duration_trunc(Duration::milliseconds(1)).unwrap_or(t)
}

/// Generates a prefixed opaque id, e.g. `rsv_V1StGXR8_Z5jdHi6B-myT`.
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, nanoid::nanoid!())
}

/// Observable occupancy of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CellStatus {
    Free,
    Occupied,
}

impl fmt::Display for CellStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellStatus::Free => write!(f, "FREE"),
            CellStatus::Occupied => write!(f, "OCCUPIED"),
        }
    }
}

impl FromStr for CellStatus {
    type Err = ParkingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "FREE" => Ok(CellStatus::Free),
            "OCCUPIED" => Ok(CellStatus::Occupied),
            other => Err(ParkingError::InvalidInput(format!(
                "Invalid cell status '{}'. Must be one of: FREE, OCCUPIED",
                other
            ))),
        }
    }
}

/// Reservation lifecycle states. CLOSED is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Open,
    Closed,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Open => write!(f, "OPEN"),
            ReservationStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = ParkingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(ReservationStatus::Open),
            "CLOSED" => Ok(ReservationStatus::Closed),
            other => Err(ParkingError::InvalidInput(format!(
                "Invalid reservation status '{}'. Must be one of: OPEN, CLOSED",
                other
            ))),
        }
    }
}

/// A half-open interval `[start, end)`. `end = None` means open-ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

impl Window {
    /// Builds a window at store precision, rejecting `end <= start`.
    pub fn new(start: Timestamp, end: Option<Timestamp>) -> Result<Self> {
        let start = to_store_precision(start);
        let end = end.map(to_store_precision);
        if let Some(end) = end {
            if end <= start {
                return Err(ParkingError::InvalidInput(format!(
                    "end ({}) must be later than start ({})",
                    end.to_rfc3339(),
                    start.to_rfc3339()
                )));
            }
        }
        Ok(Self { start, end })
    }

    pub fn open_ended(start: Timestamp) -> Self {
        Self {
            start: to_store_precision(start),
            end: None,
        }
    }

    /// `start <= t AND (end IS NULL OR end > t)`
    pub fn covers(&self, t: Timestamp) -> bool {
        self.start <= t && self.end.is_none_or(|end| end > t)
    }

    /// Interval intersection: `self.end IS NULL OR self.end > other.start`
    /// AND `other.end IS NULL OR self.start < other.end`.
    pub fn intersects(&self, other: &Window) -> bool {
        self.end.is_none_or(|end| end > other.start)
            && other.end.is_none_or(|end| self.start < end)
    }

    /// True once a bounded window has run out at `t`.
    pub fn has_ended_by(&self, t: Timestamp) -> bool {
        self.end.is_some_and(|end| end <= t)
    }
}
