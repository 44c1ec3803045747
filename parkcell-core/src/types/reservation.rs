use serde::{Deserialize, Serialize};

use super::{CellId, CustomerId, ReservationId, ReservationStatus, Timestamp, VehicleId, Window};

/// A vehicle's claim on a cell for a window of time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation ID
    pub id: ReservationId,
    /// Vehicle occupying the cell
    pub vehicle_id: VehicleId,
    /// The reserved cell
    pub cell_id: CellId,
    /// Billing reference, when the reservation was made for a customer
    pub customer_id: Option<CustomerId>,
    /// `[start, end)`
    #[serde(flatten)]
    pub window: Window,
    pub status: ReservationStatus,
}

impl Reservation {
    pub fn open(
        id: ReservationId,
        vehicle_id: VehicleId,
        cell_id: CellId,
        customer_id: Option<CustomerId>,
        window: Window,
    ) -> Self {
        Self {
            id,
            vehicle_id,
            cell_id,
            customer_id,
            window,
            status: ReservationStatus::Open,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == ReservationStatus::Open
    }

    /// An OPEN reservation whose window covers `t`.
    pub fn is_active_at(&self, t: Timestamp) -> bool {
        self.is_open() && self.window.covers(t)
    }
}
