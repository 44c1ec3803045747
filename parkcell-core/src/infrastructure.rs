use crate::error::Result;
use crate::types::{
    Cell, CellStatus, CellType, CellTypeId, CustomerId, CustomerRef, Lot, LotId, Reservation,
    ReservationStatus, Sensor, Timestamp, Vehicle, VehicleId, Window,
};
use tracing::warn;

/// Time-based condition on a reservation window.
///
/// Every overlap, coverage and expiry question the engine asks goes through
/// [`TemporalPredicate::matches`], so the interval semantics are identical for
/// vehicle, customer and cell scopes and across storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporalPredicate {
    /// The window covers the instant
    CoversAt(Timestamp),
    /// The window intersects the candidate window
    Overlaps(Window),
    /// The window is bounded and its end is at or before the instant
    EndedBy(Timestamp),
}

impl TemporalPredicate {
    pub fn matches(&self, window: &Window) -> bool {
        match self {
            TemporalPredicate::CoversAt(t) => window.covers(*t),
            TemporalPredicate::Overlaps(candidate) => window.intersects(candidate),
            TemporalPredicate::EndedBy(t) => window.has_ended_by(*t),
        }
    }
}

/// Query over reservations. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReservationFilter {
    pub status: Option<ReservationStatus>,
    pub vehicle_id: Option<VehicleId>,
    /// Restricts to these cells; an empty list matches nothing
    pub cell_ids: Option<Vec<String>>,
    /// Restricts to these billing references; an empty list matches nothing
    pub customer_ids: Option<Vec<CustomerId>>,
    pub temporal: Option<TemporalPredicate>,
}

impl ReservationFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn open() -> Self {
        Self {
            status: Some(ReservationStatus::Open),
            ..Self::default()
        }
    }

    pub fn for_vehicle(mut self, vehicle_id: VehicleId) -> Self {
        self.vehicle_id = Some(vehicle_id);
        self
    }

    pub fn on_cells(mut self, cell_ids: Vec<String>) -> Self {
        self.cell_ids = Some(cell_ids);
        self
    }

    pub fn for_customers(mut self, customer_ids: Vec<CustomerId>) -> Self {
        self.customer_ids = Some(customer_ids);
        self
    }

    pub fn when(mut self, predicate: TemporalPredicate) -> Self {
        self.temporal = Some(predicate);
        self
    }

    /// True when the filter can never match (an empty id restriction).
    pub fn is_empty_selection(&self) -> bool {
        self.cell_ids.as_ref().is_some_and(Vec::is_empty)
            || self.customer_ids.as_ref().is_some_and(Vec::is_empty)
    }

    /// The authoritative match. Backends may pre-narrow with an index or
    /// SQL, but must pass every candidate through here.
    pub fn matches(&self, reservation: &Reservation) -> bool {
        if self.status.is_some_and(|s| s != reservation.status) {
            return false;
        }
        if self.vehicle_id.is_some_and(|v| v != reservation.vehicle_id) {
            return false;
        }
        if let Some(cells) = &self.cell_ids {
            if !cells.contains(&reservation.cell_id) {
                return false;
            }
        }
        if let Some(customers) = &self.customer_ids {
            match reservation.customer_id {
                Some(id) if customers.contains(&id) => {}
                _ => return false,
            }
        }
        self.temporal
            .is_none_or(|predicate| predicate.matches(&reservation.window))
    }
}

/// Records owned by external collaborators (lot management, vehicle
/// registry, billing). The engine reads them and only ever creates vehicles.
pub trait CatalogStore {
    fn put_lot(&mut self, lot: &Lot) -> Result<()>;
    fn get_lot(&self, id: LotId) -> Result<Option<Lot>>;
    fn list_lots(&self) -> Result<Vec<Lot>>;

    fn put_cell_type(&mut self, cell_type: &CellType) -> Result<()>;
    /// All cell types, ascending by id
    fn list_cell_types(&self) -> Result<Vec<CellType>>;

    /// Registers a new vehicle under a normalized plate
    fn register_vehicle(&mut self, plate: &str, vehicle_type_id: CellTypeId) -> Result<Vehicle>;
    fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>>;
    fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>>;

    fn put_customer(&mut self, customer: &CustomerRef) -> Result<()>;
    fn get_customer(&self, id: CustomerId) -> Result<Option<CustomerRef>>;
    /// Customers whose normalized email equals the normalized argument
    fn find_customers_by_email(&self, email: &str) -> Result<Vec<CustomerRef>>;
}

/// Defines the contract for the transactional cell/reservation backend.
pub trait ParkingStore: CatalogStore {
    /// Opens a transaction. Writes until `commit` are serialized against
    /// other writers of the same store.
    fn begin(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()>;
    fn update_reservation(&mut self, reservation: &Reservation) -> Result<()>;
    fn get_reservation(&self, id: &str) -> Result<Option<Reservation>>;
    /// Matching reservations ordered by `start` descending
    fn find_reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>>;

    fn insert_sensor(&mut self, sensor: &Sensor) -> Result<()>;
    fn insert_cell(&mut self, cell: &Cell) -> Result<()>;
    fn update_cell(&mut self, cell: &Cell) -> Result<()>;
    fn get_cell(&self, id: &str) -> Result<Option<Cell>>;
    /// Cells of a lot in provisioning order
    fn find_cells(&self, lot_id: LotId) -> Result<Vec<Cell>>;
    fn count_cells(&self, lot_id: LotId, status: Option<CellStatus>) -> Result<usize>;
}

/// Runs `f` inside a store transaction, rolling back on error.
pub fn in_transaction<S, T, F>(store: &mut S, f: F) -> Result<T>
where
    S: ParkingStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    store.begin()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e)
        }
    }
}
