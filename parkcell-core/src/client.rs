//! High-level client that wraps the engine + pluggable storage.
//! The HTTP host and the reconciliation loop both go through this.

use crate::cells::CellStore;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::infrastructure::ParkingStore;
use crate::infrastructure_in_memory::InMemoryParkingStore;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::reservations::{CreateReservation, CustomerReservation, ReservationManager};
use crate::types::*;
use std::sync::Arc;

/// Owns the store and the clock. All reservation and cell mutation goes
/// through here; wrap it in a mutex to share it.
pub struct ParkingClient {
    store: Box<dyn ParkingStore + Send>,
    clock: Arc<dyn Clock>,
}

impl ParkingClient {
    /// Create a new client with an empty in-memory store.
    pub fn new() -> Self {
        Self::with_store(Box::new(InMemoryParkingStore::new()))
    }

    pub fn with_store(store: Box<dyn ParkingStore + Send>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Create a new client backed by SQLite at the given path.
    #[cfg(feature = "sqlite")]
    pub fn with_sqlite(path: &str) -> Result<Self> {
        let store = crate::infrastructure_sqlite::SqliteParkingStore::open(path)?;
        Ok(Self::with_store(Box::new(store)))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.set_clock(clock);
        self
    }

    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Direct store access for loading catalog records (lots, cell types,
    /// customers, vehicles).
    pub fn store_mut(&mut self) -> &mut (dyn ParkingStore + Send + 'static) {
        self.store.as_mut()
    }

    // ─── Reservations ───────────────────────────────────────────────────────

    pub fn create_reservation(&mut self, request: &CreateReservation) -> Result<Reservation> {
        let now = self.now();
        ReservationManager::create(self.store.as_mut(), request, now)
    }

    pub fn create_reservation_for_customer(
        &mut self,
        request: &CustomerReservation,
    ) -> Result<Reservation> {
        let now = self.now();
        ReservationManager::create_for_customer(self.store.as_mut(), request, now)
    }

    pub fn close_reservation(&mut self, reservation_id: &str) -> Result<Reservation> {
        let now = self.now();
        ReservationManager::close(self.store.as_mut(), reservation_id, now)
    }

    pub fn get_reservation(&self, reservation_id: &str) -> Result<Reservation> {
        ReservationManager::find_by_id(self.store.as_ref(), reservation_id)
    }

    pub fn list_active_reservations(&mut self) -> Result<Vec<Reservation>> {
        let now = self.now();
        ReservationManager::find_active(self.store.as_mut(), now)
    }

    pub fn list_reservations_by_lot(&mut self, lot_id: LotId) -> Result<Vec<Reservation>> {
        let now = self.now();
        ReservationManager::find_by_lot(self.store.as_mut(), lot_id, now)
    }

    pub fn list_reservations_by_customer(&mut self, customer_id: CustomerId) -> Result<Vec<Reservation>> {
        let now = self.now();
        ReservationManager::find_by_customer(self.store.as_mut(), customer_id, now)
    }

    pub fn list_reservations_by_customer_or_email(
        &mut self,
        customer_id: CustomerId,
        email: &str,
    ) -> Result<Vec<Reservation>> {
        let now = self.now();
        ReservationManager::find_by_customer_or_email(self.store.as_mut(), customer_id, email, now)
    }

    pub fn list_vehicles_by_customer_or_email(
        &mut self,
        customer_id: CustomerId,
        email: &str,
    ) -> Result<Vec<Vehicle>> {
        let now = self.now();
        ReservationManager::vehicles_by_customer_or_email(self.store.as_mut(), customer_id, email, now)
    }

    // ─── Cells & lots ───────────────────────────────────────────────────────

    /// Returns the number of cells created.
    pub fn ensure_lot_capacity(&mut self, lot_id: LotId) -> Result<usize> {
        let now = self.now();
        CellStore::ensure_lot_capacity(self.store.as_mut(), lot_id, now)
    }

    pub fn get_cell(&self, cell_id: &str) -> Result<Cell> {
        CellStore::find_by_id(self.store.as_ref(), cell_id)
    }

    pub fn list_cells(&self, lot_id: LotId) -> Result<Vec<Cell>> {
        CellStore::find_by_lot(self.store.as_ref(), lot_id)
    }

    /// Operator override of a cell's status from its textual form.
    pub fn set_cell_status(&mut self, cell_id: &str, status: &str) -> Result<Cell> {
        let status: CellStatus = status.parse()?;
        let now = self.now();
        CellStore::set_status(self.store.as_mut(), cell_id, status, now)?;
        CellStore::find_by_id(self.store.as_ref(), cell_id)
    }

    pub fn lot_availability(&mut self) -> Result<Vec<LotAvailability>> {
        let now = self.now();
        CellStore::lot_availability(self.store.as_mut(), now)
    }

    // ─── Reconciliation ─────────────────────────────────────────────────────

    pub fn reconcile(&mut self) -> Result<ReconcileReport> {
        let now = self.now();
        Reconciler::run_pass(self.store.as_mut(), now)
    }
}

impl Default for ParkingClient {
    fn default() -> Self {
        Self::new()
    }
}
