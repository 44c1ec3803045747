use crate::error::{ParkingError, Result};
use crate::infrastructure::{CatalogStore, ParkingStore, ReservationFilter};
use crate::types::{
    normalize_email, normalize_plate, Cell, CellStatus, CellType, CellTypeId, CustomerId,
    CustomerRef, Lot, LotId, Reservation, Sensor, Vehicle, VehicleId,
};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct Tables {
    lots: BTreeMap<LotId, Lot>,
    cell_types: BTreeMap<CellTypeId, CellType>,
    vehicles: BTreeMap<VehicleId, Vehicle>,
    customers: BTreeMap<CustomerId, CustomerRef>,
    sensors: Vec<Sensor>,
    // Provisioning order matters for cell selection
    cells: Vec<Cell>,
    reservations: Vec<Reservation>,
}

/// Process-local store. Transactions snapshot the tables on `begin` and
/// restore them on `rollback`; exclusivity comes from `&mut self`.
#[derive(Debug, Default)]
pub struct InMemoryParkingStore {
    tables: Tables,
    snapshot: Option<Tables>,
}

impl InMemoryParkingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_open_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Sensor placeholders in creation order
    pub fn sensors(&self) -> &[Sensor] {
        &self.tables.sensors
    }
}

impl CatalogStore for InMemoryParkingStore {
    fn put_lot(&mut self, lot: &Lot) -> Result<()> {
        self.tables.lots.insert(lot.id, lot.clone());
        Ok(())
    }

    fn get_lot(&self, id: LotId) -> Result<Option<Lot>> {
        Ok(self.tables.lots.get(&id).cloned())
    }

    fn list_lots(&self) -> Result<Vec<Lot>> {
        Ok(self.tables.lots.values().cloned().collect())
    }

    fn put_cell_type(&mut self, cell_type: &CellType) -> Result<()> {
        self.tables.cell_types.insert(cell_type.id, cell_type.clone());
        Ok(())
    }

    fn list_cell_types(&self) -> Result<Vec<CellType>> {
        Ok(self.tables.cell_types.values().cloned().collect())
    }

    fn register_vehicle(&mut self, plate: &str, vehicle_type_id: CellTypeId) -> Result<Vehicle> {
        let plate = normalize_plate(plate);
        if self.tables.vehicles.values().any(|v| v.plate == plate) {
            return Err(ParkingError::Conflict(format!(
                "plate {} is already registered",
                plate
            )));
        }
        let id = self.tables.vehicles.keys().next_back().map_or(1, |last| last + 1);
        let vehicle = Vehicle {
            id,
            plate,
            vehicle_type_id,
        };
        self.tables.vehicles.insert(id, vehicle.clone());
        Ok(vehicle)
    }

    fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        Ok(self.tables.vehicles.get(&id).cloned())
    }

    fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        let plate = normalize_plate(plate);
        Ok(self
            .tables
            .vehicles
            .values()
            .find(|v| v.plate == plate)
            .cloned())
    }

    fn put_customer(&mut self, customer: &CustomerRef) -> Result<()> {
        self.tables.customers.insert(customer.id, customer.clone());
        Ok(())
    }

    fn get_customer(&self, id: CustomerId) -> Result<Option<CustomerRef>> {
        Ok(self.tables.customers.get(&id).cloned())
    }

    fn find_customers_by_email(&self, email: &str) -> Result<Vec<CustomerRef>> {
        let email = normalize_email(email);
        Ok(self
            .tables
            .customers
            .values()
            .filter(|c| normalize_email(&c.email) == email)
            .cloned()
            .collect())
    }
}

impl ParkingStore for InMemoryParkingStore {
    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            return Err(ParkingError::Storage("transaction already open".into()));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(ParkingError::Storage("no open transaction to commit".into())),
        }
    }

    fn rollback(&mut self) -> Result<()> {
        match self.snapshot.take() {
            Some(tables) => {
                self.tables = tables;
                Ok(())
            }
            None => Err(ParkingError::Storage("no open transaction to roll back".into())),
        }
    }

    fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        if self.tables.reservations.iter().any(|r| r.id == reservation.id) {
            return Err(ParkingError::Storage(format!(
                "duplicate reservation id {}",
                reservation.id
            )));
        }
        self.tables.reservations.push(reservation.clone());
        Ok(())
    }

    fn update_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        match self
            .tables
            .reservations
            .iter_mut()
            .find(|r| r.id == reservation.id)
        {
            Some(existing) => {
                *existing = reservation.clone();
                Ok(())
            }
            None => Err(ParkingError::NotFound(format!(
                "reservation {}",
                reservation.id
            ))),
        }
    }

    fn get_reservation(&self, id: &str) -> Result<Option<Reservation>> {
        Ok(self.tables.reservations.iter().find(|r| r.id == id).cloned())
    }

    fn find_reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>> {
        let mut found: Vec<Reservation> = self
            .tables
            .reservations
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.window.start.cmp(&a.window.start));
        Ok(found)
    }

    fn insert_sensor(&mut self, sensor: &Sensor) -> Result<()> {
        self.tables.sensors.push(sensor.clone());
        Ok(())
    }

    fn insert_cell(&mut self, cell: &Cell) -> Result<()> {
        if self.tables.cells.iter().any(|c| c.id == cell.id) {
            return Err(ParkingError::Storage(format!("duplicate cell id {}", cell.id)));
        }
        self.tables.cells.push(cell.clone());
        Ok(())
    }

    fn update_cell(&mut self, cell: &Cell) -> Result<()> {
        match self.tables.cells.iter_mut().find(|c| c.id == cell.id) {
            Some(existing) => {
                *existing = cell.clone();
                Ok(())
            }
            None => Err(ParkingError::NotFound(format!("cell {}", cell.id))),
        }
    }

    fn get_cell(&self, id: &str) -> Result<Option<Cell>> {
        Ok(self.tables.cells.iter().find(|c| c.id == id).cloned())
    }

    fn find_cells(&self, lot_id: LotId) -> Result<Vec<Cell>> {
        Ok(self
            .tables
            .cells
            .iter()
            .filter(|c| c.lot_id == lot_id)
            .cloned()
            .collect())
    }

    fn count_cells(&self, lot_id: LotId, status: Option<CellStatus>) -> Result<usize> {
        Ok(self
            .tables
            .cells
            .iter()
            .filter(|c| c.lot_id == lot_id && status.is_none_or(|s| s == c.status))
            .count())
    }
}
