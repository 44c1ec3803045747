use crate::error::{ParkingError, Result};
use crate::infrastructure::{in_transaction, ParkingStore};
use crate::types::{
    new_id, to_store_precision, Cell, CellStatus, CellType, LotAvailability, Lot, LotId, Sensor, Timestamp,
};
use tracing::{debug, info};

/// Cell type names preferred when provisioning filler cells, in order.
pub const DEFAULT_CELL_TYPE_NAMES: &[&str] = &["PARTICULAR", "STANDARD"];

/// Owns cell records and their FREE/OCCUPIED status.
pub struct CellStore;

impl CellStore {
    pub fn find_by_id<S: ParkingStore + ?Sized>(store: &S, cell_id: &str) -> Result<Cell> {
        store
            .get_cell(cell_id)?
            .ok_or_else(|| ParkingError::NotFound(format!("cell {} does not exist", cell_id)))
    }

    pub fn find_by_lot<S: ParkingStore + ?Sized>(store: &S, lot_id: LotId) -> Result<Vec<Cell>> {
        store.find_cells(lot_id)
    }

    pub fn count_free<S: ParkingStore + ?Sized>(store: &S, lot_id: LotId) -> Result<usize> {
        store.count_cells(lot_id, Some(CellStatus::Free))
    }

    /// Moves a cell to `status`. Returns `false` without writing when the
    /// cell is already there, so repeated calls are no-ops.
    pub fn set_status<S: ParkingStore + ?Sized>(
        store: &mut S,
        cell_id: &str,
        status: CellStatus,
        now: Timestamp,
    ) -> Result<bool> {
        let mut cell = Self::find_by_id(store, cell_id)?;
        if cell.status == status {
            return Ok(false);
        }

        let previous = cell.status;
        cell.status = status;
        cell.last_status_change = to_store_precision(now);
        store.update_cell(&cell)?;

        debug!(cell_id = %cell.id, from = %previous, to = %status, "Cell status changed");
        Ok(true)
    }

    /// Resolves the type used for filler cells: a preferred name if one
    /// exists, otherwise the lowest id.
    pub fn default_cell_type<S: ParkingStore + ?Sized>(store: &S) -> Result<CellType> {
        let types = store.list_cell_types()?;

        for preferred in DEFAULT_CELL_TYPE_NAMES {
            if let Some(t) = types.iter().find(|t| t.name.eq_ignore_ascii_case(preferred)) {
                return Ok(t.clone());
            }
        }

        types.into_iter().min_by_key(|t| t.id).ok_or_else(|| {
            ParkingError::Configuration(
                "no cell type exists to provision lot capacity".to_string(),
            )
        })
    }

    /// Provisions FREE cells until the lot holds `capacity` of them. Never
    /// removes cells. Returns the number created.
    ///
    /// The count and the inserts share one transaction, so two hosts on the
    /// same store cannot both provision the same gap.
    pub fn ensure_capacity<S: ParkingStore + ?Sized>(
        store: &mut S,
        lot: &Lot,
        now: Timestamp,
    ) -> Result<usize> {
        let capacity = lot.capacity as usize;
        if capacity == 0 {
            return Ok(0);
        }
        let now = to_store_precision(now);

        let provisioned = in_transaction(store, |s| {
            let existing = s.count_cells(lot.id, None)?;
            if existing >= capacity {
                return Ok(None);
            }

            let cell_type = Self::default_cell_type(s)?;
            for ordinal in existing + 1..=capacity {
                let sensor = Sensor {
                    id: new_id("sen"),
                    description: format!("Sensor {}-{}", lot.id, ordinal),
                };
                s.insert_sensor(&sensor)?;

                s.insert_cell(&Cell {
                    id: new_id("cell"),
                    lot_id: lot.id,
                    cell_type_id: cell_type.id,
                    sensor_id: sensor.id,
                    status: CellStatus::Free,
                    last_status_change: now,
                })?;
            }
            Ok(Some((capacity - existing, cell_type)))
        })?;

        let Some((created, cell_type)) = provisioned else {
            return Ok(0);
        };
        info!(
            lot_id = lot.id,
            created,
            capacity,
            cell_type = %cell_type.name,
            "Provisioned cells up to lot capacity"
        );
        Ok(created)
    }

    pub fn ensure_lot_capacity<S: ParkingStore + ?Sized>(
        store: &mut S,
        lot_id: LotId,
        now: Timestamp,
    ) -> Result<usize> {
        let lot = store
            .get_lot(lot_id)?
            .ok_or_else(|| ParkingError::NotFound(format!("lot {} does not exist", lot_id)))?;
        Self::ensure_capacity(store, &lot, now)
    }

    /// Free-cell count per lot, provisioning each lot first.
    pub fn lot_availability<S: ParkingStore + ?Sized>(
        store: &mut S,
        now: Timestamp,
    ) -> Result<Vec<LotAvailability>> {
        let mut availability = Vec::new();
        for lot in store.list_lots()? {
            Self::ensure_capacity(store, &lot, now)?;
            let free_cells = Self::count_free(store, lot.id)?;
            availability.push(LotAvailability { lot, free_cells });
        }
        Ok(availability)
    }
}
