use serde::{Deserialize, Serialize};

use super::{CellId, CellStatus, CellTypeId, LotId, SensorId, Timestamp};

/// A collection of cells under one capacity declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lot {
    pub id: LotId,
    pub name: String,
    /// Declared total number of cells
    pub capacity: u32,
    /// Owning company
    pub owner_id: u64,
}

/// Tenant class of a cell (PARTICULAR, MOTO, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellType {
    pub id: CellTypeId,
    pub name: String,
}

/// Occupancy sensor bound to a single cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub description: String,
}

/// A single physical parking space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub id: CellId,
    pub lot_id: LotId,
    pub cell_type_id: CellTypeId,
    pub sensor_id: SensorId,
    pub status: CellStatus,
    pub last_status_change: Timestamp,
}

impl Cell {
    pub fn is_free(&self) -> bool {
        self.status == CellStatus::Free
    }
}

/// Free-cell count for one lot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotAvailability {
    #[serde(flatten)]
    pub lot: Lot,
    pub free_cells: usize,
}
