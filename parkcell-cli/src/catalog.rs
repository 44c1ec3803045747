use std::path::Path;

use serde::Deserialize;

use parkcell_core::client::ParkingClient;
use parkcell_core::infrastructure::CatalogStore;
use parkcell_core::types::{CellType, CellTypeId, CustomerRef, Lot};

use crate::BoxError;

/// Records owned by the surrounding system (lot management, vehicle
/// registry, billing) that the engine only reads. Loaded at startup so a
/// fresh store has something to reserve against.
#[derive(Debug, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub cell_types: Vec<CellType>,
    #[serde(default)]
    pub lots: Vec<Lot>,
    #[serde(default)]
    pub customers: Vec<CustomerRef>,
    #[serde(default)]
    pub vehicles: Vec<VehicleSeed>,
}

#[derive(Debug, Deserialize)]
pub struct VehicleSeed {
    pub plate: String,
    pub vehicle_type_id: CellTypeId,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CatalogSummary {
    pub lots: usize,
    pub vehicles_registered: usize,
    pub cells_created: usize,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, BoxError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Upserts every record, registers unknown plates and provisions each
    /// lot up to its capacity. Safe to apply again on restart.
    pub fn apply(&self, client: &mut ParkingClient) -> parkcell_core::Result<CatalogSummary> {
        let mut summary = CatalogSummary::default();
        let store = client.store_mut();

        for cell_type in &self.cell_types {
            store.put_cell_type(cell_type)?;
        }
        for lot in &self.lots {
            store.put_lot(lot)?;
        }
        for customer in &self.customers {
            store.put_customer(customer)?;
        }
        for vehicle in &self.vehicles {
            if store.find_vehicle_by_plate(&vehicle.plate)?.is_none() {
                store.register_vehicle(&vehicle.plate, vehicle.vehicle_type_id)?;
                summary.vehicles_registered += 1;
            }
        }

        for lot in &self.lots {
            summary.cells_created += client.ensure_lot_capacity(lot.id)?;
        }
        summary.lots = self.lots.len();

        tracing::info!(
            lots = summary.lots,
            vehicles = summary.vehicles_registered,
            cells = summary.cells_created,
            "📋 Catalog loaded"
        );
        Ok(summary)
    }
}
