//! Shared fixtures for the unit tests.

use crate::cells::CellStore;
use crate::infrastructure::CatalogStore;
use crate::infrastructure_in_memory::InMemoryParkingStore;
use crate::reservations::CreateReservation;
use crate::types::*;
use chrono::{Duration, TimeZone, Utc};

pub const LOT: LotId = 1;
pub const PARTICULAR: CellTypeId = 1;
pub const MOTO: CellTypeId = 2;

pub const ANA: CustomerId = 10;
pub const ANA_ALIAS: CustomerId = 11;
pub const LUIS: CustomerId = 12;

pub fn t0() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
}

pub fn minutes(m: i64) -> Duration {
    Duration::minutes(m)
}

pub fn hours(h: i64) -> Duration {
    Duration::hours(h)
}

pub struct Fixture {
    pub store: InMemoryParkingStore,
    /// Provisioned cells of `LOT`, all PARTICULAR and FREE
    pub cells: Vec<Cell>,
    /// AAA111 (PARTICULAR), BBB222 (PARTICULAR), CCC333 (MOTO)
    pub vehicles: Vec<Vehicle>,
}

impl Fixture {
    pub fn new(capacity: u32) -> Self {
        let mut store = InMemoryParkingStore::new();
        store
            .put_cell_type(&CellType { id: MOTO, name: "MOTO".into() })
            .unwrap();
        store
            .put_cell_type(&CellType { id: PARTICULAR, name: "PARTICULAR".into() })
            .unwrap();
        store
            .put_lot(&Lot {
                id: LOT,
                name: "Lot Norte".into(),
                capacity,
                owner_id: 1,
            })
            .unwrap();

        for (id, email) in [
            (ANA, "ana@example.com"),
            (ANA_ALIAS, "  ANA@Example.com "),
            (LUIS, "luis@example.com"),
        ] {
            store
                .put_customer(&CustomerRef {
                    id,
                    document_type: "CC".into(),
                    document_number: format!("100{}", id),
                    email: email.into(),
                })
                .unwrap();
        }

        let vehicles = vec![
            store.register_vehicle("aaa111", PARTICULAR).unwrap(),
            store.register_vehicle("BBB222", PARTICULAR).unwrap(),
            store.register_vehicle("CCC333", MOTO).unwrap(),
        ];

        CellStore::ensure_lot_capacity(&mut store, LOT, t0()).unwrap();
        let cells = CellStore::find_by_lot(&store, LOT).unwrap();

        Self {
            store,
            cells,
            vehicles,
        }
    }

    pub fn cell(&self, i: usize) -> String {
        self.cells[i].id.clone()
    }

    pub fn vehicle(&self, i: usize) -> VehicleId {
        self.vehicles[i].id
    }

    pub fn status_of(&self, i: usize) -> CellStatus {
        CellStore::find_by_id(&self.store, &self.cells[i].id)
            .unwrap()
            .status
    }
}

pub fn request(
    vehicle_id: VehicleId,
    cell_id: &str,
    start: Timestamp,
    end: Option<Timestamp>,
) -> CreateReservation {
    CreateReservation {
        vehicle_id,
        cell_id: cell_id.to_string(),
        customer_id: None,
        start: Some(start),
        end,
    }
}
