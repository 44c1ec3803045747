#[cfg(test)]
mod tests {
    use crate::error::ParkingError;
    use crate::infrastructure::{
        in_transaction, CatalogStore, ParkingStore, ReservationFilter, TemporalPredicate,
    };
    use crate::infrastructure_in_memory::InMemoryParkingStore;
    use crate::test_support::{hours, minutes, t0, LOT, PARTICULAR};
    use crate::types::*;

    fn reservation(vehicle_id: VehicleId, cell_id: &str, customer_id: Option<CustomerId>, window: Window) -> Reservation {
        Reservation::open(new_id("rsv"), vehicle_id, cell_id.to_string(), customer_id, window)
    }

    fn cell(sensor_id: &str) -> Cell {
        Cell {
            id: new_id("cell"),
            lot_id: LOT,
            cell_type_id: PARTICULAR,
            sensor_id: sensor_id.to_string(),
            status: CellStatus::Free,
            last_status_change: t0(),
        }
    }

    fn insert_cell<S: ParkingStore + ?Sized>(store: &mut S) -> Cell {
        let sensor = Sensor {
            id: new_id("sen"),
            description: "Sensor 1-1".into(),
        };
        store.insert_sensor(&sensor).unwrap();
        let cell = cell(&sensor.id);
        store.insert_cell(&cell).unwrap();
        cell
    }

    // Backend-agnostic checks, run against every store.

    fn check_catalog<S: ParkingStore>(store: &mut S) {
        store
            .put_cell_type(&CellType { id: 7, name: "MOTO".into() })
            .unwrap();
        store
            .put_cell_type(&CellType { id: PARTICULAR, name: "PARTICULAR".into() })
            .unwrap();
        let ids: Vec<_> = store.list_cell_types().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![PARTICULAR, 7]);

        let v = store.register_vehicle(" abc123 ", PARTICULAR).unwrap();
        assert_eq!(v.plate, "ABC123");
        assert_eq!(store.find_vehicle_by_plate("abc123").unwrap(), Some(v.clone()));
        assert_eq!(store.get_vehicle(v.id).unwrap(), Some(v.clone()));
        assert!(matches!(
            store.register_vehicle("ABC123", PARTICULAR),
            Err(ParkingError::Conflict(_))
        ));
        let other = store.register_vehicle("XYZ999", 7).unwrap();
        assert_ne!(other.id, v.id);

        for (id, email) in [(1, "Ana@Example.com"), (2, " ana@example.com"), (3, "luis@example.com")] {
            store
                .put_customer(&CustomerRef {
                    id,
                    document_type: "CC".into(),
                    document_number: id.to_string(),
                    email: email.into(),
                })
                .unwrap();
        }
        let ids: Vec<_> = store
            .find_customers_by_email("ANA@EXAMPLE.COM  ")
            .unwrap()
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(store.get_customer(99).unwrap().is_none());
    }

    fn check_reservations<S: ParkingStore>(store: &mut S) {
        let a = insert_cell(store);
        let b = insert_cell(store);

        let early = reservation(1, &a.id, Some(10), Window::new(t0(), Some(t0() + hours(1))).unwrap());
        let late = reservation(2, &b.id, None, Window::open_ended(t0() + hours(2)));
        let mut closed = reservation(1, &b.id, Some(11), Window::new(t0() - hours(3), Some(t0() - hours(2))).unwrap());
        closed.status = ReservationStatus::Closed;
        for r in [&early, &late, &closed] {
            store.insert_reservation(r).unwrap();
        }
        assert!(store.insert_reservation(&early).is_err());

        // Newest start first
        let all = store.find_reservations(&ReservationFilter::any()).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec![late.id.as_str(), early.id.as_str(), closed.id.as_str()]);

        let open = store.find_reservations(&ReservationFilter::open()).unwrap();
        assert_eq!(open.len(), 2);

        let by_vehicle = store.find_reservations(&ReservationFilter::any().for_vehicle(1)).unwrap();
        assert_eq!(by_vehicle.len(), 2);

        let on_b = store
            .find_reservations(&ReservationFilter::open().on_cells(vec![b.id.clone()]))
            .unwrap();
        assert_eq!(on_b, vec![late.clone()]);

        let billed = store
            .find_reservations(&ReservationFilter::any().for_customers(vec![10, 11]))
            .unwrap();
        assert_eq!(billed.len(), 2);

        assert!(store
            .find_reservations(&ReservationFilter::any().on_cells(Vec::new()))
            .unwrap()
            .is_empty());

        let covering = store
            .find_reservations(&ReservationFilter::open().when(TemporalPredicate::CoversAt(t0() + minutes(30))))
            .unwrap();
        assert_eq!(covering, vec![early.clone()]);

        let expired = store
            .find_reservations(&ReservationFilter::open().when(TemporalPredicate::EndedBy(t0() + hours(1))))
            .unwrap();
        assert_eq!(expired, vec![early.clone()]);

        let overlapping = store
            .find_reservations(&ReservationFilter::open().when(TemporalPredicate::Overlaps(
                Window::new(t0() + minutes(59), Some(t0() + hours(3))).unwrap(),
            )))
            .unwrap();
        assert_eq!(overlapping.len(), 2);

        let mut updated = early.clone();
        updated.status = ReservationStatus::Closed;
        updated.window.end = Some(t0() + minutes(40));
        store.update_reservation(&updated).unwrap();
        assert_eq!(store.get_reservation(&early.id).unwrap(), Some(updated));

        let ghost = reservation(9, &a.id, None, Window::open_ended(t0()));
        assert!(matches!(store.update_reservation(&ghost), Err(ParkingError::NotFound(_))));
    }

    fn check_cells<S: ParkingStore>(store: &mut S) {
        let first = insert_cell(store);
        let second = insert_cell(store);
        let third = insert_cell(store);

        let order: Vec<_> = store.find_cells(LOT).unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(order, vec![first.id.clone(), second.id.clone(), third.id.clone()]);
        assert!(store.find_cells(LOT + 1).unwrap().is_empty());

        let mut occupied = second.clone();
        occupied.status = CellStatus::Occupied;
        occupied.last_status_change = t0() + minutes(5);
        store.update_cell(&occupied).unwrap();
        assert_eq!(store.get_cell(&second.id).unwrap(), Some(occupied));

        assert_eq!(store.count_cells(LOT, None).unwrap(), 3);
        assert_eq!(store.count_cells(LOT, Some(CellStatus::Free)).unwrap(), 2);
        assert_eq!(store.count_cells(LOT, Some(CellStatus::Occupied)).unwrap(), 1);

        let missing = cell(&first.sensor_id);
        assert!(matches!(store.update_cell(&missing), Err(ParkingError::NotFound(_))));
    }

    fn check_rollback<S: ParkingStore>(store: &mut S) {
        let kept = insert_cell(store);

        let result: crate::Result<()> = in_transaction(store, |s| {
            let mut cell = kept.clone();
            cell.status = CellStatus::Occupied;
            s.update_cell(&cell)?;
            s.insert_reservation(&reservation(1, &kept.id, None, Window::open_ended(t0())))?;
            Err(ParkingError::Conflict("rejected".into()))
        });
        assert!(matches!(result, Err(ParkingError::Conflict(_))));
        assert_eq!(store.get_cell(&kept.id).unwrap().unwrap().status, CellStatus::Free);
        assert!(store.find_reservations(&ReservationFilter::any()).unwrap().is_empty());

        let r = in_transaction(store, |s| {
            let r = reservation(1, &kept.id, None, Window::open_ended(t0()));
            s.insert_reservation(&r)?;
            Ok(r)
        })
        .unwrap();
        assert_eq!(store.get_reservation(&r.id).unwrap(), Some(r));
    }

    // ─── In-memory ──────────────────────────────────────────────────────────

    #[test]
    fn test_in_memory_catalog() {
        check_catalog(&mut InMemoryParkingStore::new());
    }

    #[test]
    fn test_in_memory_reservations() {
        check_reservations(&mut InMemoryParkingStore::new());
    }

    #[test]
    fn test_in_memory_cells() {
        check_cells(&mut InMemoryParkingStore::new());
    }

    #[test]
    fn test_in_memory_rollback() {
        let mut store = InMemoryParkingStore::new();
        check_rollback(&mut store);
        assert!(!store.has_open_transaction());
    }

    #[test]
    fn test_in_memory_transaction_misuse() {
        let mut store = InMemoryParkingStore::new();
        assert!(matches!(store.commit(), Err(ParkingError::Storage(_))));
        assert!(matches!(store.rollback(), Err(ParkingError::Storage(_))));

        store.begin().unwrap();
        assert!(matches!(store.begin(), Err(ParkingError::Storage(_))));
        store.commit().unwrap();
        assert!(!store.has_open_transaction());
    }

    #[test]
    fn test_filter_matches_half_open_windows() {
        let r = reservation(1, "cell_a", Some(10), Window::new(t0(), Some(t0() + hours(1))).unwrap());

        assert!(ReservationFilter::open().when(TemporalPredicate::CoversAt(t0())).matches(&r));
        assert!(!ReservationFilter::open()
            .when(TemporalPredicate::CoversAt(t0() + hours(1)))
            .matches(&r));
        assert!(ReservationFilter::any()
            .when(TemporalPredicate::EndedBy(t0() + hours(1)))
            .matches(&r));
        assert!(!ReservationFilter::any()
            .when(TemporalPredicate::EndedBy(t0() + minutes(59)))
            .matches(&r));

        let open_ended = reservation(1, "cell_a", None, Window::open_ended(t0()));
        assert!(!ReservationFilter::any()
            .when(TemporalPredicate::EndedBy(t0() + hours(1000)))
            .matches(&open_ended));
        assert!(!ReservationFilter::any().for_customers(vec![10]).matches(&open_ended));

        let scope = ReservationFilter::any().on_cells(Vec::new());
        assert!(scope.is_empty_selection());
        assert!(!scope.matches(&r));
    }

    // ─── SQLite ─────────────────────────────────────────────────────────────

    #[cfg(feature = "sqlite")]
    mod sqlite {
        use super::*;
        use crate::cells::CellStore;
        use crate::infrastructure_sqlite::SqliteParkingStore;
        use crate::reconcile::Reconciler;
        use crate::reservations::{CreateReservation, ReservationManager};
        use crate::test_support::request;
        use std::sync::{Arc, Barrier};

        fn open() -> SqliteParkingStore {
            SqliteParkingStore::open(":memory:").unwrap()
        }

        fn temp_path() -> String {
            std::env::temp_dir()
                .join(format!("{}.db", new_id("parkcell")))
                .to_string_lossy()
                .to_string()
        }

        fn remove_db(path: &str) {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{}", path, suffix));
            }
        }

        fn seed_lot(store: &mut SqliteParkingStore, capacity: u32) {
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
        }

        #[test]
        fn test_sqlite_catalog() {
            check_catalog(&mut open());
        }

        #[test]
        fn test_sqlite_reservations() {
            check_reservations(&mut open());
        }

        #[test]
        fn test_sqlite_cells() {
            check_cells(&mut open());
        }

        #[test]
        fn test_sqlite_rollback() {
            check_rollback(&mut open());
        }

        #[test]
        fn test_sqlite_lots_round_trip() {
            let mut store = open();
            let lot = Lot {
                id: LOT,
                name: "Lot Norte".into(),
                capacity: 12,
                owner_id: 3,
            };
            store.put_lot(&lot).unwrap();
            assert_eq!(store.get_lot(LOT).unwrap(), Some(lot.clone()));
            assert_eq!(store.list_lots().unwrap(), vec![lot]);
        }

        #[test]
        fn test_sqlite_persists_across_connections() {
            let path = temp_path();

            let cell_id = {
                let mut store = SqliteParkingStore::open(&path).unwrap();
                insert_cell(&mut store).id
            };
            let store = SqliteParkingStore::open(&path).unwrap();
            assert!(store.get_cell(&cell_id).unwrap().is_some());

            drop(store);
            remove_db(&path);
        }

        #[test]
        fn test_sqlite_sub_millisecond_instants_read_back_as_written() {
            let mut store = open();
            seed_lot(&mut store, 1);
            CellStore::ensure_lot_capacity(&mut store, LOT, t0()).unwrap();
            let cell_id = store.find_cells(LOT).unwrap()[0].id.clone();
            let vehicle = store.register_vehicle("AAA111", PARTICULAR).unwrap().id;
            let micros = chrono::Duration::microseconds;
            let now = t0() + chrono::Duration::nanoseconds(123_456_789);

            let err = ReservationManager::create(
                &mut store,
                &request(vehicle, &cell_id, t0() + micros(100), Some(t0() + micros(600))),
                now,
            )
            .unwrap_err();
            assert!(matches!(err, ParkingError::InvalidInput(_)));

            let created = ReservationManager::create(
                &mut store,
                &CreateReservation {
                    vehicle_id: vehicle,
                    cell_id: cell_id.clone(),
                    customer_id: None,
                    start: None,
                    end: Some(now + micros(1_500)),
                },
                now,
            )
            .unwrap();
            assert_eq!(created.window.start, t0() + chrono::Duration::milliseconds(123));
            assert!(created.window.end.unwrap() > created.window.start);
            assert_eq!(store.get_reservation(&created.id).unwrap(), Some(created.clone()));

            let cell = store.get_cell(&cell_id).unwrap().unwrap();
            assert_eq!(cell.status, CellStatus::Occupied);
            assert_eq!(cell.last_status_change, created.window.start);

            let closed = ReservationManager::close(&mut store, &created.id, now + micros(300)).unwrap();
            assert_eq!(closed.status, ReservationStatus::Closed);
            assert_eq!(store.get_reservation(&closed.id).unwrap(), Some(closed));
        }

        #[test]
        fn test_sqlite_reservation_lifecycle() {
            let mut store = open();
            seed_lot(&mut store, 2);
            CellStore::ensure_lot_capacity(&mut store, LOT, t0()).unwrap();
            let cells: Vec<_> = store.find_cells(LOT).unwrap().into_iter().map(|c| c.id).collect();
            let a = store.register_vehicle("AAA111", PARTICULAR).unwrap().id;
            let b = store.register_vehicle("BBB222", PARTICULAR).unwrap().id;

            let early = ReservationManager::create(
                &mut store,
                &request(a, &cells[0], t0(), Some(t0() + hours(2))),
                t0(),
            )
            .unwrap();
            let expiring = ReservationManager::create(
                &mut store,
                &request(b, &cells[1], t0(), Some(t0() + minutes(30))),
                t0(),
            )
            .unwrap();
            assert_eq!(store.count_cells(LOT, Some(CellStatus::Free)).unwrap(), 0);

            let closed = ReservationManager::close(&mut store, &early.id, t0() + minutes(10)).unwrap();
            assert_eq!(closed.window.end, Some(t0() + minutes(10)));
            assert_eq!(store.get_cell(&cells[0]).unwrap().unwrap().status, CellStatus::Free);

            let report = Reconciler::run_pass(&mut store, t0() + hours(1)).unwrap();
            assert_eq!(report.closed, 1);
            assert_eq!(report.failures, 0);
            assert_eq!(
                store.get_reservation(&expiring.id).unwrap().unwrap().status,
                ReservationStatus::Closed
            );
            assert_eq!(store.count_cells(LOT, Some(CellStatus::Free)).unwrap(), 2);
        }

        #[test]
        fn test_sqlite_concurrent_creators_on_one_cell() {
            const ROUNDS: usize = 20;
            let path = temp_path();
            let (cell_id, vehicles) = {
                let mut store = SqliteParkingStore::open(&path).unwrap();
                seed_lot(&mut store, 1);
                CellStore::ensure_lot_capacity(&mut store, LOT, t0()).unwrap();
                let cell_id = store.find_cells(LOT).unwrap()[0].id.clone();
                let a = store.register_vehicle("AAA111", PARTICULAR).unwrap().id;
                let b = store.register_vehicle("BBB222", PARTICULAR).unwrap().id;
                (cell_id, [a, b])
            };

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = vehicles
                .into_iter()
                .enumerate()
                .map(|(i, vehicle_id)| {
                    let (path, cell_id, barrier) = (path.clone(), cell_id.clone(), barrier.clone());
                    std::thread::spawn(move || {
                        let mut store = SqliteParkingStore::open(&path).unwrap();
                        let mut outcomes = Vec::with_capacity(ROUNDS);
                        for round in 0..ROUNDS as i64 {
                            // Future windows overlapping by 30 minutes, so the cell stays FREE
                            let start = t0() + hours(24 + round * 2) + minutes(30 * i as i64);
                            let req = request(vehicle_id, &cell_id, start, Some(start + hours(1)));
                            barrier.wait();
                            outcomes.push(ReservationManager::create(&mut store, &req, t0()));
                        }
                        outcomes
                    })
                })
                .collect();
            let outcomes: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();

            let created = outcomes.iter().filter(|o| o.is_ok()).count();
            let conflicts = outcomes
                .iter()
                .filter(|o| matches!(o, Err(ParkingError::Conflict(_))))
                .count();
            assert_eq!(created, ROUNDS);
            assert_eq!(conflicts, ROUNDS);

            let store = SqliteParkingStore::open(&path).unwrap();
            let open = store
                .find_reservations(&ReservationFilter::open().on_cells(vec![cell_id]))
                .unwrap();
            assert_eq!(open.len(), ROUNDS);

            drop(store);
            remove_db(&path);
        }

        #[test]
        fn test_sqlite_concurrent_provisioning_fills_capacity_once() {
            let path = temp_path();
            seed_lot(&mut SqliteParkingStore::open(&path).unwrap(), 8);

            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let (path, barrier) = (path.clone(), barrier.clone());
                    std::thread::spawn(move || {
                        let mut store = SqliteParkingStore::open(&path).unwrap();
                        barrier.wait();
                        CellStore::ensure_lot_capacity(&mut store, LOT, t0()).unwrap()
                    })
                })
                .collect();
            let created: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
            assert_eq!(created, 8);

            let store = SqliteParkingStore::open(&path).unwrap();
            assert_eq!(store.count_cells(LOT, None).unwrap(), 8);

            drop(store);
            remove_db(&path);
        }
    }
}
