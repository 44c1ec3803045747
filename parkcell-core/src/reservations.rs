use crate::cells::CellStore;
use crate::conflict::{ConflictQuery, OverlapValidator};
use crate::error::{ParkingError, Result};
use crate::infrastructure::{in_transaction, ParkingStore, ReservationFilter, TemporalPredicate};
use crate::reconcile::Reconciler;
use crate::types::{
    new_id, normalize_email, normalize_plate, to_store_precision, CellStatus, CellTypeId, CustomerId, CustomerRef,
    LotId, Reservation, ReservationStatus, Timestamp, Vehicle, VehicleId, Window,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Operator-initiated reservation of a specific cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateReservation {
    pub vehicle_id: VehicleId,
    pub cell_id: String,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// Defaults to now
    #[serde(default)]
    pub start: Option<Timestamp>,
    /// Absent means open-ended
    #[serde(default)]
    pub end: Option<Timestamp>,
}

/// Customer-initiated reservation: the engine picks the cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerReservation {
    pub customer_id: CustomerId,
    pub plate: String,
    /// Vehicle type; also the cell type the vehicle parks in
    pub vehicle_type_id: CellTypeId,
    pub lot_id: LotId,
}

/// Creates, closes and queries reservations.
///
/// Every entry point takes `now` explicitly; time-sensitive ones run a
/// reconciliation pass first so they never act on stale cell status.
pub struct ReservationManager;

impl ReservationManager {
    pub fn create<S: ParkingStore + ?Sized>(
        store: &mut S,
        request: &CreateReservation,
        now: Timestamp,
    ) -> Result<Reservation> {
        let now = to_store_precision(now);
        Reconciler::run_pass(store, now)?;
        in_transaction(store, |s| Self::create_in_transaction(s, request, now))
    }

    // Check-then-write runs under one transaction so concurrent creators
    // cannot both pass the overlap check.
    fn create_in_transaction<S: ParkingStore + ?Sized>(
        store: &mut S,
        request: &CreateReservation,
        now: Timestamp,
    ) -> Result<Reservation> {
        let vehicle = Self::resolve_vehicle(store, request.vehicle_id)?;
        let cell = CellStore::find_by_id(store, &request.cell_id)?;
        let customer = match request.customer_id {
            Some(id) => Some(Self::resolve_customer(store, id)?),
            None => None,
        };

        if !cell.is_free() {
            return Err(ParkingError::InvalidState(format!(
                "cell {} is not FREE",
                cell.id
            )));
        }

        let window = Window::new(request.start.unwrap_or(now), request.end)?;

        OverlapValidator::check_conflicts(
            store,
            &ConflictQuery {
                vehicle: &vehicle,
                customer: customer.as_ref(),
                cell_id: &cell.id,
                window,
            },
        )?;

        let reservation = Reservation::open(
            new_id("rsv"),
            vehicle.id,
            cell.id.clone(),
            customer.as_ref().map(|c| c.id),
            window,
        );
        store.insert_reservation(&reservation)?;

        if window.covers(now) {
            CellStore::set_status(store, &cell.id, CellStatus::Occupied, now)?;
        }

        info!(
            reservation_id = %reservation.id,
            vehicle = %vehicle.plate,
            cell_id = %cell.id,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Resolves or registers the vehicle by plate, picks the first FREE cell
    /// of the matching type in the lot, then delegates to [`Self::create`].
    pub fn create_for_customer<S: ParkingStore + ?Sized>(
        store: &mut S,
        request: &CustomerReservation,
        now: Timestamp,
    ) -> Result<Reservation> {
        let plate = normalize_plate(&request.plate);
        if plate.is_empty() {
            return Err(ParkingError::InvalidInput("plate is required".to_string()));
        }

        Self::resolve_customer(store, request.customer_id)?;
        store
            .get_lot(request.lot_id)?
            .ok_or_else(|| ParkingError::NotFound(format!("lot {} does not exist", request.lot_id)))?;

        let vehicle = match store.find_vehicle_by_plate(&plate)? {
            Some(existing) if existing.vehicle_type_id != request.vehicle_type_id => {
                return Err(ParkingError::Conflict(format!(
                    "plate {} is already registered with a different vehicle type",
                    plate
                )));
            }
            Some(existing) => existing,
            None => {
                let vehicle = store.register_vehicle(&plate, request.vehicle_type_id)?;
                info!(vehicle_id = vehicle.id, plate = %vehicle.plate, "Vehicle registered");
                vehicle
            }
        };

        Reconciler::run_pass(store, now)?;

        let cell = CellStore::find_by_lot(store, request.lot_id)?
            .into_iter()
            .find(|c| c.is_free() && c.cell_type_id == request.vehicle_type_id)
            .ok_or_else(|| {
                ParkingError::InvalidInput(format!(
                    "no free cells for vehicle type {} in lot {}",
                    request.vehicle_type_id, request.lot_id
                ))
            })?;

        Self::create(
            store,
            &CreateReservation {
                vehicle_id: vehicle.id,
                cell_id: cell.id,
                customer_id: Some(request.customer_id),
                start: None,
                end: None,
            },
            now,
        )
    }

    /// Stamps `end = now` and closes the reservation. The cell is freed
    /// unless another OPEN reservation still covers now.
    pub fn close<S: ParkingStore + ?Sized>(
        store: &mut S,
        reservation_id: &str,
        now: Timestamp,
    ) -> Result<Reservation> {
        let now = to_store_precision(now);
        Reconciler::run_pass(store, now)?;
        in_transaction(store, |s| {
            let mut reservation = Self::find_by_id(s, reservation_id)?;
            if reservation.status == ReservationStatus::Closed {
                return Err(ParkingError::InvalidState(format!(
                    "reservation {} is already closed",
                    reservation.id
                )));
            }

            // A reservation closed before it began keeps its window
            if now > reservation.window.start {
                reservation.window.end = Some(now);
            }
            reservation.status = ReservationStatus::Closed;
            s.update_reservation(&reservation)?;

            let still_covered = !s
                .find_reservations(
                    &ReservationFilter::open()
                        .on_cells(vec![reservation.cell_id.clone()])
                        .when(TemporalPredicate::CoversAt(now)),
                )?
                .is_empty();
            if !still_covered {
                CellStore::set_status(s, &reservation.cell_id, CellStatus::Free, now)?;
            }

            info!(reservation_id = %reservation.id, cell_id = %reservation.cell_id, "Reservation closed");
            Ok(reservation)
        })
    }

    pub fn find_by_id<S: ParkingStore + ?Sized>(store: &S, reservation_id: &str) -> Result<Reservation> {
        store.get_reservation(reservation_id)?.ok_or_else(|| {
            ParkingError::NotFound(format!("reservation {} does not exist", reservation_id))
        })
    }

    /// OPEN reservations covering now, newest start first
    pub fn find_active<S: ParkingStore + ?Sized>(store: &mut S, now: Timestamp) -> Result<Vec<Reservation>> {
        Reconciler::run_pass(store, now)?;
        store.find_reservations(&ReservationFilter::open().when(TemporalPredicate::CoversAt(now)))
    }

    pub fn find_by_lot<S: ParkingStore + ?Sized>(
        store: &mut S,
        lot_id: LotId,
        now: Timestamp,
    ) -> Result<Vec<Reservation>> {
        Reconciler::run_pass(store, now)?;
        let cell_ids = CellStore::find_by_lot(store, lot_id)?
            .into_iter()
            .map(|c| c.id)
            .collect::<Vec<_>>();
        if cell_ids.is_empty() {
            return Ok(Vec::new());
        }
        store.find_reservations(&ReservationFilter::any().on_cells(cell_ids))
    }

    pub fn find_by_customer<S: ParkingStore + ?Sized>(
        store: &mut S,
        customer_id: CustomerId,
        now: Timestamp,
    ) -> Result<Vec<Reservation>> {
        Reconciler::run_pass(store, now)?;
        store.find_reservations(&ReservationFilter::any().for_customers(vec![customer_id]))
    }

    /// Reservations billed to `customer_id` or to any billing reference
    /// sharing the normalized email.
    pub fn find_by_customer_or_email<S: ParkingStore + ?Sized>(
        store: &mut S,
        customer_id: CustomerId,
        email: &str,
        now: Timestamp,
    ) -> Result<Vec<Reservation>> {
        Reconciler::run_pass(store, now)?;

        let mut customer_ids = vec![customer_id];
        let email = normalize_email(email);
        if !email.is_empty() {
            for customer in store.find_customers_by_email(&email)? {
                if !customer_ids.contains(&customer.id) {
                    customer_ids.push(customer.id);
                }
            }
        }
        store.find_reservations(&ReservationFilter::any().for_customers(customer_ids))
    }

    /// Distinct vehicles across [`Self::find_by_customer_or_email`], in
    /// first-seen order.
    pub fn vehicles_by_customer_or_email<S: ParkingStore + ?Sized>(
        store: &mut S,
        customer_id: CustomerId,
        email: &str,
        now: Timestamp,
    ) -> Result<Vec<Vehicle>> {
        let reservations = Self::find_by_customer_or_email(store, customer_id, email, now)?;
        let mut vehicles: Vec<Vehicle> = Vec::new();
        for reservation in reservations {
            if vehicles.iter().any(|v| v.id == reservation.vehicle_id) {
                continue;
            }
            if let Some(vehicle) = store.get_vehicle(reservation.vehicle_id)? {
                vehicles.push(vehicle);
            }
        }
        Ok(vehicles)
    }

    fn resolve_vehicle<S: ParkingStore + ?Sized>(store: &S, id: VehicleId) -> Result<Vehicle> {
        store
            .get_vehicle(id)?
            .ok_or_else(|| ParkingError::NotFound(format!("vehicle {} does not exist", id)))
    }

    fn resolve_customer<S: ParkingStore + ?Sized>(store: &S, id: CustomerId) -> Result<CustomerRef> {
        store
            .get_customer(id)?
            .ok_or_else(|| ParkingError::NotFound(format!("customer {} does not exist", id)))
    }
}
