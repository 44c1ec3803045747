use crate::error::{ParkingError, Result};
use crate::infrastructure::{ParkingStore, ReservationFilter, TemporalPredicate};
use crate::types::{
    normalize_email, CustomerRef, Reservation, ReservationStatus, Vehicle, Window,
};

/// A candidate reservation to check against existing OPEN ones
#[derive(Debug, Clone, Copy)]
pub struct ConflictQuery<'a> {
    pub vehicle: &'a Vehicle,
    pub customer: Option<&'a CustomerRef>,
    pub cell_id: &'a str,
    pub window: Window,
}

/// Which overlap rule a candidate broke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictScope {
    Vehicle,
    Customer,
    Cell,
}

/// Rejects windows that overlap an OPEN reservation of the same vehicle,
/// the same customer email, or the same cell.
pub struct OverlapValidator;

impl OverlapValidator {
    /// Finds one OPEN reservation within `scope` whose window intersects
    /// `window`. Every rule below is this call with a different scope.
    pub fn find_overlapping<S: ParkingStore + ?Sized>(
        store: &S,
        scope: ReservationFilter,
        window: Window,
    ) -> Result<Option<Reservation>> {
        let filter = ReservationFilter {
            status: Some(ReservationStatus::Open),
            temporal: Some(TemporalPredicate::Overlaps(window)),
            ..scope
        };
        if filter.is_empty_selection() {
            return Ok(None);
        }
        Ok(store.find_reservations(&filter)?.into_iter().next())
    }

    /// Returns the first broken rule, checked in order vehicle, customer, cell.
    pub fn first_conflict<S: ParkingStore + ?Sized>(
        store: &S,
        query: &ConflictQuery<'_>,
    ) -> Result<Option<(ConflictScope, Reservation)>> {
        let by_vehicle = ReservationFilter::any().for_vehicle(query.vehicle.id);
        if let Some(existing) = Self::find_overlapping(store, by_vehicle, query.window)? {
            return Ok(Some((ConflictScope::Vehicle, existing)));
        }

        if let Some(customer) = query.customer {
            let email = normalize_email(&customer.email);
            if !email.is_empty() {
                let ids = store
                    .find_customers_by_email(&email)?
                    .into_iter()
                    .map(|c| c.id)
                    .collect();
                let by_customer = ReservationFilter::any().for_customers(ids);
                if let Some(existing) = Self::find_overlapping(store, by_customer, query.window)? {
                    return Ok(Some((ConflictScope::Customer, existing)));
                }
            }
        }

        let by_cell = ReservationFilter::any().on_cells(vec![query.cell_id.to_string()]);
        if let Some(existing) = Self::find_overlapping(store, by_cell, query.window)? {
            return Ok(Some((ConflictScope::Cell, existing)));
        }

        Ok(None)
    }

    /// Fails with `Conflict` naming the broken rule; no side effects.
    pub fn check_conflicts<S: ParkingStore + ?Sized>(
        store: &S,
        query: &ConflictQuery<'_>,
    ) -> Result<()> {
        let Some((scope, existing)) = Self::first_conflict(store, query)? else {
            return Ok(());
        };

        let location = Self::lot_name(store, &existing)
            .map(|name| format!(" in {}", name))
            .unwrap_or_default();

        let reason = match scope {
            ConflictScope::Vehicle => format!(
                "plate {} already has an active reservation{}",
                query.vehicle.plate, location
            ),
            ConflictScope::Customer => format!(
                "email {} already has an active reservation{}",
                query.customer.map(|c| c.email.trim()).unwrap_or_default(),
                location
            ),
            ConflictScope::Cell => {
                "the selected cell already has an active reservation in that window".to_string()
            }
        };
        Err(ParkingError::Conflict(reason))
    }

    // Best-effort label for messages; lookup failures just drop the suffix.
    fn lot_name<S: ParkingStore + ?Sized>(store: &S, reservation: &Reservation) -> Option<String> {
        let cell = store.get_cell(&reservation.cell_id).ok()??;
        let lot = store.get_lot(cell.lot_id).ok()??;
        Some(lot.name)
    }
}
