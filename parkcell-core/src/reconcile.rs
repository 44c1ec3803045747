//! One idempotent pass that closes expired reservations and realigns cell
//! status with the set of OPEN reservations covering now.

use crate::cells::CellStore;
use crate::error::Result;
use crate::infrastructure::{ParkingStore, ReservationFilter, TemporalPredicate};
use crate::types::{CellId, CellStatus, ReservationStatus, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// What a single pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Reservations moved OPEN -> CLOSED because their end passed
    pub closed: usize,
    /// Cells flipped to OCCUPIED
    pub occupied: usize,
    /// Cells flipped to FREE
    pub freed: usize,
    /// Items that failed and were skipped
    pub failures: usize,
}

impl ReconcileReport {
    pub fn changes(&self) -> usize {
        self.closed + self.occupied + self.freed
    }
}

pub struct Reconciler;

impl Reconciler {
    /// Runs one pass at `now`. A failure on one reservation or cell is
    /// logged and counted, and the pass moves on to the rest. Only failures
    /// of the two scans themselves are returned as errors.
    pub fn run_pass<S: ParkingStore + ?Sized>(
        store: &mut S,
        now: Timestamp,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let mut touched: BTreeSet<CellId> = BTreeSet::new();

        // 1. Close OPEN reservations whose end has passed
        let expired =
            store.find_reservations(&ReservationFilter::open().when(TemporalPredicate::EndedBy(now)))?;
        for mut reservation in expired {
            reservation.status = ReservationStatus::Closed;
            match store.update_reservation(&reservation) {
                Ok(()) => {
                    report.closed += 1;
                    touched.insert(reservation.cell_id);
                }
                Err(e) => {
                    report.failures += 1;
                    warn!(
                        reservation_id = %reservation.id,
                        error = %e,
                        "Failed to close expired reservation"
                    );
                }
            }
        }

        // 2. Cells that should be OCCUPIED right now
        let occupied: BTreeSet<CellId> = store
            .find_reservations(&ReservationFilter::open().when(TemporalPredicate::CoversAt(now)))?
            .into_iter()
            .map(|r| r.cell_id)
            .collect();

        // 3. Re-evaluate every touched or covered cell
        touched.extend(occupied.iter().cloned());
        for cell_id in &touched {
            let target = if occupied.contains(cell_id) {
                CellStatus::Occupied
            } else {
                CellStatus::Free
            };
            match CellStore::set_status(store, cell_id, target, now) {
                Ok(true) => match target {
                    CellStatus::Occupied => report.occupied += 1,
                    CellStatus::Free => report.freed += 1,
                },
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    warn!(cell_id = %cell_id, status = %target, error = %e, "Failed to sync cell status");
                }
            }
        }

        if report.changes() > 0 || report.failures > 0 {
            info!(
                closed = report.closed,
                occupied = report.occupied,
                freed = report.freed,
                failures = report.failures,
                "Reconciliation pass applied changes"
            );
        } else {
            debug!(candidates = touched.len(), "Reconciliation pass found nothing to change");
        }

        Ok(report)
    }
}
