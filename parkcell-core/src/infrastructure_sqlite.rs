//! SQLite-backed ParkingStore implementation.
//! Provides persistent cells and reservations across restarts.
//!
//! Enable with the `sqlite` feature flag:
//! ```toml
//! parkcell-core = { path = "../parkcell-core", features = ["sqlite"] }
//! ```

use std::time::Duration;

use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use crate::error::{ParkingError, Result};
use crate::infrastructure::{CatalogStore, ParkingStore, ReservationFilter};
use crate::types::*;

/// A persistent store backed by SQLite.
///
/// Uses WAL mode for concurrent read performance. Transactions are opened
/// with `BEGIN IMMEDIATE`, which takes the database write lock up front and
/// so serializes check-then-write sequences across connections.
pub struct SqliteParkingStore {
    conn: Connection,
}

const RESERVATION_COLUMNS: &str =
    "id, vehicle_id, cell_id, customer_id, start_ms, end_ms, status";
const CELL_COLUMNS: &str = "id, lot_id, cell_type_id, sensor_id, status, last_status_change_ms";

impl SqliteParkingStore {
    /// Open (or create) a SQLite database at the given path.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Writers from other connections queue on BEGIN IMMEDIATE instead of failing
        conn.busy_timeout(Duration::from_secs(5))?;

        // Enable WAL mode for better concurrent read performance
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS lots (
                id        INTEGER PRIMARY KEY,
                name      TEXT NOT NULL,
                capacity  INTEGER NOT NULL,
                owner_id  INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cell_types (
                id    INTEGER PRIMARY KEY,
                name  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS vehicles (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                plate            TEXT NOT NULL UNIQUE,
                vehicle_type_id  INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS customers (
                id               INTEGER PRIMARY KEY,
                document_type    TEXT NOT NULL,
                document_number  TEXT NOT NULL,
                email            TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS sensors (
                id           TEXT PRIMARY KEY,
                description  TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS cells (
                seq                    INTEGER PRIMARY KEY AUTOINCREMENT,
                id                     TEXT NOT NULL UNIQUE,
                lot_id                 INTEGER NOT NULL,
                cell_type_id           INTEGER NOT NULL,
                sensor_id              TEXT NOT NULL REFERENCES sensors(id),
                status                 TEXT NOT NULL DEFAULT 'FREE',
                last_status_change_ms  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_cells_lot ON cells(lot_id, status);

            CREATE TABLE IF NOT EXISTS reservations (
                id           TEXT PRIMARY KEY,
                vehicle_id   INTEGER NOT NULL,
                cell_id      TEXT NOT NULL,
                customer_id  INTEGER,
                start_ms     INTEGER NOT NULL,
                end_ms       INTEGER,
                status       TEXT NOT NULL DEFAULT 'OPEN'
            );
            CREATE INDEX IF NOT EXISTS idx_reservations_status ON reservations(status);
            CREATE INDEX IF NOT EXISTS idx_reservations_vehicle ON reservations(vehicle_id, status);
            CREATE INDEX IF NOT EXISTS idx_reservations_cell ON reservations(cell_id, status);",
        )?;

        Ok(Self { conn })
    }

    fn timestamp(ms: i64, column: usize) -> rusqlite::Result<Timestamp> {
        Timestamp::from_timestamp_millis(ms)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(column, ms))
    }

    fn parse<T>(text: String, column: usize) -> rusqlite::Result<T>
    where
        T: std::str::FromStr<Err = ParkingError>,
    {
        text.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
    }

    fn row_to_reservation(row: &Row<'_>) -> rusqlite::Result<Reservation> {
        let end_ms: Option<i64> = row.get(5)?;
        Ok(Reservation {
            id: row.get(0)?,
            vehicle_id: row.get(1)?,
            cell_id: row.get(2)?,
            customer_id: row.get(3)?,
            window: Window {
                start: Self::timestamp(row.get(4)?, 4)?,
                end: end_ms.map(|ms| Self::timestamp(ms, 5)).transpose()?,
            },
            status: Self::parse(row.get(6)?, 6)?,
        })
    }

    fn row_to_cell(row: &Row<'_>) -> rusqlite::Result<Cell> {
        Ok(Cell {
            id: row.get(0)?,
            lot_id: row.get(1)?,
            cell_type_id: row.get(2)?,
            sensor_id: row.get(3)?,
            status: Self::parse(row.get(4)?, 4)?,
            last_status_change: Self::timestamp(row.get(5)?, 5)?,
        })
    }

    fn row_to_vehicle(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
        Ok(Vehicle {
            id: row.get(0)?,
            plate: row.get(1)?,
            vehicle_type_id: row.get(2)?,
        })
    }

    fn row_to_customer(row: &Row<'_>) -> rusqlite::Result<CustomerRef> {
        Ok(CustomerRef {
            id: row.get(0)?,
            document_type: row.get(1)?,
            document_number: row.get(2)?,
            email: row.get(3)?,
        })
    }

    fn row_to_lot(row: &Row<'_>) -> rusqlite::Result<Lot> {
        Ok(Lot {
            id: row.get(0)?,
            name: row.get(1)?,
            capacity: row.get(2)?,
            owner_id: row.get(3)?,
        })
    }

    fn placeholders(n: usize) -> String {
        vec!["?"; n].join(", ")
    }
}

impl CatalogStore for SqliteParkingStore {
    fn put_lot(&mut self, lot: &Lot) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO lots (id, name, capacity, owner_id) VALUES (?1, ?2, ?3, ?4)",
            params![lot.id, lot.name, lot.capacity, lot.owner_id],
        )?;
        Ok(())
    }

    fn get_lot(&self, id: LotId) -> Result<Option<Lot>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, capacity, owner_id FROM lots WHERE id = ?1",
                params![id],
                Self::row_to_lot,
            )
            .optional()?)
    }

    fn list_lots(&self) -> Result<Vec<Lot>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, capacity, owner_id FROM lots ORDER BY id")?;
        let lots = stmt
            .query_map([], Self::row_to_lot)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(lots)
    }

    fn put_cell_type(&mut self, cell_type: &CellType) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO cell_types (id, name) VALUES (?1, ?2)",
            params![cell_type.id, cell_type.name],
        )?;
        Ok(())
    }

    fn list_cell_types(&self) -> Result<Vec<CellType>> {
        let mut stmt = self.conn.prepare("SELECT id, name FROM cell_types ORDER BY id")?;
        let types = stmt
            .query_map([], |row| {
                Ok(CellType {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(types)
    }

    fn register_vehicle(&mut self, plate: &str, vehicle_type_id: CellTypeId) -> Result<Vehicle> {
        let plate = normalize_plate(plate);
        if self.find_vehicle_by_plate(&plate)?.is_some() {
            return Err(ParkingError::Conflict(format!(
                "plate {} is already registered",
                plate
            )));
        }
        self.conn.execute(
            "INSERT INTO vehicles (plate, vehicle_type_id) VALUES (?1, ?2)",
            params![plate, vehicle_type_id],
        )?;
        Ok(Vehicle {
            id: self.conn.last_insert_rowid() as u64,
            plate,
            vehicle_type_id,
        })
    }

    fn get_vehicle(&self, id: VehicleId) -> Result<Option<Vehicle>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, plate, vehicle_type_id FROM vehicles WHERE id = ?1",
                params![id],
                Self::row_to_vehicle,
            )
            .optional()?)
    }

    fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<Vehicle>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, plate, vehicle_type_id FROM vehicles WHERE plate = ?1",
                params![normalize_plate(plate)],
                Self::row_to_vehicle,
            )
            .optional()?)
    }

    fn put_customer(&mut self, customer: &CustomerRef) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO customers (id, document_type, document_number, email)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                customer.id,
                customer.document_type,
                customer.document_number,
                customer.email
            ],
        )?;
        Ok(())
    }

    fn get_customer(&self, id: CustomerId) -> Result<Option<CustomerRef>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, document_type, document_number, email FROM customers WHERE id = ?1",
                params![id],
                Self::row_to_customer,
            )
            .optional()?)
    }

    fn find_customers_by_email(&self, email: &str) -> Result<Vec<CustomerRef>> {
        // SQLite's LOWER only folds ASCII; re-check with the Rust normalizer.
        let email = normalize_email(email);
        let mut stmt = self.conn.prepare(
            "SELECT id, document_type, document_number, email FROM customers
             WHERE LOWER(TRIM(email)) = ?1 ORDER BY id",
        )?;
        let customers = stmt
            .query_map(params![email], Self::row_to_customer)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(customers
            .into_iter()
            .filter(|c| normalize_email(&c.email) == email)
            .collect())
    }
}

impl ParkingStore for SqliteParkingStore {
    fn begin(&mut self) -> Result<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn insert_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO reservations (id, vehicle_id, cell_id, customer_id, start_ms, end_ms, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                reservation.id,
                reservation.vehicle_id,
                reservation.cell_id,
                reservation.customer_id,
                reservation.window.start.timestamp_millis(),
                reservation.window.end.map(|t| t.timestamp_millis()),
                reservation.status.to_string(),
            ],
        )?;
        Ok(())
    }

    fn update_reservation(&mut self, reservation: &Reservation) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE reservations
             SET vehicle_id = ?2, cell_id = ?3, customer_id = ?4, start_ms = ?5, end_ms = ?6, status = ?7
             WHERE id = ?1",
            params![
                reservation.id,
                reservation.vehicle_id,
                reservation.cell_id,
                reservation.customer_id,
                reservation.window.start.timestamp_millis(),
                reservation.window.end.map(|t| t.timestamp_millis()),
                reservation.status.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(ParkingError::NotFound(format!("reservation {}", reservation.id)));
        }
        Ok(())
    }

    fn get_reservation(&self, id: &str) -> Result<Option<Reservation>> {
        let sql = format!("SELECT {} FROM reservations WHERE id = ?1", RESERVATION_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::row_to_reservation)
            .optional()?)
    }

    fn find_reservations(&self, filter: &ReservationFilter) -> Result<Vec<Reservation>> {
        if filter.is_empty_selection() {
            return Ok(Vec::new());
        }

        // Narrow by the indexed columns; the time predicate is applied by
        // `ReservationFilter::matches` below.
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push("status = ?".to_string());
            values.push(Value::Text(status.to_string()));
        }
        if let Some(vehicle_id) = filter.vehicle_id {
            clauses.push("vehicle_id = ?".to_string());
            values.push(Value::Integer(vehicle_id as i64));
        }
        if let Some(cells) = &filter.cell_ids {
            clauses.push(format!("cell_id IN ({})", Self::placeholders(cells.len())));
            values.extend(cells.iter().cloned().map(Value::Text));
        }
        if let Some(customers) = &filter.customer_ids {
            clauses.push(format!("customer_id IN ({})", Self::placeholders(customers.len())));
            values.extend(customers.iter().map(|id| Value::Integer(*id as i64)));
        }

        let mut sql = format!("SELECT {} FROM reservations", RESERVATION_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY start_ms DESC");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_reservation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows.into_iter().filter(|r| filter.matches(r)).collect())
    }

    fn insert_sensor(&mut self, sensor: &Sensor) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sensors (id, description) VALUES (?1, ?2)",
            params![sensor.id, sensor.description],
        )?;
        Ok(())
    }

    fn insert_cell(&mut self, cell: &Cell) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cells (id, lot_id, cell_type_id, sensor_id, status, last_status_change_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                cell.id,
                cell.lot_id,
                cell.cell_type_id,
                cell.sensor_id,
                cell.status.to_string(),
                cell.last_status_change.timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn update_cell(&mut self, cell: &Cell) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE cells
             SET lot_id = ?2, cell_type_id = ?3, sensor_id = ?4, status = ?5, last_status_change_ms = ?6
             WHERE id = ?1",
            params![
                cell.id,
                cell.lot_id,
                cell.cell_type_id,
                cell.sensor_id,
                cell.status.to_string(),
                cell.last_status_change.timestamp_millis(),
            ],
        )?;
        if rows == 0 {
            return Err(ParkingError::NotFound(format!("cell {}", cell.id)));
        }
        Ok(())
    }

    fn get_cell(&self, id: &str) -> Result<Option<Cell>> {
        let sql = format!("SELECT {} FROM cells WHERE id = ?1", CELL_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![id], Self::row_to_cell)
            .optional()?)
    }

    fn find_cells(&self, lot_id: LotId) -> Result<Vec<Cell>> {
        let sql = format!("SELECT {} FROM cells WHERE lot_id = ?1 ORDER BY seq", CELL_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let cells = stmt
            .query_map(params![lot_id], Self::row_to_cell)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    fn count_cells(&self, lot_id: LotId, status: Option<CellStatus>) -> Result<usize> {
        let count: i64 = match status {
            Some(status) => self.conn.query_row(
                "SELECT COUNT(*) FROM cells WHERE lot_id = ?1 AND status = ?2",
                params![lot_id, status.to_string()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "SELECT COUNT(*) FROM cells WHERE lot_id = ?1",
                params![lot_id],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }
}
