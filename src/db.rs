use anyhow::{anyhow, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Mutex;

// ============================================================================
// QUERY EXECUTION INTERFACE
// ============================================================================

/// Everything the reporting core needs from the relational store.
///
/// Implementations must tolerate concurrent calls from many in-flight
/// requests.
pub trait QueryExecutor: Send + Sync {
    /// Run one parameterized statement and return every result row
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;
}

static NULL_VALUE: Value = Value::Null;

/// One result row, with lenient typed getters
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Row { values }
    }

    /// Raw cell; out-of-range columns read as NULL
    pub fn get(&self, idx: usize) -> &Value {
        self.values.get(idx).unwrap_or(&NULL_VALUE)
    }

    /// Numeric cell as f64; NULL and non-numeric cells read as 0
    pub fn f64_or_zero(&self, idx: usize) -> f64 {
        match self.get(idx) {
            Value::Integer(i) => *i as f64,
            Value::Real(r) => *r,
            Value::Text(s) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Integer cell; NULL and non-numeric cells read as 0
    pub fn i64_or_zero(&self, idx: usize) -> i64 {
        match self.get(idx) {
            Value::Integer(i) => *i,
            Value::Real(r) => *r as i64,
            Value::Text(s) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    /// Text cell; NULL reads as None, numbers are rendered
    pub fn text(&self, idx: usize) -> Option<String> {
        match self.get(idx) {
            Value::Text(s) => Some(s.clone()),
            Value::Integer(i) => Some(i.to_string()),
            Value::Real(r) => Some(r.to_string()),
            Value::Null | Value::Blob(_) => None,
        }
    }
}

// ============================================================================
// SQLITE EXECUTOR
// ============================================================================

/// SQLite-backed executor; the connection is serialized behind a mutex
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn new(conn: Connection) -> Self {
        SqliteExecutor {
            conn: Mutex::new(conn),
        }
    }

    /// Open a database file with WAL journaling and foreign keys enabled
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        // Enable WAL mode for crash recovery
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::new(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self::new(conn))
    }

    /// Create tables and indexes if missing
    pub fn setup(&self) -> Result<()> {
        let conn = self.lock()?;
        setup_database(&conn)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow!("database connection lock poisoned: {}", e))
    }
}

impl QueryExecutor for SqliteExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let conn = self.lock()?;
        tracing::debug!(sql, params = params.len(), "executing query");

        let mut stmt = conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql))?;
        let column_count = stmt.column_count();

        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..column_count)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            result.push(Row::new(values));
        }

        Ok(result)
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS trips (
            trip_id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_name TEXT UNIQUE NOT NULL,
            date_created DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS expenses (
            budget_id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_id INTEGER NOT NULL REFERENCES trips(trip_id) ON DELETE CASCADE,
            label TEXT NOT NULL,
            expense REAL NOT NULL CHECK (expense > 0),
            category TEXT NOT NULL,
            location TEXT NOT NULL,
            date TEXT NOT NULL,
            import_hash TEXT UNIQUE
        );

        CREATE TABLE IF NOT EXISTS people (
            person_id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_id INTEGER NOT NULL REFERENCES trips(trip_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            contact TEXT NOT NULL,
            met_location TEXT NOT NULL,
            met_date TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS person_photos (
            photo_id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_id INTEGER NOT NULL REFERENCES trips(trip_id) ON DELETE CASCADE,
            person_id INTEGER NOT NULL REFERENCES people(person_id) ON DELETE CASCADE,
            photo TEXT NOT NULL
        );

        -- date is free text; range filters compare it lexically
        CREATE TABLE IF NOT EXISTS memories (
            memory_id INTEGER PRIMARY KEY AUTOINCREMENT,
            trip_id INTEGER NOT NULL REFERENCES trips(trip_id) ON DELETE CASCADE,
            memory_photo TEXT,
            caption TEXT NOT NULL,
            location TEXT NOT NULL,
            date TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS expense_date_idx ON expenses(date DESC);
        CREATE INDEX IF NOT EXISTS expense_clt_idx ON expenses(trip_id, location, category);
        CREATE INDEX IF NOT EXISTS people_met_date_idx ON people(met_date DESC);
        CREATE INDEX IF NOT EXISTS people_tl_idx ON people(trip_id, met_location);
        CREATE INDEX IF NOT EXISTS memory_date_idx ON memories(date DESC);
        CREATE INDEX IF NOT EXISTS memory_tl_idx ON memories(trip_id, location);",
    )
    .context("Failed to create schema")?;

    Ok(())
}

// ============================================================================
// SEEDING HELPERS
// ============================================================================

/// Expense row as it appears in an import file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub label: String,
    pub expense: f64,
    pub category: String,
    pub location: String,
    pub date: String,
}

impl ExpenseRecord {
    pub fn new(label: &str, expense: f64, category: &str, location: &str, date: &str) -> Self {
        ExpenseRecord {
            label: label.to_string(),
            expense,
            category: category.to_string(),
            location: location.to_string(),
            date: date.to_string(),
        }
    }

    /// Hash used to skip rows that were already imported into the same trip
    pub fn compute_import_hash(&self, trip_id: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}|{}",
            trip_id, self.label, self.expense, self.category, self.location, self.date
        ));
        format!("{:x}", hasher.finalize())
    }
}

fn returned_id(rows: Vec<Row>, what: &str) -> Result<i64> {
    rows.first()
        .map(|row| row.i64_or_zero(0))
        .ok_or_else(|| anyhow!("insert into {} returned no id", what))
}

pub fn insert_trip(db: &dyn QueryExecutor, trip_name: &str) -> Result<i64> {
    let rows = db.execute(
        "INSERT INTO trips (trip_name) VALUES (?) RETURNING trip_id",
        &[Value::Text(trip_name.to_string())],
    )?;
    returned_id(rows, "trips")
}

pub fn insert_expense(db: &dyn QueryExecutor, trip_id: i64, record: &ExpenseRecord) -> Result<i64> {
    let rows = db.execute(
        "INSERT INTO expenses (trip_id, label, expense, category, location, date)
         VALUES (?, ?, ?, ?, ?, ?) RETURNING budget_id",
        &[
            Value::Integer(trip_id),
            Value::Text(record.label.clone()),
            Value::Real(record.expense),
            Value::Text(record.category.clone()),
            Value::Text(record.location.clone()),
            Value::Text(record.date.clone()),
        ],
    )?;
    returned_id(rows, "expenses")
}

pub fn insert_person(
    db: &dyn QueryExecutor,
    trip_id: i64,
    name: &str,
    contact: &str,
    met_location: &str,
    met_date: &str,
) -> Result<i64> {
    let rows = db.execute(
        "INSERT INTO people (trip_id, name, contact, met_location, met_date)
         VALUES (?, ?, ?, ?, ?) RETURNING person_id",
        &[
            Value::Integer(trip_id),
            Value::Text(name.to_string()),
            Value::Text(contact.to_string()),
            Value::Text(met_location.to_string()),
            Value::Text(met_date.to_string()),
        ],
    )?;
    returned_id(rows, "people")
}

pub fn insert_person_photo(
    db: &dyn QueryExecutor,
    trip_id: i64,
    person_id: i64,
    photo: &str,
) -> Result<i64> {
    let rows = db.execute(
        "INSERT INTO person_photos (trip_id, person_id, photo)
         VALUES (?, ?, ?) RETURNING photo_id",
        &[
            Value::Integer(trip_id),
            Value::Integer(person_id),
            Value::Text(photo.to_string()),
        ],
    )?;
    returned_id(rows, "person_photos")
}

pub fn insert_memory(
    db: &dyn QueryExecutor,
    trip_id: i64,
    memory_photo: Option<&str>,
    caption: &str,
    location: &str,
    date: &str,
) -> Result<i64> {
    let photo = match memory_photo {
        Some(path) => Value::Text(path.to_string()),
        None => Value::Null,
    };
    let rows = db.execute(
        "INSERT INTO memories (trip_id, memory_photo, caption, location, date)
         VALUES (?, ?, ?, ?, ?) RETURNING memory_id",
        &[
            Value::Integer(trip_id),
            photo,
            Value::Text(caption.to_string()),
            Value::Text(location.to_string()),
            Value::Text(date.to_string()),
        ],
    )?;
    returned_id(rows, "memories")
}

// ============================================================================
// CSV IMPORT
// ============================================================================

/// Read `label,expense,category,location,date` rows
pub fn load_expenses_csv(csv_path: &Path) -> Result<Vec<ExpenseRecord>> {
    let mut rdr = csv::Reader::from_path(csv_path).context("Failed to open CSV file")?;

    let mut records = Vec::new();
    for result in rdr.deserialize() {
        let record: ExpenseRecord = result.context("Failed to deserialize expense")?;
        records.push(record);
    }

    Ok(records)
}

/// Insert expenses into a trip, skipping rows already imported there.
/// Returns the number of rows actually inserted. Rows that break any other
/// constraint (non-positive amount, missing field) are an error.
pub fn import_expenses(
    db: &dyn QueryExecutor,
    trip_id: i64,
    records: &[ExpenseRecord],
) -> Result<usize> {
    let mut inserted = 0;

    for record in records {
        let rows = db
            .execute(
                "INSERT INTO expenses
                    (trip_id, label, expense, category, location, date, import_hash)
                 VALUES (?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(import_hash) DO NOTHING
                 RETURNING budget_id",
                &[
                    Value::Integer(trip_id),
                    Value::Text(record.label.clone()),
                    Value::Real(record.expense),
                    Value::Text(record.category.clone()),
                    Value::Text(record.location.clone()),
                    Value::Text(record.date.clone()),
                    Value::Text(record.compute_import_hash(trip_id)),
                ],
            )
            .with_context(|| format!("Failed to import expense {:?}", record.label))?;
        inserted += rows.len();
    }

    tracing::info!(
        trip_id,
        inserted,
        skipped = records.len() - inserted,
        "expense import finished"
    );

    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_db() -> SqliteExecutor {
        let db = SqliteExecutor::open_in_memory().unwrap();
        db.setup().unwrap();
        db
    }

    #[test]
    fn test_setup_is_repeatable() {
        let db = test_db();
        db.setup().unwrap();

        let rows = db
            .execute(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
                &[Value::Text("person_photos".to_string())],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_row_getters_default_nulls() {
        let row = Row::new(vec![Value::Null, Value::Integer(3), Value::Real(2.5)]);

        assert_eq!(row.f64_or_zero(0), 0.0);
        assert_eq!(row.i64_or_zero(0), 0);
        assert_eq!(row.text(0), None);
        assert_eq!(row.f64_or_zero(1), 3.0);
        assert_eq!(row.i64_or_zero(2), 2);
        assert_eq!(row.text(1), Some("3".to_string()));
        assert_eq!(row.get(9), &Value::Null);
    }

    #[test]
    fn test_seed_helpers_return_ids() {
        let db = test_db();

        let trip = insert_trip(&db, "Japan").unwrap();
        let expense = insert_expense(
            &db,
            trip,
            &ExpenseRecord::new("Ramen", 12.0, "Food", "Tokyo", "2024-03-01"),
        )
        .unwrap();
        let person = insert_person(&db, trip, "Aiko", "aiko@example.com", "Tokyo", "2024-03-02")
            .unwrap();
        let photo = insert_person_photo(&db, trip, person, "images/aiko.jpg").unwrap();
        let memory = insert_memory(&db, trip, None, "Shrine", "Kyoto", "2024-03-05").unwrap();

        assert!(trip > 0);
        assert!(expense > 0);
        assert!(photo > 0);
        assert!(memory > 0);
    }

    #[test]
    fn test_deleting_trip_cascades() {
        let db = test_db();
        let trip = insert_trip(&db, "Cascade").unwrap();
        insert_expense(
            &db,
            trip,
            &ExpenseRecord::new("Taxi", 20.0, "Transport", "Lisbon", "2024-05-01"),
        )
        .unwrap();

        db.execute("DELETE FROM trips WHERE trip_id = ?", &[Value::Integer(trip)])
            .unwrap();

        let rows = db.execute("SELECT COUNT(*) FROM expenses", &[]).unwrap();
        assert_eq!(rows[0].i64_or_zero(0), 0);
    }

    #[test]
    fn test_import_twice_inserts_once() {
        let db = test_db();
        let trip = insert_trip(&db, "Italy").unwrap();

        let records = vec![
            ExpenseRecord::new("Pizza", 15.0, "Food", "Naples", "2024-06-01"),
            ExpenseRecord::new("Train", 40.0, "Transport", "Rome", "2024-06-02"),
            ExpenseRecord::new("Museum", 25.0, "Culture", "Florence", "2024-06-03"),
        ];

        let first = import_expenses(&db, trip, &records).unwrap();
        let second = import_expenses(&db, trip, &records).unwrap();
        let count = db.execute("SELECT COUNT(*) FROM expenses", &[]).unwrap()[0].i64_or_zero(0);

        assert_eq!(first, 3, "First import should insert 3 expenses");
        assert_eq!(second, 0, "Second import should insert nothing");
        assert_eq!(count, 3);
    }

    #[test]
    fn test_same_rows_import_into_different_trips() {
        let db = test_db();
        let a = insert_trip(&db, "A").unwrap();
        let b = insert_trip(&db, "B").unwrap();
        let records = vec![ExpenseRecord::new("Coffee", 3.0, "Food", "Oslo", "2024-01-01")];

        assert_eq!(import_expenses(&db, a, &records).unwrap(), 1);
        assert_eq!(import_expenses(&db, b, &records).unwrap(), 1);
    }

    #[test]
    fn test_import_rejects_non_positive_expense() {
        let db = test_db();
        let trip = insert_trip(&db, "Spain").unwrap();
        let records = vec![
            ExpenseRecord::new("Refund", -10.0, "Food", "Madrid", "2024-07-01"),
            ExpenseRecord::new("Lunch", 12.0, "Food", "Madrid", "2024-07-01"),
        ];

        let err = import_expenses(&db, trip, &records).unwrap_err();
        assert!(format!("{:#}", err).contains("Refund"));

        let count = db.execute("SELECT COUNT(*) FROM expenses", &[]).unwrap()[0].i64_or_zero(0);
        assert_eq!(count, 0, "Nothing after the bad row should be imported");
    }

    #[test]
    fn test_load_expenses_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "label,expense,category,location,date").unwrap();
        writeln!(file, "Lunch,50,Food,Paris,2024-01-01").unwrap();
        writeln!(file, "Dinner,30.5,Food,Paris,2024-01-05").unwrap();
        file.flush().unwrap();

        let records = load_expenses_csv(file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].expense, 30.5);
        assert_eq!(records[0].location, "Paris");
    }

    #[test]
    fn test_malformed_sql_is_an_error() {
        let db = test_db();
        assert!(db.execute("SELEC nothing", &[]).is_err());
    }
}
