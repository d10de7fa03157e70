// Trip Journal - Core Library
// Filtered reporting over trips and media reconciliation, shared by the CLI,
// the API server and tests

pub mod config;
pub mod logging;
pub mod db;
pub mod filter;          // Report filters
pub mod predicate;       // FilterSpec → parameterized WHERE
pub mod aggregation;     // Summaries, breakdowns, cross-entity counts
pub mod photos;          // Filtered photo listings
pub mod media;           // File storage interface
pub mod reconciliation;  // Orphaned media cleanup

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use config::Config;
pub use db::{
    QueryExecutor, Row, SqliteExecutor, ExpenseRecord,
    setup_database, load_expenses_csv, import_expenses,
    insert_trip, insert_expense, insert_person, insert_person_photo, insert_memory,
};
pub use filter::{FilterSpec, DateRange};
pub use predicate::{
    compile, Condition, EntityColumns, Operator, Predicate,
    EXPENSES, PEOPLE, MEMORIES,
};
pub use aggregation::{
    AggregationEngine, ExpenseSummary, CategoryTotal, LocationTotal,
    SecondarySummary, LocationEntry, CategoryEntry,
};
pub use photos::{PhotoFilterEngine, PhotoList};
pub use media::{MediaStore, FsMediaStore};
pub use reconciliation::{
    ReconciliationEngine, CleanupReport, PassReport, FailedDeletion, MediaKind,
    PERSON_PHOTOS, MEMORY_PHOTOS, DEFAULT_IMAGE_EXTENSIONS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
