// ⚖️ Reconciliation Engine - delete media files no record points to
//
// Two independent passes, person photos (images/) and memory photos
// (memories/). Each pass compares stored file NAMES against the basenames of
// every referenced path and deletes the difference.
//
// A live file deleted here is lost data, so:
//   - passes are serialized process-wide
//   - every orphan is re-checked against the store right before deletion
//   - a failed deletion is recorded and the pass moves on

use crate::db::QueryExecutor;
use crate::media::MediaStore;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Mutex, PoisonError};

static RECONCILE_LOCK: Mutex<()> = Mutex::new(());

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];

// ============================================================================
// MEDIA KINDS
// ============================================================================

/// Where one kind of photo lives on disk and in the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaKind {
    pub dir: &'static str,
    pub table: &'static str,
    pub column: &'static str,
}

pub const PERSON_PHOTOS: MediaKind = MediaKind {
    dir: "images",
    table: "person_photos",
    column: "photo",
};

pub const MEMORY_PHOTOS: MediaKind = MediaKind {
    dir: "memories",
    table: "memories",
    column: "memory_photo",
};

// ============================================================================
// REPORTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedDeletion {
    pub path: String,
    pub error: String,
}

/// Outcome of one pass. Paths are relative to the media root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassReport {
    pub directory: String,
    pub directory_missing: bool,
    /// Raw referenced paths, for diagnostics
    pub referenced: Vec<String>,
    pub unused: Vec<String>,
    pub deleted: Vec<String>,
    pub failed: Vec<FailedDeletion>,
    /// Orphans that gained a reference before they could be deleted
    pub relinked: Vec<String>,
}

impl PassReport {
    fn new(kind: &MediaKind, referenced: Vec<String>) -> Self {
        PassReport {
            directory: kind.dir.to_string(),
            directory_missing: false,
            referenced,
            unused: Vec::new(),
            deleted: Vec::new(),
            failed: Vec::new(),
            relinked: Vec::new(),
        }
    }

    pub fn message(&self) -> String {
        if self.directory_missing {
            format!("No {} directory found.", self.directory)
        } else {
            format!(
                "{}: {} unused, {} deleted, {} failed",
                self.directory,
                self.unused.len(),
                self.deleted.len(),
                self.failed.len()
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub images: PassReport,
    pub memories: PassReport,
    pub reconciled_at: DateTime<Utc>,
}

impl CleanupReport {
    pub fn summary(&self) -> String {
        format!(
            "Cleanup complete ({}; {})",
            self.images.message(),
            self.memories.message()
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine<'a> {
    db: &'a dyn QueryExecutor,
    store: &'a dyn MediaStore,
    extensions: Vec<String>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(db: &'a dyn QueryExecutor, store: &'a dyn MediaStore) -> Self {
        Self::with_extensions(
            db,
            store,
            DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        )
    }

    /// Only files ending in `.<ext>` for one of `extensions` are candidates
    pub fn with_extensions(
        db: &'a dyn QueryExecutor,
        store: &'a dyn MediaStore,
        extensions: Vec<String>,
    ) -> Self {
        ReconciliationEngine {
            db,
            store,
            extensions,
        }
    }

    /// Run both passes. A missing directory in one does not affect the other.
    pub fn reconcile(&self) -> Result<CleanupReport> {
        let _guard = RECONCILE_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let images = self.run_pass(&PERSON_PHOTOS)?;
        let memories = self.run_pass(&MEMORY_PHOTOS)?;

        let report = CleanupReport {
            images,
            memories,
            reconciled_at: Utc::now(),
        };
        tracing::info!("{}", report.summary());

        Ok(report)
    }

    /// Run a single pass on its own
    pub fn reconcile_pass(&self, kind: &MediaKind) -> Result<PassReport> {
        let _guard = RECONCILE_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.run_pass(kind)
    }

    fn run_pass(&self, kind: &MediaKind) -> Result<PassReport> {
        // 1. Everything the store currently references
        let referenced = self.referenced_paths(kind)?;
        let mut report = PassReport::new(kind, referenced.iter().cloned().collect());

        if !self.store.dir_exists(kind.dir) {
            tracing::info!(dir = kind.dir, "media directory missing, nothing to reconcile");
            report.directory_missing = true;
            return Ok(report);
        }

        // 2. Image files physically present
        let present: Vec<String> = self
            .store
            .list_names(kind.dir)?
            .into_iter()
            .filter(|name| self.is_image(name))
            .collect();

        // 3. Names nobody references
        let referenced_names: HashSet<&str> = referenced.iter().map(|p| basename(p)).collect();
        let orphans: Vec<String> = present
            .into_iter()
            .filter(|name| !referenced_names.contains(name.as_str()))
            .collect();

        // 4. Delete one by one, re-checking each right before removal
        for name in orphans {
            let path = format!("{}/{}", kind.dir, name);
            report.unused.push(path.clone());

            match self.is_referenced(kind, &name) {
                Ok(false) => {}
                Ok(true) => {
                    tracing::info!(%path, "orphan gained a reference, keeping it");
                    report.relinked.push(path);
                    continue;
                }
                // Unknown reference state: keep the file
                Err(e) => {
                    tracing::warn!(%path, error = %e, "re-check failed, keeping media file");
                    report.failed.push(FailedDeletion {
                        path,
                        error: format!("{:#}", e),
                    });
                    continue;
                }
            }

            match self.store.delete(&path) {
                Ok(()) => {
                    tracing::debug!(%path, "deleted unused media file");
                    report.deleted.push(path);
                }
                Err(e) => {
                    tracing::warn!(%path, error = %e, "failed to delete unused media file");
                    report.failed.push(FailedDeletion {
                        path,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        Ok(report)
    }

    fn referenced_paths(&self, kind: &MediaKind) -> Result<BTreeSet<String>> {
        let sql = format!("SELECT {} FROM {}", kind.column, kind.table);
        let rows = self
            .db
            .execute(&sql, &[])
            .with_context(|| format!("Failed to read referenced paths from {}", kind.table))?;

        Ok(rows.iter().filter_map(|row| row.text(0)).collect())
    }

    /// Targeted check: does any row reference a path whose basename is `name`
    fn is_referenced(&self, kind: &MediaKind, name: &str) -> Result<bool> {
        let sql = format!(
            "SELECT COUNT(*) FROM {table} WHERE {col} = ? OR {col} LIKE ? ESCAPE '\\'",
            table = kind.table,
            col = kind.column
        );
        let rows = self
            .db
            .execute(
                &sql,
                &[
                    Value::Text(name.to_string()),
                    Value::Text(format!("%/{}", escape_like(name))),
                ],
            )
            .with_context(|| format!("Failed to re-check references to {}", name))?;

        Ok(rows.first().map(|row| row.i64_or_zero(0)).unwrap_or(0) > 0)
    }

    fn is_image(&self, name: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| name.ends_with(&format!(".{}", ext)))
    }
}

/// Last `/`-separated segment of a stored path
fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// TESTS
// ============================================================================
