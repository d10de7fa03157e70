// 🖼️ Photo Filter - filtered photo listings for people and memories

use crate::db::QueryExecutor;
use crate::filter::FilterSpec;
use crate::predicate::{compile, MEMORIES, PEOPLE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// `{photos: [path, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoList {
    pub photos: Vec<String>,
}

pub struct PhotoFilterEngine<'a> {
    db: &'a dyn QueryExecutor,
}

impl<'a> PhotoFilterEngine<'a> {
    pub fn new(db: &'a dyn QueryExecutor) -> Self {
        PhotoFilterEngine { db }
    }

    /// Person photos whose OWNING person matches the filter (trip,
    /// met_location, met_date). Category is ignored.
    pub fn person_photos(&self, filter: &FilterSpec) -> Result<PhotoList> {
        let person = PEOPLE.with_alias("p");
        let predicate = compile(filter, &person);
        let sql = format!(
            "SELECT DISTINCT pp.photo FROM person_photos pp \
             JOIN {} ON pp.person_id = p.person_id{}",
            person.from_clause(),
            predicate.where_clause()
        );

        let rows = self
            .db
            .execute(&sql, &predicate.params())
            .context("Failed to list person photos")?;

        Ok(collect_paths(rows.iter().map(|row| row.text(0))))
    }

    /// Memory photos filtered on the memory's own trip, location and date.
    /// Memories without a photo are skipped.
    pub fn memory_photos(&self, filter: &FilterSpec) -> Result<PhotoList> {
        let predicate = compile(filter, &MEMORIES);
        let sql = format!(
            "SELECT DISTINCT memory_photo FROM {}{}",
            MEMORIES.from_clause(),
            predicate.where_clause_with(&[
                "memory_photo IS NOT NULL",
                "TRIM(memory_photo) != ''",
            ])
        );

        let rows = self
            .db
            .execute(&sql, &predicate.params())
            .context("Failed to list memory photos")?;

        Ok(collect_paths(rows.iter().map(|row| row.text(0))))
    }
}

/// Drop null/blank paths and repeats, keeping first-seen order
fn collect_paths<I>(paths: I) -> PhotoList
where
    I: IntoIterator<Item = Option<String>>,
{
    let mut seen = HashSet::new();
    let photos = paths
        .into_iter()
        .flatten()
        .filter(|path| !path.trim().is_empty())
        .filter(|path| seen.insert(path.clone()))
        .collect();

    PhotoList { photos }
}
