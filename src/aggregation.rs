// 📊 Aggregation Engine - filtered expense reports and cross-entity counts
//
// Every query here takes its WHERE clause from predicate::compile, so a
// filter means the same thing in the summary, both breakdowns and the
// secondary summary. All operations are read-only.

use crate::db::QueryExecutor;
use crate::filter::FilterSpec;
use crate::predicate::{compile, EntityColumns, EXPENSES, MEMORIES, PEOPLE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ============================================================================
// REPORT SHAPES
// ============================================================================

/// Totals over the matching expenses. Zero rows → zeros and no last date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub total_expense: f64,
    pub average_expense: f64,
    pub number_of_expenses: i64,
    pub max_expense: f64,
    pub min_expense: f64,
    pub last_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationTotal {
    pub location: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondarySummary {
    pub people_met: i64,
    pub locations_visited: i64,
    pub memories: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationEntry {
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub category: String,
}

// ============================================================================
// AGGREGATION ENGINE
// ============================================================================

/// Per-request report builder over a query executor
pub struct AggregationEngine<'a> {
    db: &'a dyn QueryExecutor,
}

impl<'a> AggregationEngine<'a> {
    pub fn new(db: &'a dyn QueryExecutor) -> Self {
        AggregationEngine { db }
    }

    /// Distinct non-blank expense locations, ascending
    pub fn distinct_locations(&self) -> Result<Vec<LocationEntry>> {
        let rows = self
            .db
            .execute(
                "SELECT DISTINCT location FROM expenses
                 WHERE location IS NOT NULL AND TRIM(location) != ''
                 ORDER BY location ASC",
                &[],
            )
            .context("Failed to list distinct locations")?;

        Ok(rows
            .iter()
            .filter_map(|row| row.text(0))
            .map(|location| LocationEntry { location })
            .collect())
    }

    /// Distinct non-blank expense categories, ascending
    pub fn distinct_categories(&self) -> Result<Vec<CategoryEntry>> {
        let rows = self
            .db
            .execute(
                "SELECT DISTINCT category FROM expenses
                 WHERE category IS NOT NULL AND TRIM(category) != ''
                 ORDER BY category ASC",
                &[],
            )
            .context("Failed to list distinct categories")?;

        Ok(rows
            .iter()
            .filter_map(|row| row.text(0))
            .map(|category| CategoryEntry { category })
            .collect())
    }

    /// Total, average, count, max, min and latest date of matching expenses
    pub fn expense_summary(&self, filter: &FilterSpec) -> Result<ExpenseSummary> {
        let predicate = compile(filter, &EXPENSES);
        let sql = format!(
            "SELECT
                SUM(expense) AS total_expense,
                AVG(expense) AS average_expense,
                COUNT(*) AS number_of_expenses,
                MAX(expense) AS max_expense,
                MIN(expense) AS min_expense,
                MAX(date) AS last_date
             FROM {}{}",
            EXPENSES.from_clause(),
            predicate.where_clause()
        );

        let rows = self
            .db
            .execute(&sql, &predicate.params())
            .context("Failed to compute expense summary")?;

        // An aggregate without GROUP BY always yields one row; guard anyway
        let summary = match rows.first() {
            Some(row) => ExpenseSummary {
                total_expense: row.f64_or_zero(0),
                average_expense: row.f64_or_zero(1),
                number_of_expenses: row.i64_or_zero(2),
                max_expense: row.f64_or_zero(3),
                min_expense: row.f64_or_zero(4),
                last_date: row.text(5),
            },
            None => ExpenseSummary::empty(),
        };

        tracing::info!(
            count = summary.number_of_expenses,
            total = summary.total_expense,
            "expense summary computed"
        );

        Ok(summary)
    }

    /// Per-category totals, largest first
    pub fn category_breakdown(&self, filter: &FilterSpec) -> Result<Vec<CategoryTotal>> {
        let rows = self.breakdown(filter, "category")?;
        Ok(rows
            .into_iter()
            .map(|(category, total)| CategoryTotal { category, total })
            .collect())
    }

    /// Per-location totals, largest first
    pub fn location_breakdown(&self, filter: &FilterSpec) -> Result<Vec<LocationTotal>> {
        let rows = self.breakdown(filter, "location")?;
        Ok(rows
            .into_iter()
            .map(|(location, total)| LocationTotal { location, total })
            .collect())
    }

    /// `group_column` is one of our own column names, never request input
    fn breakdown(
        &self,
        filter: &FilterSpec,
        group_column: &'static str,
    ) -> Result<Vec<(String, f64)>> {
        let predicate = compile(filter, &EXPENSES);
        let sql = format!(
            "SELECT {col}, SUM(expense) AS total FROM {from}{filter} \
             GROUP BY {col} ORDER BY total DESC",
            col = group_column,
            from = EXPENSES.from_clause(),
            filter = predicate.where_clause()
        );

        let rows = self
            .db
            .execute(&sql, &predicate.params())
            .with_context(|| format!("Failed to compute {} breakdown", group_column))?;

        Ok(rows
            .iter()
            .map(|row| (row.text(0).unwrap_or_default(), row.f64_or_zero(1)))
            .collect())
    }

    /// People met, memories recorded and locations visited.
    ///
    /// Category only narrows expenses, so it is dropped for people and
    /// memories. Locations visited ignores the location filter.
    pub fn secondary_summary(&self, filter: &FilterSpec) -> Result<SecondarySummary> {
        let people_met = self.count(filter, &PEOPLE)?;
        let memories = self.count(filter, &MEMORIES)?;
        let locations_visited = self.locations_visited(filter)?;

        Ok(SecondarySummary {
            people_met,
            locations_visited,
            memories,
        })
    }

    fn count(&self, filter: &FilterSpec, entity: &EntityColumns) -> Result<i64> {
        let predicate = compile(filter, entity);
        let sql = format!(
            "SELECT COUNT(*) FROM {}{}",
            entity.from_clause(),
            predicate.where_clause()
        );

        let rows = self
            .db
            .execute(&sql, &predicate.params())
            .with_context(|| format!("Failed to count {}", entity.table))?;

        Ok(rows.first().map(|row| row.i64_or_zero(0)).unwrap_or(0))
    }

    /// UNION of the three per-entity `COUNT(DISTINCT location)` scalars,
    /// first row in ascending order.
    ///
    /// The union de-duplicates counts, not location names, so the result is
    /// the smallest per-entity count rather than the number of distinct places
    /// across entities.
    pub fn locations_visited(&self, filter: &FilterSpec) -> Result<i64> {
        let scope = filter.without_location();
        // Person and memory parts only ever see trip and date range
        let non_expense_scope = scope.without_category();

        let expense_part = compile(&scope, &EXPENSES);
        let people_part = compile(&non_expense_scope, &PEOPLE);
        let memory_part = compile(&non_expense_scope, &MEMORIES);

        let sql = format!(
            "SELECT COUNT(DISTINCT {}) FROM {}{} \
             UNION SELECT COUNT(DISTINCT {}) FROM {}{} \
             UNION SELECT COUNT(DISTINCT {}) FROM {}{} \
             ORDER BY 1",
            EXPENSES.location_column,
            EXPENSES.from_clause(),
            expense_part.where_clause(),
            PEOPLE.location_column,
            PEOPLE.from_clause(),
            people_part.where_clause(),
            MEMORIES.location_column,
            MEMORIES.from_clause(),
            memory_part.where_clause(),
        );

        let mut params = expense_part.params();
        params.extend(people_part.params());
        params.extend(memory_part.params());

        let rows = self
            .db
            .execute(&sql, &params)
            .context("Failed to count locations visited")?;

        Ok(rows.first().map(|row| row.i64_or_zero(0)).unwrap_or(0))
    }
}

impl ExpenseSummary {
    pub fn empty() -> Self {
        ExpenseSummary {
            total_expense: 0.0,
            average_expense: 0.0,
            number_of_expenses: 0,
            max_expense: 0.0,
            min_expense: 0.0,
            last_date: None,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
