// 🧩 Predicate Compiler - FilterSpec → parameterized WHERE fragment
//
// One compiler, many consumers: every report builds its WHERE clause here so
// filter semantics stay identical across endpoints. Values are never
// interpolated into SQL text; they travel as positional `?` parameters.

use crate::filter::FilterSpec;
use rusqlite::types::Value;

// ============================================================================
// ENTITY DESCRIPTORS
// ============================================================================

/// Column naming for one filterable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityColumns {
    pub table: &'static str,
    pub alias: Option<&'static str>,
    pub trip_column: &'static str,
    pub location_column: &'static str,
    pub date_column: &'static str,
    /// `None` for entities without a category; the category filter is dropped
    pub category_column: Option<&'static str>,
}

pub const EXPENSES: EntityColumns = EntityColumns {
    table: "expenses",
    alias: None,
    trip_column: "trip_id",
    location_column: "location",
    date_column: "date",
    category_column: Some("category"),
};

pub const PEOPLE: EntityColumns = EntityColumns {
    table: "people",
    alias: None,
    trip_column: "trip_id",
    location_column: "met_location",
    date_column: "met_date",
    category_column: None,
};

pub const MEMORIES: EntityColumns = EntityColumns {
    table: "memories",
    alias: None,
    trip_column: "trip_id",
    location_column: "location",
    date_column: "date",
    category_column: None,
};

impl EntityColumns {
    /// Same entity addressed through a join alias (`p.met_location`)
    pub const fn with_alias(self, alias: &'static str) -> Self {
        EntityColumns {
            alias: Some(alias),
            ..self
        }
    }

    /// `FROM` target, including the alias when there is one
    pub fn from_clause(&self) -> String {
        match self.alias {
            Some(alias) => format!("{} {}", self.table, alias),
            None => self.table.to_string(),
        }
    }

    fn qualify(&self, column: &str) -> String {
        match self.alias {
            Some(alias) => format!("{}.{}", alias, column),
            None => column.to_string(),
        }
    }
}

// ============================================================================
// CONDITIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    /// Inclusive on both ends
    Between,
}

impl Operator {
    fn placeholder(&self) -> &'static str {
        match self {
            Operator::Eq => "= ?",
            Operator::Between => "BETWEEN ? AND ?",
        }
    }
}

/// One `column operator value(s)` term. Terms are always AND-ed.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Condition {
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.operator.placeholder())
    }
}

// ============================================================================
// COMPILED PREDICATE
// ============================================================================

/// Ordered conditions plus the parameters that bind to them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Parameters in placeholder order
    pub fn params(&self) -> Vec<Value> {
        self.conditions
            .iter()
            .flat_map(|c| c.values.iter().cloned())
            .collect()
    }

    /// ` WHERE a = ? AND b BETWEEN ? AND ?`, or an empty string
    pub fn where_clause(&self) -> String {
        self.where_clause_with(&[])
    }

    /// Like `where_clause`, with fixed parameter-free guards placed first
    pub fn where_clause_with(&self, guards: &[&str]) -> String {
        let terms: Vec<String> = guards
            .iter()
            .map(|g| g.to_string())
            .chain(self.conditions.iter().map(Condition::to_sql))
            .collect();

        if terms.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", terms.join(" AND "))
        }
    }
}

/// Compile a filter for one entity.
///
/// trip → `=`, location → `=` on the entity's location column, category → `=`
/// only where the entity has one, date range → `BETWEEN` on the entity's
/// date column. No filters yields an empty predicate.
pub fn compile(filter: &FilterSpec, entity: &EntityColumns) -> Predicate {
    let mut conditions = Vec::new();

    if let Some(trip_id) = filter.trip_id() {
        conditions.push(Condition {
            column: entity.qualify(entity.trip_column),
            operator: Operator::Eq,
            values: vec![Value::Text(trip_id.to_string())],
        });
    }

    if let Some(location) = filter.location() {
        conditions.push(Condition {
            column: entity.qualify(entity.location_column),
            operator: Operator::Eq,
            values: vec![Value::Text(location.to_string())],
        });
    }

    if let (Some(category), Some(column)) = (filter.category(), entity.category_column) {
        conditions.push(Condition {
            column: entity.qualify(column),
            operator: Operator::Eq,
            values: vec![Value::Text(category.to_string())],
        });
    }

    if let Some(range) = filter.date_range() {
        if !range.is_iso_formatted() {
            tracing::warn!(
                start = %range.start,
                end = %range.end,
                "date range is not YYYY-MM-DD; comparing {} lexically",
                entity.date_column
            );
        }
        conditions.push(Condition {
            column: entity.qualify(entity.date_column),
            operator: Operator::Between,
            values: vec![
                Value::Text(range.start.clone()),
                Value::Text(range.end.clone()),
            ],
        });
    }

    Predicate { conditions }
}
