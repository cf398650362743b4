//! Priority reconciler: merges per-source tables column by column.
//!
//! The rule is a per-field coalesce, not a per-row pick: for every name and
//! every field independently, the first table in priority order holding a
//! non-absent value for that field wins. One merged row may therefore mix
//! values from several sources.

use crate::error::ConfigError;
use crate::schema::{CanonicalRecord, Field, SourceTable};

/// First non-absent value for `(name, field)` across `tables` in priority
/// order (highest first). Absent everywhere stays absent.
pub fn coalesce_field(tables: &[SourceTable], name: &str, field: Field) -> Option<f64> {
    tables
        .iter()
        .find_map(|t| t.find(name).and_then(|r| r.get(field)))
}

/// Merge the given tables, highest priority first, restricted to `fields`.
///
/// Output rows appear in first-appearance order of names across the priority
/// concatenation, one row per distinct name.
pub fn reconcile(tables: &[SourceTable], fields: &[Field]) -> Result<SourceTable, ConfigError> {
    if tables.is_empty() {
        return Err(ConfigError::EmptyPriority);
    }

    let mut merged = SourceTable::new("merged");
    for table in tables {
        for record in &table.records {
            if merged.find(&record.name).is_some() {
                continue;
            }
            let mut row = CanonicalRecord::new(&record.name);
            for field in fields {
                if let Some(value) = coalesce_field(tables, &record.name, *field) {
                    row.set(*field, value);
                }
            }
            merged.insert(row);
        }
    }
    Ok(merged)
}
