//! Incremental completer: fill only the absent fields of an existing table.
//!
//! The defining contract: a present field is never overwritten and never
//! triggers a network call. Different fields of one row can be routed to
//! different sources; fetch/parse failures are attributed per (name, field)
//! and never end the run.

use std::str::FromStr;

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::schema::{CanonicalRecord, Field};
use crate::source::{Source, SourceKind};

/// Field → source routing for gap filling.
#[derive(Debug, Clone)]
pub struct Routes(Vec<(Field, SourceKind)>);

impl Routes {
    /// Default routing: coordinates come off the rendered NED page, the
    /// velocity/morphology/distance columns off the HyperLeda page.
    pub fn defaults() -> Self {
        Routes(vec![
            (Field::Lon, SourceKind::NedPage),
            (Field::Lat, SourceKind::NedPage),
            (Field::V, SourceKind::LedaPage),
            (Field::LogD25, SourceKind::LedaPage),
            (Field::LogR25, SourceKind::LedaPage),
            (Field::Pa, SourceKind::LedaPage),
            (Field::Mpc, SourceKind::LedaPage),
        ])
    }

    /// Apply `field=source` override specs on top of the current routes.
    pub fn apply_overrides(&mut self, specs: &[String]) -> Result<(), ConfigError> {
        for spec in specs {
            let (field, source) = spec
                .split_once('=')
                .ok_or_else(|| ConfigError::BadRoute(spec.clone()))?;
            let field = Field::from_str(field)?;
            let kind = SourceKind::from_str(source)?;
            self.set(field, kind);
        }
        Ok(())
    }

    pub fn set(&mut self, field: Field, kind: SourceKind) {
        match self.0.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = kind,
            None => self.0.push((field, kind)),
        }
    }

    pub fn get(&self, field: Field) -> Option<SourceKind> {
        self.0.iter().find(|(f, _)| *f == field).map(|(_, k)| *k)
    }

    /// Distinct source kinds the tracked fields can route to, in tracked
    /// order. Unrouted fields contribute nothing.
    pub fn kinds_for(&self, tracked: &[Field]) -> Vec<SourceKind> {
        let mut kinds = Vec::new();
        for field in tracked {
            if let Some(kind) = self.get(*field) {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }
}

/// Outcome of a completion run.
pub struct CompleteReport {
    pub filled: usize,
    pub failures: Vec<(String, Field, String)>,
}

/// Fill absent fields of `records` in place. `tracked` limits which columns
/// are considered; `sources` must contain every kind the routing resolves to.
pub async fn complete(
    records: &mut [CanonicalRecord],
    tracked: &[Field],
    routes: &Routes,
    sources: &[Source],
) -> CompleteReport {
    let mut filled = 0usize;
    let mut failures: Vec<(String, Field, String)> = Vec::new();

    for record in records.iter_mut() {
        // Nameless rows cannot be queried anywhere.
        if record.name.is_empty() {
            continue;
        }
        let missing = record.missing(tracked);
        if missing.is_empty() {
            continue;
        }

        // Group this row's gaps by their routed source so each source is hit
        // at most once per row.
        let mut groups: Vec<(SourceKind, Vec<Field>)> = Vec::new();
        for field in missing {
            let Some(kind) = routes.get(field) else {
                continue;
            };
            match groups.iter_mut().find(|(k, _)| *k == kind) {
                Some((_, fields)) => fields.push(field),
                None => groups.push((kind, vec![field])),
            }
        }

        for (kind, fields) in groups {
            let Some(source) = sources.iter().find(|s| s.kind == kind) else {
                for field in &fields {
                    failures.push((
                        record.name.clone(),
                        *field,
                        format!("source {kind} not configured"),
                    ));
                }
                continue;
            };

            let fetched = match source.adapter.fetch(&record.name).await {
                Ok(raw) => match source.normalizer.normalize(&raw) {
                    Ok(rec) => rec,
                    Err(e) => {
                        record_failures(&mut failures, &record.name, &fields, &e.to_string());
                        continue;
                    }
                },
                Err(e) => {
                    record_failures(&mut failures, &record.name, &fields, &e.to_string());
                    continue;
                }
            };

            for field in fields {
                if record.get(field).is_some() {
                    continue;
                }
                if let Some(value) = fetched.get(field) {
                    record.set(field, value);
                    filled += 1;
                }
            }
        }
    }

    info!(
        "completion: filled {} fields, {} failures",
        filled,
        failures.len()
    );
    CompleteReport { filled, failures }
}

fn record_failures(
    failures: &mut Vec<(String, Field, String)>,
    name: &str,
    fields: &[Field],
    error: &str,
) {
    for field in fields {
        warn!("completion: {} {}: {}", name, field, error);
        failures.push((name.to_string(), *field, error.to_string()));
    }
}
