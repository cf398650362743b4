//! Batch collector: drives one adapter + normalizer over a name list.
//!
//! Strictly sequential per object. A failed name is recorded and skipped;
//! nothing a single object does can abort the batch.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::CollectError;
use crate::schema::SourceTable;
use crate::source::{Normalizer, SourceAdapter};

/// Outcome of one batch run, failures attributed per name.
pub struct CollectReport {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub ok: usize,
    pub failures: Vec<(String, CollectError)>,
}

impl CollectReport {
    pub fn total(&self) -> usize {
        self.ok + self.failures.len()
    }
}

pub async fn collect(
    adapter: &dyn SourceAdapter,
    normalizer: &dyn Normalizer,
    names: &[String],
) -> (SourceTable, CollectReport) {
    let started_at = Utc::now();
    let mut table = SourceTable::new(adapter.label());
    let mut failures: Vec<(String, CollectError)> = Vec::new();

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap()
            .progress_chars("=> "),
    );

    for name in names {
        let outcome = fetch_one(adapter, normalizer, name).await;
        match outcome {
            Ok(record) => table.insert(record),
            Err(e) => {
                warn!("{}: {} failed: {}", adapter.label(), name, e);
                failures.push((name.clone(), e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    let ok = table.len();
    info!(
        "{}: collected {}/{} objects ({} failed)",
        adapter.label(),
        ok,
        names.len(),
        failures.len()
    );

    (
        table,
        CollectReport {
            source: adapter.label().to_string(),
            started_at,
            ok,
            failures,
        },
    )
}

async fn fetch_one(
    adapter: &dyn SourceAdapter,
    normalizer: &dyn Normalizer,
    name: &str,
) -> Result<crate::schema::CanonicalRecord, CollectError> {
    let raw = adapter.fetch(name).await?;
    let record = normalizer.normalize(&raw)?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, ParseError};
    use crate::schema::Field;
    use crate::source::RawRecord;
    use async_trait::async_trait;

    /// Scripted adapter: names listed in `bad` time out, the rest return a
    /// raw record with a single `v` value.
    struct ScriptedAdapter {
        bad: Vec<&'static str>,
    }

    #[async_trait]
    impl SourceAdapter for ScriptedAdapter {
        fn label(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(&self, name: &str) -> Result<RawRecord, FetchError> {
            if self.bad.contains(&name) {
                return Err(FetchError::Timeout);
            }
            let mut raw = RawRecord::new(name);
            raw.set("v", "100.0");
            Ok(raw)
        }
    }

    struct VNormalizer;

    impl Normalizer for VNormalizer {
        fn normalize(
            &self,
            raw: &RawRecord,
        ) -> Result<crate::schema::CanonicalRecord, ParseError> {
            let mut rec = crate::schema::CanonicalRecord::new(&raw.name);
            if let Some(v) = raw.get("v") {
                rec.set(
                    Field::V,
                    v.parse().map_err(|_| ParseError::BadNumber {
                        field: "v",
                        value: v.to_string(),
                    })?,
                );
            }
            Ok(rec)
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let adapter = ScriptedAdapter { bad: vec!["G5"] };
        let names = vec!["G5".to_string(), "G6".to_string()];
        let (table, report) = collect(&adapter, &VNormalizer, &names).await;

        assert!(table.find("G5").is_none());
        assert!(table.find("G6").is_some());
        assert_eq!(report.ok, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "G5");
        assert!(matches!(
            report.failures[0].1,
            CollectError::Fetch(FetchError::Timeout)
        ));
    }

    #[tokio::test]
    async fn report_counts_add_up() {
        let adapter = ScriptedAdapter { bad: vec![] };
        let names: Vec<String> = (1..=4).map(|i| format!("G{i}")).collect();
        let (table, report) = collect(&adapter, &VNormalizer, &names).await;
        assert_eq!(table.len(), 4);
        assert_eq!(report.total(), 4);
        assert!(report.failures.is_empty());
    }
}
