//! CSV persistence for name lists and attribute tables.
//!
//! Absent values are empty cells on disk, never numeric sentinels. Reading
//! tolerates missing columns (treated as all-absent) and unparseable cells
//! (logged, treated as absent); a missing `Name` column is fatal.

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::normalize::parse_value;
use crate::schema::{normalize_name, CanonicalRecord, Field, SourceTable};

const NAME_COLUMN: &str = "Name";

/// Read the input name list: a CSV with a `Name` header column.
pub fn read_names(path: &Path) -> Result<Vec<String>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open name list {}", path.display()))?;
    let name_idx = name_column_index(&mut reader, path)?;

    let mut names = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("Bad row in {}", path.display()))?;
        if let Some(raw) = row.get(name_idx) {
            let name = normalize_name(raw);
            if !name.is_empty() {
                names.push(name);
            }
        }
    }
    Ok(names)
}

/// Read a previously written attribute table.
pub fn read_table(path: &Path, fields: &[Field]) -> Result<SourceTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open table {}", path.display()))?;
    let name_idx = name_column_index(&mut reader, path)?;

    // Column positions per requested field; a missing column means the whole
    // field is absent for this table.
    let headers = reader.headers()?.clone();
    let mut columns: Vec<(Field, Option<usize>)> = Vec::new();
    for field in fields {
        let idx = headers.iter().position(|h| h.trim() == field.as_str());
        if idx.is_none() {
            warn!(
                "{}: column {} missing, treating as all-absent",
                path.display(),
                field
            );
        }
        columns.push((*field, idx));
    }

    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mut table = SourceTable::new(&label);

    for row in reader.records() {
        let row = row.with_context(|| format!("Bad row in {}", path.display()))?;
        let Some(raw_name) = row.get(name_idx) else {
            continue;
        };
        let name = normalize_name(raw_name);
        if name.is_empty() {
            continue;
        }

        let mut record = CanonicalRecord::new(&name);
        for (field, idx) in &columns {
            let cell = idx.and_then(|i| row.get(i)).map(str::trim).unwrap_or("");
            if cell.is_empty() {
                continue;
            }
            // Same hygiene as at normalization time: first token only, the
            // -999 sentinel reads as absent.
            match parse_value(field.as_str(), cell) {
                Ok(Some(value)) => record.set(*field, value),
                Ok(None) => {}
                Err(_) => warn!(
                    "{}: {} {}: unparseable cell {:?}, treating as absent",
                    path.display(),
                    name,
                    field,
                    cell
                ),
            }
        }
        table.insert(record);
    }
    Ok(table)
}

/// Write a table with header `Name,<fields…>`; absent values as empty cells.
pub fn write_table(path: &Path, table: &SourceTable, fields: &[Field]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut header = vec![NAME_COLUMN.to_string()];
    header.extend(fields.iter().map(|f| f.as_str().to_string()));
    writer.write_record(&header)?;

    for record in &table.records {
        let mut row = vec![record.name.clone()];
        for field in fields {
            row.push(match record.get(*field) {
                Some(v) => format_value(v),
                None => String::new(),
            });
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// An attribute table with its original header and cells intact. The in-place
/// completion path goes through this so columns the schema does not know
/// about survive the rewrite untouched.
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    name_idx: usize,
}

/// Read a table keeping every column, known or not.
pub fn read_table_raw(path: &Path) -> Result<RawTable> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open table {}", path.display()))?;
    let name_idx = name_column_index(&mut reader, path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("Bad row in {}", path.display()))?;
        rows.push(row.iter().map(str::to_string).collect());
    }
    Ok(RawTable {
        headers,
        rows,
        name_idx,
    })
}

impl RawTable {
    /// Canonical view of the rows, parallel to the underlying row order.
    /// Cells get the same hygiene as `read_table`; a row with a blank name
    /// yields a record with an empty name.
    pub fn records(&self) -> Vec<CanonicalRecord> {
        let columns: Vec<(Field, Option<usize>)> = crate::schema::ALL_FIELDS
            .iter()
            .map(|f| {
                (
                    *f,
                    self.headers.iter().position(|h| h.trim() == f.as_str()),
                )
            })
            .collect();

        self.rows
            .iter()
            .map(|cells| {
                let mut record = CanonicalRecord::new(&cells[self.name_idx]);
                for (field, idx) in &columns {
                    let cell = idx.map(|i| cells[i].trim()).unwrap_or("");
                    if cell.is_empty() {
                        continue;
                    }
                    match parse_value(field.as_str(), cell) {
                        Ok(Some(value)) => record.set(*field, value),
                        Ok(None) => {}
                        Err(_) => warn!(
                            "{} {}: unparseable cell {:?}, treating as absent",
                            record.name, field, cell
                        ),
                    }
                }
                record
            })
            .collect()
    }

    /// Write the tracked fields of `records` back into the cells, appending
    /// any tracked column the file did not have. `records` must be parallel
    /// to the rows, as produced by [`records`](Self::records).
    pub fn apply(&mut self, records: &[CanonicalRecord], fields: &[Field]) {
        for field in fields {
            let idx = match self
                .headers
                .iter()
                .position(|h| h.trim() == field.as_str())
            {
                Some(i) => i,
                None => {
                    self.headers.push(field.as_str().to_string());
                    for row in &mut self.rows {
                        row.push(String::new());
                    }
                    self.headers.len() - 1
                }
            };
            for (row, record) in self.rows.iter_mut().zip(records) {
                row[idx] = match record.get(*field) {
                    Some(v) => format_value(v),
                    None => String::new(),
                };
            }
        }
    }

    /// Write the table back out, all columns included.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn name_column_index(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<usize> {
    let headers = reader.headers()?;
    match headers.iter().position(|h| h.trim() == NAME_COLUMN) {
        Some(idx) => Ok(idx),
        None => bail!("{} has no {} column", path.display(), NAME_COLUMN),
    }
}

/// Compact float formatting: integral values without a trailing `.0` swarm,
/// everything else with full precision.
fn format_value(v: f64) -> String {
    if v == v.trunc() && v.abs() < 1e15 {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ALL_FIELDS;

    fn scratch(name: &str, contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn names_round_trip() {
        let (_dir, path) = scratch("galaxy.csv", "Name,extra\n ngc 253 ,x\nIC 1613,y\n,z\n");
        let names = read_names(&path).unwrap();
        assert_eq!(names, vec!["NGC 253", "IC 1613"]);
    }

    #[test]
    fn missing_name_column_is_fatal() {
        let (_dir, path) = scratch("bad.csv", "Galaxy\nNGC 253\n");
        assert!(read_names(&path).is_err());
        assert!(read_table(&path, &ALL_FIELDS).is_err());
    }

    #[test]
    fn table_round_trip_preserves_absence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");

        let mut table = SourceTable::new("t");
        let mut r = CanonicalRecord::new("G1");
        r.set(Field::Lon, 10.5);
        r.set(Field::V, 243.0);
        table.insert(r);
        table.insert(CanonicalRecord::new("G2"));

        write_table(&path, &table, &ALL_FIELDS).unwrap();
        let back = read_table(&path, &ALL_FIELDS).unwrap();

        let g1 = back.find("G1").unwrap();
        assert_eq!(g1.lon, Some(10.5));
        assert_eq!(g1.v, Some(243.0));
        assert_eq!(g1.pa, None);
        let g2 = back.find("G2").unwrap();
        assert!(g2.missing(&ALL_FIELDS).len() == ALL_FIELDS.len());
    }

    #[test]
    fn missing_column_reads_as_all_absent() {
        let (_dir, path) = scratch("t.csv", "Name,lon,v\nG1,10.0,243.0\n");
        let table = read_table(&path, &ALL_FIELDS).unwrap();
        let g1 = table.find("G1").unwrap();
        assert_eq!(g1.lon, Some(10.0));
        assert_eq!(g1.pa, None);
        assert_eq!(g1.mpc, None);
    }

    #[test]
    fn unparseable_cell_reads_as_absent() {
        let (_dir, path) = scratch("t.csv", "Name,lon,v\nG1,n/a,243.0\n");
        let table = read_table(&path, &ALL_FIELDS).unwrap();
        let g1 = table.find("G1").unwrap();
        assert_eq!(g1.lon, None);
        assert_eq!(g1.v, Some(243.0));
    }

    #[test]
    fn sentinel_cells_read_as_absent() {
        let (_dir, path) = scratch("t.csv", "Name,lon,pa\nG1,-999.0,52.0\n");
        let table = read_table(&path, &ALL_FIELDS).unwrap();
        let g1 = table.find("G1").unwrap();
        assert_eq!(g1.lon, None);
        assert_eq!(g1.pa, Some(52.0));
    }

    #[test]
    fn raw_records_share_table_hygiene() {
        let (_dir, path) = scratch("t.csv", "Name,lon,pa\n g1 ,-999.0,52.0\n");
        let raw = read_table_raw(&path).unwrap();
        let records = raw.records();
        assert_eq!(records[0].name, "G1");
        assert_eq!(records[0].lon, None);
        assert_eq!(records[0].pa, Some(52.0));
    }

    #[test]
    fn raw_rewrite_keeps_unknown_columns() {
        let (_dir, path) = scratch(
            "t.csv",
            "Name,morphology,v\nNGC 253,SAB(s)c,\nIC 1613,IB(s)m,-234.0\n",
        );
        let mut raw = read_table_raw(&path).unwrap();
        let mut records = raw.records();
        assert_eq!(records[1].v, Some(-234.0));

        records[0].set(Field::V, 243.0);
        records[0].set(Field::Mpc, 3.5);
        raw.apply(&records, &ALL_FIELDS);
        raw.write(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("Name,morphology,v"));
        assert!(header.contains("mpc"));
        let first = lines.next().unwrap();
        assert!(first.contains("SAB(s)c"));
        assert!(first.contains("243.0"));
        assert!(first.contains("3.5"));
        let second = lines.next().unwrap();
        assert!(second.contains("IB(s)m"));
        assert!(second.contains("-234.0"));
    }

    #[test]
    fn no_sentinels_in_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let mut table = SourceTable::new("t");
        table.insert(CanonicalRecord::new("G1"));
        write_table(&path, &table, &ALL_FIELDS).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(!text.contains("-999"));
        assert!(text.lines().nth(1).unwrap().starts_with("G1,,"));
    }
}
