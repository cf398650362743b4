use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// The canonical attribute columns every source normalizes into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Lon,
    Lat,
    V,
    LogD25,
    LogR25,
    Pa,
    Mpc,
}

/// All canonical fields, in output column order.
pub const ALL_FIELDS: [Field; 7] = [
    Field::Lon,
    Field::Lat,
    Field::V,
    Field::LogD25,
    Field::LogR25,
    Field::Pa,
    Field::Mpc,
];

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Lon => "lon",
            Field::Lat => "lat",
            Field::V => "v",
            Field::LogD25 => "logd25",
            Field::LogR25 => "logr25",
            Field::Pa => "pa",
            Field::Mpc => "mpc",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lon" => Ok(Field::Lon),
            "lat" => Ok(Field::Lat),
            "v" => Ok(Field::V),
            "logd25" => Ok(Field::LogD25),
            "logr25" => Ok(Field::LogR25),
            "pa" => Ok(Field::Pa),
            "mpc" => Ok(Field::Mpc),
            other => Err(ConfigError::UnknownField(other.to_string())),
        }
    }
}

/// One row of the canonical table. Every attribute is optional: `None` means
/// the value is absent, which is distinct from any numeric value including 0.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    pub name: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    pub v: Option<f64>,
    pub logd25: Option<f64>,
    pub logr25: Option<f64>,
    pub pa: Option<f64>,
    pub mpc: Option<f64>,
}

impl CanonicalRecord {
    pub fn new(name: &str) -> Self {
        CanonicalRecord {
            name: normalize_name(name),
            lon: None,
            lat: None,
            v: None,
            logd25: None,
            logr25: None,
            pa: None,
            mpc: None,
        }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Lon => self.lon,
            Field::Lat => self.lat,
            Field::V => self.v,
            Field::LogD25 => self.logd25,
            Field::LogR25 => self.logr25,
            Field::Pa => self.pa,
            Field::Mpc => self.mpc,
        }
    }

    pub fn set(&mut self, field: Field, value: f64) {
        let slot = match field {
            Field::Lon => &mut self.lon,
            Field::Lat => &mut self.lat,
            Field::V => &mut self.v,
            Field::LogD25 => &mut self.logd25,
            Field::LogR25 => &mut self.logr25,
            Field::Pa => &mut self.pa,
            Field::Mpc => &mut self.mpc,
        };
        *slot = Some(value);
    }

    /// Fields from `tracked` that this record has no value for.
    pub fn missing(&self, tracked: &[Field]) -> Vec<Field> {
        tracked
            .iter()
            .copied()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }
}

/// Canonical object-name key: trimmed, inner whitespace collapsed, uppercased.
/// Catalog identifiers are case-insensitive and the sources disagree on both.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

/// One source's output for a batch run: at most one record per name.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub label: String,
    pub records: Vec<CanonicalRecord>,
}

impl SourceTable {
    pub fn new(label: &str) -> Self {
        SourceTable {
            label: label.to_string(),
            records: Vec::new(),
        }
    }

    /// Insert keeping the first occurrence per name.
    pub fn insert(&mut self, record: CanonicalRecord) {
        if self.find(&record.name).is_none() {
            self.records.push(record);
        }
    }

    /// Look up a record by already-normalized name.
    pub fn find(&self, name: &str) -> Option<&CanonicalRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
