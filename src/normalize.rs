//! Per-source normalizers: raw extracted strings → canonical fields.
//!
//! Shared rules: the `-999.0` placeholder means "no data" and becomes
//! absence, never zero; numeric values keep only their first
//! whitespace-delimited token (sources append uncertainty figures after the
//! primary value); distance reported as a modulus is converted to Mpc here,
//! not at merge time.

use crate::coords::EquatorialToGalactic;
use crate::error::ParseError;
use crate::schema::{CanonicalRecord, Field};
use crate::source::{Normalizer, RawRecord};

/// Numeric placeholder several catalogs emit for "no data".
const SENTINEL: f64 = -999.0;

/// Parse the primary value of a raw string: first token only, sentinel maps
/// to absence.
pub fn parse_value(field: &'static str, raw: &str) -> Result<Option<f64>, ParseError> {
    let token = match raw.split_whitespace().next() {
        Some(t) => t,
        None => return Ok(None),
    };
    let value: f64 = token.parse().map_err(|_| ParseError::BadNumber {
        field,
        value: token.to_string(),
    })?;
    if value == SENTINEL {
        return Ok(None);
    }
    Ok(Some(value))
}

/// Split a packed coordinate pair like `G290.1412-36.7461` into
/// (`"290.1412"`, `"-36.7461"`). The embedded `+`/`-` signs the *second*
/// value; an optional leading frame letter is dropped.
pub fn split_packed_pair(raw: &str) -> Result<(String, String), ParseError> {
    let s = raw.trim().trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let split_at = s
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '+' || *c == '-')
        .map(|(i, _)| i)
        .ok_or_else(|| ParseError::BadCoordPair(raw.to_string()))?;
    let (first, second) = s.split_at(split_at);
    if first.is_empty() || second.len() < 2 {
        return Err(ParseError::BadCoordPair(raw.to_string()));
    }
    Ok((first.to_string(), second.to_string()))
}

/// Distance modulus → megaparsecs.
pub fn modulus_to_mpc(m: f64) -> f64 {
    10f64.powf((m - 25.0) / 5.0)
}

fn set_parsed(
    rec: &mut CanonicalRecord,
    field: Field,
    raw: Option<&str>,
) -> Result<(), ParseError> {
    if let Some(raw) = raw {
        if let Some(value) = parse_value(field.as_str(), raw)? {
            rec.set(field, value);
        }
    }
    Ok(())
}

/// Normalizer for the HyperLeda HTML page scrape.
///
/// Raw keys: `v`, `logd25`, `logr25`, `pa`, `modbest` (distance modulus) and
/// `galcoord` (packed lon/lat string from the coordinates table).
pub struct LedaPageNormalizer;

impl Normalizer for LedaPageNormalizer {
    fn normalize(&self, raw: &RawRecord) -> Result<CanonicalRecord, ParseError> {
        let mut rec = CanonicalRecord::new(&raw.name);
        set_parsed(&mut rec, Field::V, raw.get("v"))?;
        set_parsed(&mut rec, Field::LogD25, raw.get("logd25"))?;
        set_parsed(&mut rec, Field::LogR25, raw.get("logr25"))?;
        set_parsed(&mut rec, Field::Pa, raw.get("pa"))?;

        if let Some(packed) = raw.get("galcoord") {
            let (lon, lat) = split_packed_pair(packed)?;
            set_parsed(&mut rec, Field::Lon, Some(&lon))?;
            set_parsed(&mut rec, Field::Lat, Some(&lat))?;
        }

        if let Some(modbest) = raw.get("modbest") {
            if let Some(m) = parse_value("modbest", modbest)? {
                rec.set(Field::Mpc, modulus_to_mpc(m));
            }
        }
        Ok(rec)
    }
}

/// Normalizer for the HyperLeda data-query CGI (keys follow the catalog's
/// own column codes: `l2`/`b2` are galactic lon/lat).
pub struct LedaQueryNormalizer;

impl Normalizer for LedaQueryNormalizer {
    fn normalize(&self, raw: &RawRecord) -> Result<CanonicalRecord, ParseError> {
        let mut rec = CanonicalRecord::new(&raw.name);
        set_parsed(&mut rec, Field::Lon, raw.get("l2"))?;
        set_parsed(&mut rec, Field::Lat, raw.get("b2"))?;
        set_parsed(&mut rec, Field::V, raw.get("v"))?;
        set_parsed(&mut rec, Field::LogD25, raw.get("logd25"))?;
        set_parsed(&mut rec, Field::LogR25, raw.get("logr25"))?;
        set_parsed(&mut rec, Field::Pa, raw.get("pa"))?;
        Ok(rec)
    }
}

/// Normalizer for the rendered NED by-name page (values read off fixed DOM
/// elements, already in galactic degrees / km/s / Mpc).
pub struct NedPageNormalizer;

impl Normalizer for NedPageNormalizer {
    fn normalize(&self, raw: &RawRecord) -> Result<CanonicalRecord, ParseError> {
        let mut rec = CanonicalRecord::new(&raw.name);
        set_parsed(&mut rec, Field::Lon, raw.get("lon"))?;
        set_parsed(&mut rec, Field::Lat, raw.get("lat"))?;
        set_parsed(&mut rec, Field::V, raw.get("v"))?;
        set_parsed(&mut rec, Field::Mpc, raw.get("mpc"))?;
        Ok(rec)
    }
}

/// Normalizer for the NED object-search API. The API reports equatorial
/// RA/Dec; both must be present and are converted to galactic lon/lat before
/// anything is emitted — the canonical schema never mixes coordinate frames.
pub struct NedQueryNormalizer {
    converter: Box<dyn EquatorialToGalactic>,
}

impl NedQueryNormalizer {
    pub fn new(converter: Box<dyn EquatorialToGalactic>) -> Self {
        NedQueryNormalizer { converter }
    }
}

impl Normalizer for NedQueryNormalizer {
    fn normalize(&self, raw: &RawRecord) -> Result<CanonicalRecord, ParseError> {
        let mut rec = CanonicalRecord::new(&raw.name);

        let ra = raw.get("ra").map(|s| parse_value("ra", s)).transpose()?;
        let dec = raw.get("dec").map(|s| parse_value("dec", s)).transpose()?;
        if let (Some(Some(ra)), Some(Some(dec))) = (ra, dec) {
            let (lon, lat) = self.converter.to_galactic(ra, dec);
            rec.set(Field::Lon, lon);
            rec.set(Field::Lat, lat);
        }

        set_parsed(&mut rec, Field::V, raw.get("velocity"))?;
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedConverter;

    impl EquatorialToGalactic for FixedConverter {
        fn to_galactic(&self, _ra: f64, _dec: f64) -> (f64, f64) {
            (123.0, -45.0)
        }
    }

    #[test]
    fn first_token_only() {
        assert_eq!(parse_value("v", "1234.5 ±12.0").unwrap(), Some(1234.5));
    }

    #[test]
    fn sentinel_becomes_absent() {
        assert_eq!(parse_value("pa", "-999.0").unwrap(), None);
        assert_eq!(parse_value("pa", "-999").unwrap(), None);
    }

    #[test]
    fn zero_is_a_value() {
        assert_eq!(parse_value("lat", "0.0").unwrap(), Some(0.0));
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(parse_value("v", "n/a").is_err());
    }

    #[test]
    fn packed_pair_negative() {
        let (lon, lat) = split_packed_pair("G290.1412-36.7461").unwrap();
        assert_eq!(lon, "290.1412");
        assert_eq!(lat, "-36.7461");
    }

    #[test]
    fn packed_pair_positive() {
        let (lon, lat) = split_packed_pair("G123.4567+12.3456").unwrap();
        assert_eq!(lon, "123.4567");
        assert_eq!(lat, "+12.3456");
        assert_eq!(parse_value("lat", &lat).unwrap(), Some(12.3456));
    }

    #[test]
    fn packed_pair_without_sign_is_error() {
        assert!(split_packed_pair("G290.1412").is_err());
    }

    #[test]
    fn modulus_conversion() {
        assert!((modulus_to_mpc(30.0) - 10.0).abs() < 1e-12);
        assert!((modulus_to_mpc(25.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn leda_page_full_record() {
        let mut raw = RawRecord::new("NGC 253");
        raw.set("v", "243.0 ±2.0");
        raw.set("logd25", "2.43");
        raw.set("logr25", "0.61");
        raw.set("pa", "52.0");
        raw.set("modbest", "27.70 ±0.21");
        raw.set("galcoord", "G097.3693-87.9639");

        let rec = LedaPageNormalizer.normalize(&raw).unwrap();
        assert_eq!(rec.name, "NGC 253");
        assert_eq!(rec.v, Some(243.0));
        assert_eq!(rec.lon, Some(97.3693));
        assert_eq!(rec.lat, Some(-87.9639));
        let mpc = rec.mpc.unwrap();
        assert!((mpc - modulus_to_mpc(27.70)).abs() < 1e-12);
    }

    #[test]
    fn leda_page_partial_record() {
        let mut raw = RawRecord::new("G1");
        raw.set("v", "100");
        let rec = LedaPageNormalizer.normalize(&raw).unwrap();
        assert_eq!(rec.v, Some(100.0));
        assert_eq!(rec.lon, None);
        assert_eq!(rec.mpc, None);
    }

    #[test]
    fn ned_query_converts_coordinates() {
        let mut raw = RawRecord::new("G1");
        raw.set("ra", "11.888");
        raw.set("dec", "-25.288");
        raw.set("velocity", "243");
        let rec = NedQueryNormalizer::new(Box::new(FixedConverter))
            .normalize(&raw)
            .unwrap();
        assert_eq!(rec.lon, Some(123.0));
        assert_eq!(rec.lat, Some(-45.0));
        assert_eq!(rec.v, Some(243.0));
    }

    #[test]
    fn ned_query_needs_both_coordinates() {
        let mut raw = RawRecord::new("G1");
        raw.set("ra", "11.888");
        let rec = NedQueryNormalizer::new(Box::new(FixedConverter))
            .normalize(&raw)
            .unwrap();
        assert_eq!(rec.lon, None);
        assert_eq!(rec.lat, None);
    }
}
