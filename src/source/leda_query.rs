//! Catalog-query adapter #1: the HyperLeda data-access CGI.
//!
//! `fG.cgi?n=meandata&c=o&o=<name>&a=csv[...]` returns comment-prefixed CSV
//! with one header row of the requested column codes and at most one data row.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::source::{get_text, RawRecord, SourceAdapter};

const QUERY_URL: &str = "http://atlas.obs-hp.fr/hyperleda/fG.cgi";
const PROPERTIES: &str = "l2,b2,v,logd25,logr25,pa";

pub struct LedaQueryAdapter {
    client: reqwest::Client,
}

impl LedaQueryAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        LedaQueryAdapter { client }
    }
}

#[async_trait]
impl SourceAdapter for LedaQueryAdapter {
    fn label(&self) -> &'static str {
        "leda-query"
    }

    async fn fetch(&self, name: &str) -> Result<RawRecord, FetchError> {
        let select = format!("csv[{PROPERTIES}]");
        let body = get_text(
            &self.client,
            QUERY_URL,
            &[("n", "meandata"), ("c", "o"), ("o", name), ("a", &select)],
        )
        .await?;
        parse_response(name, &body)
    }
}

fn parse_response(name: &str, body: &str) -> Result<RawRecord, FetchError> {
    let mut lines = body
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'));

    let header = lines.next().ok_or_else(|| {
        FetchError::StructureMismatch("empty response, no header row".to_string())
    })?;
    if !header.split(',').any(|c| c.trim() == "l2") {
        return Err(FetchError::StructureMismatch(format!(
            "unexpected header row {header:?}"
        )));
    }
    let data = lines.next().ok_or(FetchError::NotFound)?;

    let mut raw = RawRecord::new(name);
    for (key, value) in header.split(',').zip(data.split(',')) {
        raw.set(key.trim(), value);
    }
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_row() {
        let body = "# HyperLeda meandata\n\
                    # query: o=NGC0253\n\
                    l2,b2,v,logd25,logr25,pa\n\
                    97.3693,-87.9639,243.0,2.43,0.61,52.0\n";
        let raw = parse_response("NGC 253", body).unwrap();
        assert_eq!(raw.get("l2"), Some("97.3693"));
        assert_eq!(raw.get("pa"), Some("52.0"));
    }

    #[test]
    fn empty_cells_stay_absent() {
        let body = "l2,b2,v,logd25,logr25,pa\n97.3693,-87.9639,243.0,,,\n";
        let raw = parse_response("G1", body).unwrap();
        assert_eq!(raw.get("v"), Some("243.0"));
        assert_eq!(raw.get("logd25"), None);
        assert_eq!(raw.get("pa"), None);
    }

    #[test]
    fn header_without_data_is_not_found() {
        let body = "# no match\nl2,b2,v,logd25,logr25,pa\n";
        assert!(matches!(
            parse_response("NOPE", body).unwrap_err(),
            FetchError::NotFound
        ));
    }

    #[test]
    fn unexpected_header_is_structure_mismatch() {
        let body = "<html>maintenance</html>\n";
        assert!(matches!(
            parse_response("G1", body).unwrap_err(),
            FetchError::StructureMismatch(_)
        ));
    }
}
