//! Static-page adapter: HyperLeda `ledacat` object page.
//!
//! The page layout is a versioned external contract: the mean-data parameters
//! are `label | value` rows of the sixth `<table>`, the galactic coordinates
//! sit in the fourth table in the row labeled "Galactic (IAU1958)". Anything
//! else is a structure mismatch, never a silent mis-parse.

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::error::FetchError;
use crate::source::{get_text, RawRecord, SourceAdapter};

const CATALOG_URL: &str = "http://atlas.obs-hp.fr/hyperleda/ledacat.cgi";
const PARAM_TABLE_IDX: usize = 5;
const COORD_TABLE_IDX: usize = 3;
const PARAM_LABELS: [&str; 5] = ["v", "logd25", "logr25", "pa", "modbest"];
const GAL_COORD_LABEL: &str = "Galactic (IAU1958)";

pub struct LedaPageAdapter {
    client: reqwest::Client,
}

impl LedaPageAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        LedaPageAdapter { client }
    }
}

#[async_trait]
impl SourceAdapter for LedaPageAdapter {
    fn label(&self) -> &'static str {
        "leda-page"
    }

    async fn fetch(&self, name: &str) -> Result<RawRecord, FetchError> {
        let body = get_text(&self.client, CATALOG_URL, &[("o", name)]).await?;
        parse_page(name, &body)
    }
}

fn parse_page(name: &str, body: &str) -> Result<RawRecord, FetchError> {
    let doc = Html::parse_document(body);
    let table_sel = Selector::parse("table").expect("static selector");
    let row_sel = Selector::parse("tr").expect("static selector");
    let cell_sel = Selector::parse("td").expect("static selector");

    let tables: Vec<_> = doc.select(&table_sel).collect();
    if tables.len() <= PARAM_TABLE_IDX {
        let lower = body.to_ascii_lowercase();
        if lower.contains("not found") || lower.contains("incorrect") {
            return Err(FetchError::NotFound);
        }
        return Err(FetchError::StructureMismatch(format!(
            "expected at least {} tables, found {}",
            PARAM_TABLE_IDX + 1,
            tables.len()
        )));
    }

    let mut raw = RawRecord::new(name);

    for row in tables[PARAM_TABLE_IDX].select(&row_sel) {
        let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
        if cells.len() < 2 {
            continue;
        }
        if let Some(label) = PARAM_LABELS.iter().find(|l| cells[0] == **l) {
            raw.set(label, &cells[1]);
        }
    }

    for row in tables[COORD_TABLE_IDX].select(&row_sel) {
        let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
        if cells.len() >= 2 && cells[0].contains(GAL_COORD_LABEL) {
            raw.set("galcoord", &cells[1]);
            break;
        }
    }

    Ok(raw)
}

fn cell_text(cell: scraper::ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(param_rows: &str, coord_rows: &str) -> String {
        // ledacat pages carry several layout tables before the data ones.
        let filler = "<table><tr><td>x</td></tr></table>";
        format!(
            "<html><body>{f}{f}{f}<table>{coord}</table>{f}<table>{param}</table></body></html>",
            f = filler,
            coord = coord_rows,
            param = param_rows,
        )
    }

    #[test]
    fn extracts_labeled_rows() {
        let body = page(
            "<tr><td>v</td><td>243.0 ±2.0</td></tr>\
             <tr><td>logd25</td><td>2.43</td></tr>\
             <tr><td>celposJ2000</td><td>ignored</td></tr>\
             <tr><td>modbest</td><td>27.70 ±0.21</td></tr>",
            "<tr><td>Galactic (IAU1958)</td><td>G097.3693-87.9639</td></tr>",
        );
        let raw = parse_page("NGC 253", &body).unwrap();
        assert_eq!(raw.get("v"), Some("243.0 ±2.0"));
        assert_eq!(raw.get("logd25"), Some("2.43"));
        assert_eq!(raw.get("modbest"), Some("27.70 ±0.21"));
        assert_eq!(raw.get("galcoord"), Some("G097.3693-87.9639"));
        assert_eq!(raw.get("celposJ2000"), None);
    }

    #[test]
    fn missing_rows_stay_absent() {
        let body = page("<tr><td>v</td><td>100</td></tr>", "");
        let raw = parse_page("G1", &body).unwrap();
        assert_eq!(raw.get("v"), Some("100"));
        assert_eq!(raw.get("pa"), None);
        assert_eq!(raw.get("galcoord"), None);
    }

    #[test]
    fn too_few_tables_is_structure_mismatch() {
        let err = parse_page("G1", "<html><body><table></table></body></html>").unwrap_err();
        assert!(matches!(err, FetchError::StructureMismatch(_)));
    }

    #[test]
    fn not_found_page() {
        let err = parse_page("NOPE", "<html><body>Object not found</body></html>").unwrap_err();
        assert!(matches!(err, FetchError::NotFound));
    }
}
