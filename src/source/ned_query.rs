//! Catalog-query adapter #2: the NED object-search API.
//!
//! `objsearch?objname=<name>&of=xml_main` returns a VOTable document: FIELD
//! declarations followed by a TABLEDATA block with at most one row for a
//! by-name lookup. Only the equatorial position and radial velocity columns
//! are extracted; the normalizer converts to galactic coordinates.

use async_trait::async_trait;
use quick_xml::events::Event;

use crate::error::FetchError;
use crate::source::{get_text, RawRecord, SourceAdapter};

const OBJSEARCH_URL: &str = "https://ned.ipac.caltech.edu/cgi-bin/objsearch";

pub struct NedQueryAdapter {
    client: reqwest::Client,
}

impl NedQueryAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        NedQueryAdapter { client }
    }
}

#[async_trait]
impl SourceAdapter for NedQueryAdapter {
    fn label(&self) -> &'static str {
        "ned-query"
    }

    async fn fetch(&self, name: &str) -> Result<RawRecord, FetchError> {
        let body = get_text(
            &self.client,
            OBJSEARCH_URL,
            &[("objname", name), ("of", "xml_main")],
        )
        .await?;
        parse_votable(name, &body)
    }
}

fn parse_votable(name: &str, xml: &str) -> Result<RawRecord, FetchError> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut fields: Vec<String> = Vec::new();
    let mut cells: Vec<String> = Vec::new();
    let mut in_first_row = false;
    let mut in_cell = false;
    let mut row_seen = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"FIELD" => {
                let attr = e
                    .try_get_attribute("name")
                    .map_err(|e| FetchError::StructureMismatch(e.to_string()))?;
                if let Some(attr) = attr {
                    let value = attr
                        .unescape_value()
                        .map_err(|e| FetchError::StructureMismatch(e.to_string()))?;
                    fields.push(value.to_string());
                }
            }
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"TR" if !row_seen => {
                    in_first_row = true;
                    row_seen = true;
                }
                b"TD" if in_first_row => {
                    in_cell = true;
                    cells.push(String::new());
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if e.name().as_ref() == b"TD" && in_first_row => {
                cells.push(String::new());
            }
            Ok(Event::Text(e)) if in_cell => {
                let text = e
                    .unescape()
                    .map_err(|e| FetchError::StructureMismatch(e.to_string()))?;
                cells.last_mut().expect("cell open").push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"TD" => in_cell = false,
                b"TR" => in_first_row = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(FetchError::StructureMismatch(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if fields.is_empty() {
        return Err(FetchError::StructureMismatch(
            "no FIELD declarations in VOTable".to_string(),
        ));
    }
    if !row_seen {
        return Err(FetchError::NotFound);
    }

    let mut raw = RawRecord::new(name);
    for (field, cell) in fields.iter().zip(cells.iter()) {
        if let Some(key) = column_key(field) {
            raw.set(key, cell);
        }
    }
    Ok(raw)
}

/// Map a VOTable column name onto the raw keys the normalizer understands.
fn column_key(field: &str) -> Option<&'static str> {
    let upper = field.to_ascii_uppercase();
    if upper == "RA" || upper == "RA(DEG)" {
        Some("ra")
    } else if upper == "DEC" || upper == "DEC(DEG)" {
        Some("dec")
    } else if upper == "VELOCITY" {
        Some("velocity")
    } else {
        None
    }
}
