//! Catalog source adapters.
//!
//! One adapter per external source, all behind [`SourceAdapter`]. The closed
//! [`SourceKind`] set resolves to a concrete adapter + normalizer pair at
//! configuration time; nothing downstream inspects adapter types at runtime.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::coords::IcrsRotation;
use crate::error::{ConfigError, FetchError, ParseError};
use crate::normalize::{
    LedaPageNormalizer, LedaQueryNormalizer, NedPageNormalizer, NedQueryNormalizer,
};
use crate::schema::CanonicalRecord;

pub mod leda_page;
pub mod leda_query;
pub mod ned_page;
pub mod ned_query;

const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const USER_AGENT: &str = concat!("galcat/", env!("CARGO_PKG_VERSION"));

/// Untyped bag of values extracted from one source for one object. Ephemeral:
/// produced by an adapter, consumed by its paired normalizer, never merged.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub name: String,
    values: BTreeMap<String, String>,
}

impl RawRecord {
    pub fn new(name: &str) -> Self {
        RawRecord {
            name: name.to_string(),
            values: BTreeMap::new(),
        }
    }

    /// Store a value unless it is blank; a blank cell means the source has
    /// nothing for that key, and absence is modeled by the key not existing.
    pub fn set(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if !value.is_empty() {
            self.values.insert(key.to_string(), value.to_string());
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fetches one object's raw attributes from one external source.
///
/// Adapters are stateless between calls from the caller's perspective: any
/// session or connection they hold internally is scoped so that one object's
/// failure cannot corrupt the next call.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn label(&self) -> &'static str;
    async fn fetch(&self, name: &str) -> Result<RawRecord, FetchError>;
}

/// Translates one adapter's raw records into the canonical schema. Partial:
/// only keys present in the raw record produce canonical fields.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, raw: &RawRecord) -> Result<CanonicalRecord, ParseError>;
}

/// The closed set of supported sources, in default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    LedaQuery,
    LedaPage,
    NedPage,
    NedQuery,
}

/// Default trust order: the catalog's own data query outranks scraping its
/// HTML, and HyperLeda outranks NED for the morphology columns.
pub const DEFAULT_PRIORITY: [SourceKind; 4] = [
    SourceKind::LedaQuery,
    SourceKind::LedaPage,
    SourceKind::NedPage,
    SourceKind::NedQuery,
];

impl SourceKind {
    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::LedaQuery => "leda-query",
            SourceKind::LedaPage => "leda-page",
            SourceKind::NedPage => "ned-page",
            SourceKind::NedQuery => "ned-query",
        }
    }

    /// Resolve to a concrete adapter + normalizer pair.
    pub fn build(self, cfg: &SourceConfig) -> Result<Source, FetchError> {
        let client = http_client(cfg.timeout)?;
        let (adapter, normalizer): (Box<dyn SourceAdapter>, Box<dyn Normalizer>) = match self {
            SourceKind::LedaQuery => (
                Box::new(leda_query::LedaQueryAdapter::new(client)),
                Box::new(LedaQueryNormalizer),
            ),
            SourceKind::LedaPage => (
                Box::new(leda_page::LedaPageAdapter::new(client)),
                Box::new(LedaPageNormalizer),
            ),
            SourceKind::NedPage => (
                Box::new(ned_page::NedPageAdapter::new(client, &cfg.webdriver_url)),
                Box::new(NedPageNormalizer),
            ),
            SourceKind::NedQuery => (
                Box::new(ned_query::NedQueryAdapter::new(client)),
                Box::new(NedQueryNormalizer::new(Box::new(IcrsRotation))),
            ),
        };
        Ok(Source {
            kind: self,
            adapter,
            normalizer,
        })
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leda-query" => Ok(SourceKind::LedaQuery),
            "leda-page" => Ok(SourceKind::LedaPage),
            "ned-page" => Ok(SourceKind::NedPage),
            "ned-query" => Ok(SourceKind::NedQuery),
            other => Err(ConfigError::UnknownSource(other.to_string())),
        }
    }
}

/// A configured source: adapter plus its paired normalizer.
pub struct Source {
    pub kind: SourceKind,
    pub adapter: Box<dyn SourceAdapter>,
    pub normalizer: Box<dyn Normalizer>,
}

/// Shared adapter configuration.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Bound on every network call so one unreachable source cannot stall a
    /// batch indefinitely.
    pub timeout: Duration,
    /// WebDriver endpoint used by the dynamic-page adapter.
    pub webdriver_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            timeout: Duration::from_secs(10),
            webdriver_url: "http://localhost:9515".to_string(),
        }
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(FetchError::from)
}

/// GET a text body with bounded retry on transient statuses (429/5xx).
pub(crate) async fn get_text(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        let err = match client.get(url).query(query).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp.text().await?);
                }
                if status.as_u16() == 404 {
                    return Err(FetchError::NotFound);
                }
                FetchError::HttpStatus(status.as_u16())
            }
            Err(e) => FetchError::from(e),
        };

        if !err.is_retryable() || attempt == MAX_RETRIES {
            return Err(err);
        }
        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Transient error on {} (attempt {}/{}), backing off {:.1}s: {}",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64(),
            err
        );
        tokio::time::sleep(backoff).await;
        attempt += 1;
    }
}
