//! Dynamic-page adapter: the NED by-name page.
//!
//! NED renders its object summary client-side, so the values are read off
//! fixed DOM element ids through a WebDriver session (JSON wire protocol
//! against a local chromedriver). The session is scoped to a single fetch
//! and deleted on every exit path, so a broken browser never leaks into the
//! next object.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::FetchError;
use crate::source::{RawRecord, SourceAdapter};

const BYNAME_URL: &str = "https://ned.ipac.caltech.edu/byname";
const W3C_ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";
const RENDER_POLL_TRIES: u32 = 20;
const RENDER_POLL_MS: u64 = 1000;

/// DOM element id → raw key, fixed ids of the rendered summary table.
const ELEMENT_KEYS: [(&str, &str); 4] = [
    ("allbyname_11", "lon"),
    ("allbyname_12", "lat"),
    ("allbyname_19", "v"),
    ("allbyname_26", "mpc"),
];

pub struct NedPageAdapter {
    client: reqwest::Client,
    webdriver_url: String,
}

impl NedPageAdapter {
    pub fn new(client: reqwest::Client, webdriver_url: &str) -> Self {
        NedPageAdapter {
            client,
            webdriver_url: webdriver_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_in_session(
        &self,
        session: &WebDriverSession<'_>,
        name: &str,
    ) -> Result<RawRecord, FetchError> {
        let url = reqwest::Url::parse_with_params(BYNAME_URL, &[("objname", name)])
            .map_err(|e| FetchError::Session(e.to_string()))?;
        session.navigate(url.as_str()).await?;

        // The summary table fills in asynchronously; poll for the first id.
        let (anchor_id, _) = ELEMENT_KEYS[0];
        let mut rendered = false;
        for _ in 0..RENDER_POLL_TRIES {
            if session.find_element(&css_id(anchor_id)).await?.is_some() {
                rendered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(RENDER_POLL_MS)).await;
        }
        if !rendered {
            let source = session.page_source().await?;
            if source.to_ascii_lowercase().contains("not found") {
                return Err(FetchError::NotFound);
            }
            return Err(FetchError::StructureMismatch(
                "summary table did not render".to_string(),
            ));
        }

        let mut raw = RawRecord::new(name);
        for (element_id, key) in ELEMENT_KEYS {
            if let Some(el) = session.find_element(&css_id(element_id)).await? {
                raw.set(key, &session.element_text(&el).await?);
            }
        }
        Ok(raw)
    }
}

#[async_trait]
impl SourceAdapter for NedPageAdapter {
    fn label(&self) -> &'static str {
        "ned-page"
    }

    async fn fetch(&self, name: &str) -> Result<RawRecord, FetchError> {
        let session = WebDriverSession::start(&self.client, &self.webdriver_url).await?;
        let result = self.fetch_in_session(&session, name).await;
        session.close().await;
        result
    }
}

fn css_id(id: &str) -> String {
    format!("#{id}")
}

/// One live browser session. Created per fetch, closed unconditionally.
struct WebDriverSession<'a> {
    client: &'a reqwest::Client,
    base: String,
    id: String,
}

impl<'a> WebDriverSession<'a> {
    async fn start(client: &'a reqwest::Client, base: &str) -> Result<Self, FetchError> {
        let caps = json!({
            "capabilities": {
                "alwaysMatch": {
                    "goog:chromeOptions": {
                        "args": ["--headless=new", "--no-sandbox", "--disable-dev-shm-usage"]
                    }
                }
            }
        });
        let value = post_json(client, &format!("{base}/session"), &caps).await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::Session("no sessionId in response".to_string()))?
            .to_string();
        Ok(WebDriverSession {
            client,
            base: base.to_string(),
            id,
        })
    }

    async fn navigate(&self, url: &str) -> Result<(), FetchError> {
        post_json(
            self.client,
            &format!("{}/session/{}/url", self.base, self.id),
            &json!({ "url": url }),
        )
        .await?;
        Ok(())
    }

    /// Look up an element by CSS selector; `Ok(None)` when it does not exist.
    async fn find_element(&self, selector: &str) -> Result<Option<String>, FetchError> {
        let url = format!("{}/session/{}/element", self.base, self.id);
        let body = json!({ "using": "css selector", "value": selector });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(FetchError::from)?;
        let value = unwrap_value(resp.json().await.map_err(FetchError::from)?);
        if value.get("error").is_some() {
            return Ok(None);
        }
        Ok(extract_element_id(&value))
    }

    async fn element_text(&self, element_id: &str) -> Result<String, FetchError> {
        let url = format!(
            "{}/session/{}/element/{}/text",
            self.base, self.id, element_id
        );
        let value = get_json(self.client, &url).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_source(&self) -> Result<String, FetchError> {
        let url = format!("{}/session/{}/source", self.base, self.id);
        let value = get_json(self.client, &url).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Delete the session; failures are logged, never propagated, so teardown
    /// cannot mask the fetch result.
    async fn close(self) {
        let url = format!("{}/session/{}", self.base, self.id);
        if let Err(e) = self.client.delete(&url).send().await {
            warn!("Failed to close WebDriver session {}: {}", self.id, e);
        }
    }
}

fn unwrap_value(body: Value) -> Value {
    body.get("value").cloned().unwrap_or(Value::Null)
}

fn extract_element_id(value: &Value) -> Option<String> {
    value
        .get(W3C_ELEMENT_KEY)
        .and_then(Value::as_str)
        .map(str::to_string)
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> Result<Value, FetchError> {
    let resp = client
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(FetchError::from)?;
    let status = resp.status();
    let value = unwrap_value(resp.json().await.map_err(FetchError::from)?);
    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("webdriver request failed");
        return Err(FetchError::Session(format!("{status}: {message}")));
    }
    Ok(value)
}

async fn get_json(client: &reqwest::Client, url: &str) -> Result<Value, FetchError> {
    let resp = client.get(url).send().await.map_err(FetchError::from)?;
    Ok(unwrap_value(resp.json().await.map_err(FetchError::from)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_id_extraction() {
        let value = json!({ W3C_ELEMENT_KEY: "abc-123" });
        assert_eq!(extract_element_id(&value), Some("abc-123".to_string()));
        assert_eq!(extract_element_id(&json!({})), None);
    }

    #[test]
    fn value_unwrapping() {
        let body = json!({ "value": { "sessionId": "s1" } });
        assert_eq!(
            unwrap_value(body).get("sessionId").and_then(Value::as_str),
            Some("s1")
        );
        assert_eq!(unwrap_value(json!({})), Value::Null);
    }

    #[test]
    fn element_ids_cover_expected_fields() {
        let keys: Vec<&str> = ELEMENT_KEYS.iter().map(|(_, k)| *k).collect();
        assert_eq!(keys, ["lon", "lat", "v", "mpc"]);
    }
}
