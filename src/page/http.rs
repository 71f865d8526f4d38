use super::{PageContext, SearchPlan};
use crate::error::{Result, ScoutError};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug)]
struct Snapshot {
    url: Url,
    html: String,
}

/// Server-rendered page fetched over HTTP. No script runs, so this only
/// suits marketplaces that render results on the server (Craigslist,
/// eBay); "search" submits the enclosing GET form.
pub struct HttpPage {
    client: Client,
    snapshot: Mutex<Snapshot>,
}

impl HttpPage {
    /// Fetch `url` and keep the response as the current document
    pub async fn open(url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ScoutError::transport(format!("Failed to create HTTP client: {e}")))?;

        let url = Url::parse(url)
            .map_err(|e| ScoutError::transport(format!("Invalid page URL {url:?}: {e}")))?;
        let (url, html) = fetch(&client, url).await?;

        Ok(Self {
            client,
            snapshot: Mutex::new(Snapshot { url, html }),
        })
    }

    fn replace(&self, url: Url, html: String) {
        let mut snapshot = self.snapshot.lock().unwrap_or_else(PoisonError::into_inner);
        snapshot.url = url;
        snapshot.html = html;
    }

    fn current_url(&self) -> Url {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .url
            .clone()
    }
}

async fn fetch(client: &Client, url: Url) -> Result<(Url, String)> {
    debug!("Fetching URL: {}", url);

    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| ScoutError::transport(format!("Failed to fetch {url}: {e}")))?;

    if !response.status().is_success() {
        warn!("{} returned status: {}", url, response.status());
        return Err(ScoutError::transport(format!(
            "Failed to fetch {url}: {}",
            response.status()
        )));
    }

    // Redirects land us somewhere else; that is the page now
    let final_url = response.url().clone();
    let html = response
        .text()
        .await
        .map_err(|e| ScoutError::transport(format!("Failed to read response body: {e}")))?;

    debug!("Downloaded {} bytes of HTML", html.len());
    Ok((final_url, html))
}

/// Where a GET form would navigate for `plan`
pub(crate) fn form_target(current: &Url, plan: &SearchPlan) -> Option<Url> {
    if !plan.form_method.eq_ignore_ascii_case("get") {
        return None;
    }
    let name = plan.input_name.as_deref()?;
    let mut target = match plan.form_action.as_deref() {
        Some(action) => current.join(action).ok()?,
        None => current.clone(),
    };
    target.set_query(None);
    target.query_pairs_mut().append_pair(name, &plan.query);
    Some(target)
}

#[async_trait]
impl PageContext for HttpPage {
    async fn url(&self) -> Result<String> {
        Ok(self.current_url().to_string())
    }

    async fn html(&self) -> Result<String> {
        Ok(self
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .html
            .clone())
    }

    async fn perform_search(&self, plan: &SearchPlan) -> Result<bool> {
        let Some(target) = form_target(&self.current_url(), plan) else {
            warn!("Search form is not a plain GET form; cannot submit without a browser");
            return Ok(false);
        };

        info!("Submitting search form: {}", target);
        let (url, html) = fetch(&self.client, target).await?;
        self.replace(url, html);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(action: Option<&str>, method: &str) -> SearchPlan {
        SearchPlan {
            query: "road bike".to_string(),
            input_selector: r#"input[name="query"]"#.to_string(),
            input_name: Some("query".to_string()),
            form_action: action.map(str::to_string),
            form_method: method.to_string(),
            submit_selector: None,
        }
    }

    #[test]
    fn test_get_form_target() {
        let current = Url::parse("https://seattle.craigslist.org/search/sss?query=old").unwrap();
        assert_eq!(
            form_target(&current, &plan(Some("/search/bia"), "GET")).unwrap().as_str(),
            "https://seattle.craigslist.org/search/bia?query=road+bike"
        );
        assert_eq!(
            form_target(&current, &plan(None, "get")).unwrap().as_str(),
            "https://seattle.craigslist.org/search/sss?query=road+bike"
        );
        assert!(form_target(&current, &plan(None, "post")).is_none());
    }
}
