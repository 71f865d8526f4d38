use super::{PageContext, SearchPlan};
use crate::error::{Result, ScoutError};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const COOKIE_BANNER_SCRIPT: &str = r#"
    const button = document.querySelector(
        'button[id*="accept"], button[data-cookiebanner*="accept"], button[aria-label*="Allow"], #gdpr-banner-accept'
    );
    if (button) button.click();
"#;

/// A live tab in headless Chrome. Script-rendered marketplaces (Facebook)
/// need this; the snapshot is whatever the tab shows at call time.
pub struct BrowserPage {
    // Keeps the Chrome process alive for as long as the tab is in use
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserPage {
    /// Launch Chrome and open `url`
    pub async fn launch(url: &str, headless: bool) -> Result<Self> {
        let url = url.to_string();
        tokio::task::spawn_blocking(move || Self::launch_blocking(&url, headless))
            .await
            .map_err(|e| ScoutError::transport(format!("Browser task failed: {e}")))?
    }

    fn launch_blocking(url: &str, headless: bool) -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(headless)
            .build()
            .map_err(|e| ScoutError::transport(format!("Failed to build launch options: {e}")))?;

        let browser = Browser::new(options)
            .map_err(|e| ScoutError::transport(format!("Failed to launch Chrome browser: {e}")))?;

        let tab = browser
            .new_tab()
            .map_err(|e| ScoutError::transport(format!("Failed to open tab: {e}")))?;

        info!("Opening {}", url);
        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| ScoutError::transport(format!("Failed to load {url}: {e}")))?;

        if let Err(e) = tab.evaluate(COOKIE_BANNER_SCRIPT, false) {
            debug!("Cookie banner dismissal skipped: {}", e);
        }

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    /// Run blocking CDP calls off the async runtime
    async fn with_tab<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| ScoutError::transport(format!("Browser task failed: {e}")))?
    }
}

/// Script that fills the input, fires the events frameworks listen for,
/// and submits. Evaluates to `false` if the input is gone.
pub(crate) fn search_script(plan: &SearchPlan) -> Result<String> {
    let selector = serde_json::to_string(&plan.input_selector)?;
    let query = serde_json::to_string(&plan.query)?;
    let submit = serde_json::to_string(&plan.submit_selector)?;

    Ok(format!(
        r#"(() => {{
    const input = document.querySelector({selector});
    if (!input) return false;
    input.focus();
    const setter = Object.getOwnPropertyDescriptor(window.HTMLInputElement.prototype, 'value').set;
    setter.call(input, {query});
    input.dispatchEvent(new Event('input', {{ bubbles: true }}));
    input.dispatchEvent(new Event('change', {{ bubbles: true }}));
    const submitSelector = {submit};
    const button = submitSelector ? document.querySelector(submitSelector) : null;
    if (button) {{
        button.click();
        return true;
    }}
    for (const type of ['keydown', 'keypress', 'keyup']) {{
        input.dispatchEvent(new KeyboardEvent(type, {{ key: 'Enter', code: 'Enter', keyCode: 13, which: 13, bubbles: true }}));
    }}
    if (input.form && typeof input.form.requestSubmit === 'function') input.form.requestSubmit();
    return true;
}})()"#
    ))
}

#[async_trait]
impl PageContext for BrowserPage {
    async fn url(&self) -> Result<String> {
        self.with_tab(|tab| Ok(tab.get_url())).await
    }

    async fn html(&self) -> Result<String> {
        self.with_tab(|tab| {
            let result = tab
                .evaluate("document.documentElement.outerHTML", false)
                .map_err(|e| ScoutError::transport(format!("Unable to read page: {e}")))?;
            match result.value.as_ref().and_then(|v| v.as_str()) {
                Some(html) => Ok(html.to_string()),
                None => {
                    warn!("Could not get HTML from page");
                    Ok(String::new())
                }
            }
        })
        .await
    }

    async fn perform_search(&self, plan: &SearchPlan) -> Result<bool> {
        let script = search_script(plan)?;
        let submitted = self
            .with_tab(move |tab| {
                let result = tab
                    .evaluate(&script, false)
                    .map_err(|e| ScoutError::transport(format!("Unable to run search: {e}")))?;
                Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
            })
            .await?;

        if submitted {
            // Give a full-page submit a chance to start before anyone polls
            tokio::time::sleep(Duration::from_millis(300)).await;
            if let Err(e) = self.with_tab(|tab| {
                tab.wait_until_navigated()
                    .map(|_| ())
                    .map_err(|e| ScoutError::transport(e.to_string()))
            })
            .await
            {
                debug!("No navigation after search submit: {}", e);
            }
        }
        Ok(submitted)
    }
}
