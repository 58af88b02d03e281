use std::time::Duration;

use fantoccini::error::{CmdError, ErrorStatus};
use fantoccini::wd::TimeoutConfiguration;
use fantoccini::{Client, ClientBuilder};
use serde_json::{Map, Value, json};

use super::{Browser, BrowserError, Element, Launcher, Page};
use crate::config::{Engine, ExtractorConfig};

fn from_cmd(url: &str, operation: &str, err: CmdError) -> BrowserError {
    match err {
        CmdError::Standard(ref e) if matches!(e.error, ErrorStatus::Timeout) => {
            BrowserError::Timeout {
                url: url.to_string(),
            }
        }
        other => BrowserError::driver(operation, other),
    }
}

/// Headless browser capabilities for `engine`, with the user agent overridden.
fn capabilities(engine: Engine, user_agent: &str) -> Map<String, Value> {
    let mut caps = Map::new();
    match engine {
        Engine::Chrome => {
            caps.insert("browserName".to_string(), json!("chrome"));
            caps.insert(
                "goog:chromeOptions".to_string(),
                json!({
                    "args": ["--headless=new", "--disable-gpu", format!("--user-agent={}", user_agent)]
                }),
            );
        }
        Engine::Firefox | Engine::Http => {
            caps.insert("browserName".to_string(), json!("firefox"));
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({
                    "args": ["-headless"],
                    "prefs": { "general.useragent.override": user_agent }
                }),
            );
        }
    }
    caps
}

/// Session on a WebDriver-controlled browser. Pages are rendered by the
/// browser, selectors run on the rendered DOM.
///
/// The WebDriver session is deleted once the client is dropped.
pub struct WebDriverBrowser {
    client: Client,
    render_wait: Duration,
    page: Option<Page>,
}

impl WebDriverBrowser {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::driver("find_element", "no page loaded"))
    }
}

impl Browser for WebDriverBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        log::debug!("Navigating to {}", url);
        self.client
            .goto(url)
            .await
            .inspect_err(|e| log::error!("WebDriver error: {e:?}"))
            .map_err(|e| from_cmd(url, "navigate", e))?;

        if !self.render_wait.is_zero() {
            tokio::time::sleep(self.render_wait).await;
        }

        let current = self
            .client
            .current_url()
            .await
            .map_err(|e| from_cmd(url, "current_url", e))?;
        let html = self
            .client
            .source()
            .await
            .map_err(|e| from_cmd(url, "page_source", e))?;

        self.page = Some(Page::new(current.as_str(), html)?);
        Ok(())
    }

    fn find_element_text(&self, selector: &str) -> Result<String, BrowserError> {
        self.page()?.find_element_text(selector)
    }

    fn find_elements(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        self.page()?.find_elements(selector)
    }
}

impl Drop for WebDriverBrowser {
    fn drop(&mut self) {
        log::debug!("Browser session closed");
    }
}

#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    engine: Engine,
    webdriver_url: String,
    timeout: Duration,
    render_wait: Duration,
    user_agent: String,
}

impl WebDriverLauncher {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            engine: config.engine,
            webdriver_url: config.webdriver_url.clone(),
            timeout: config.timeout,
            render_wait: config.render_wait,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Launcher for WebDriverLauncher {
    type Session = WebDriverBrowser;

    async fn launch(&self) -> Result<WebDriverBrowser, BrowserError> {
        log::debug!("Connecting to {} at {}", self.engine, self.webdriver_url);
        let mut builder = ClientBuilder::native();
        builder.capabilities(capabilities(self.engine, &self.user_agent));
        let client = builder
            .connect(&self.webdriver_url)
            .await
            .inspect_err(|e| log::error!("WebDriver error: {e:?}"))
            .map_err(|e| BrowserError::driver("launch", e))?;

        client
            .update_timeouts(TimeoutConfiguration::new(None, Some(self.timeout), None))
            .await
            .map_err(|e| BrowserError::driver("set_timeouts", e))?;

        log::debug!("Browser session opened");
        Ok(WebDriverBrowser {
            client,
            render_wait: self.render_wait,
            page: None,
        })
    }
}
