use std::time::Duration;

use reqwest::Client;

use super::{Browser, BrowserError, Element, Launcher, Page};
use crate::config::ExtractorConfig;

fn from_http(url: &str, operation: &str, err: reqwest::Error) -> BrowserError {
    if err.is_timeout() {
        BrowserError::Timeout {
            url: url.to_string(),
        }
    } else {
        BrowserError::driver(operation, err)
    }
}

/// Session that fetches pages over HTTP and evaluates selectors on the
/// returned markup. Scripts are not executed.
#[derive(Debug)]
pub struct HttpBrowser {
    client: Client,
    page: Option<Page>,
}

impl HttpBrowser {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| BrowserError::driver("launch", e))?;

        log::debug!("Browser session opened");
        Ok(Self { client, page: None })
    }

    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::driver("find_element", "no page loaded"))
    }
}

impl Browser for HttpBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        log::debug!("Navigating to {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .inspect_err(|e| log::error!("HTTP error: {e:?}"))
            .map_err(|e| from_http(url, "navigate", e))?
            .error_for_status()
            .map_err(|e| from_http(url, "navigate", e))?;

        let final_url = response.url().to_string();
        let html = response
            .text()
            .await
            .inspect_err(|e| log::error!("Decode error: {e:?}"))
            .map_err(|e| from_http(url, "read_body", e))?;

        self.page = Some(Page::new(&final_url, html)?);
        Ok(())
    }

    fn find_element_text(&self, selector: &str) -> Result<String, BrowserError> {
        self.page()?.find_element_text(selector)
    }

    fn find_elements(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        self.page()?.find_elements(selector)
    }
}

impl Drop for HttpBrowser {
    fn drop(&mut self) {
        log::debug!("Browser session closed");
    }
}

#[derive(Debug, Clone)]
pub struct HttpLauncher {
    timeout: Duration,
    user_agent: String,
}

impl HttpLauncher {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            timeout: config.timeout,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Launcher for HttpLauncher {
    type Session = HttpBrowser;

    async fn launch(&self) -> Result<HttpBrowser, BrowserError> {
        HttpBrowser::new(self.timeout, &self.user_agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_before_navigation_fails() {
        let browser = HttpBrowser::new(Duration::from_secs(1), "test/0").unwrap();
        assert!(browser.find_elements("a").is_err());
    }
}
