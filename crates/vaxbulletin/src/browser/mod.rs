use std::collections::HashMap;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::config::ExtractorConfig;

mod http;
mod webdriver;

pub use http::{HttpBrowser, HttpLauncher};
pub use webdriver::{WebDriverBrowser, WebDriverLauncher};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    #[error("Timed out loading {url}")]
    Timeout { url: String },
    #[error("Browser operation '{operation}' failed: {reason}")]
    Driver { operation: String, reason: String },
}

impl BrowserError {
    pub fn driver(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Driver {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

/// A located DOM element: its rendered text and its properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub text: String,
    properties: HashMap<String, String>,
}

impl Element {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Capability surface the extractor needs from a browser session.
///
/// Lookups run against the page loaded by the most recent `navigate`.
#[allow(async_fn_in_trait)]
pub trait Browser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    fn find_element_text(&self, selector: &str) -> Result<String, BrowserError>;

    fn find_elements(&self, selector: &str) -> Result<Vec<Element>, BrowserError>;
}

/// Opens browser sessions. A session is released when it is dropped.
#[allow(async_fn_in_trait)]
pub trait Launcher {
    type Session: Browser;

    async fn launch(&self) -> Result<Self::Session, BrowserError>;
}

/// Launches sessions on the engine picked in [`ExtractorConfig::engine`].
#[derive(Debug, Clone)]
pub enum EngineLauncher {
    Http(HttpLauncher),
    WebDriver(WebDriverLauncher),
}

impl EngineLauncher {
    pub fn new(config: &ExtractorConfig) -> Self {
        if config.engine.is_webdriver() {
            EngineLauncher::WebDriver(WebDriverLauncher::new(config))
        } else {
            EngineLauncher::Http(HttpLauncher::new(config))
        }
    }
}

impl Launcher for EngineLauncher {
    type Session = EngineSession;

    async fn launch(&self) -> Result<EngineSession, BrowserError> {
        match self {
            EngineLauncher::Http(l) => l.launch().await.map(EngineSession::Http),
            EngineLauncher::WebDriver(l) => l.launch().await.map(EngineSession::WebDriver),
        }
    }
}

pub enum EngineSession {
    Http(HttpBrowser),
    WebDriver(WebDriverBrowser),
}

impl Browser for EngineSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        match self {
            EngineSession::Http(b) => b.navigate(url).await,
            EngineSession::WebDriver(b) => b.navigate(url).await,
        }
    }

    fn find_element_text(&self, selector: &str) -> Result<String, BrowserError> {
        match self {
            EngineSession::Http(b) => b.find_element_text(selector),
            EngineSession::WebDriver(b) => b.find_element_text(selector),
        }
    }

    fn find_elements(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        match self {
            EngineSession::Http(b) => b.find_elements(selector),
            EngineSession::WebDriver(b) => b.find_elements(selector),
        }
    }
}

/// A loaded document. Stored as source text and parsed per lookup so that
/// sessions stay `Send`.
#[derive(Debug, Clone)]
pub struct Page {
    url: Url,
    html: String,
}

impl Page {
    pub fn new(url: &str, html: impl Into<String>) -> Result<Self, BrowserError> {
        let url = Url::parse(url).map_err(|e| BrowserError::driver("navigate", e))?;
        Ok(Self {
            url,
            html: html.into(),
        })
    }

    pub fn find_element_text(&self, selector: &str) -> Result<String, BrowserError> {
        let parsed = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        document
            .select(&parsed)
            .next()
            .map(elem_text)
            .ok_or_else(|| {
                BrowserError::driver(
                    format!("find_element({})", selector),
                    format!("no element on {}", self.url),
                )
            })
    }

    pub fn find_elements(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(&self.html);
        Ok(document
            .select(&selector)
            .map(|e| self.to_element(e))
            .collect())
    }

    fn to_element(&self, element: ElementRef) -> Element {
        let mut out = Element::new(elem_text(element));
        for (name, value) in element.value().attrs() {
            // href/src properties are absolute in a browser, attributes are not
            let value = match name {
                "href" | "src" => self
                    .url
                    .join(value)
                    .map(String::from)
                    .unwrap_or_else(|_| value.to_string()),
                _ => value.to_string(),
            };
            out = out.with_property(name, value);
        }
        out
    }
}

fn parse_selector(selector: &str) -> Result<Selector, BrowserError> {
    Selector::parse(selector).map_err(|e| {
        BrowserError::driver(format!("parse_selector({})", selector), format!("{e:?}"))
    })
}

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "table", "tbody", "tfoot", "thead", "tr", "ul",
];

/// Rendered text of an element: one line per block, whitespace collapsed
/// within a line, inline elements joined as-is.
fn elem_text(element: ElementRef) -> String {
    let mut raw = String::new();
    push_text(element, &mut raw);
    raw.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.extend(text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }));
        } else if let Some(child) = ElementRef::wrap(child) {
            let name = child.value().name();
            match name {
                "script" | "style" | "noscript" | "template" => {}
                "br" => out.push('\n'),
                "td" | "th" => {
                    push_text(child, out);
                    out.push(' ');
                }
                _ if BLOCK_ELEMENTS.contains(&name) => {
                    out.push('\n');
                    push_text(child, out);
                    out.push('\n');
                }
                _ => push_text(child, out),
            }
        }
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
