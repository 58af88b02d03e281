#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::sync::{Arc, Mutex};

use vaxbulletin::browser::{Browser, BrowserError, Element, Launcher, Page};

pub const DAILY_INDEX: &str = "http://www.nhc.gov.cn/xcs/yqjzqk/list_gzbd.shtml";
pub const COMPLETE_INDEX: &str = "http://www.nhc.gov.cn/xcs/s2906/new_list.shtml";

pub fn daily_url(day: u32) -> String {
    format!("http://www.nhc.gov.cn/xcs/yqjzqk/202204/d04{:02}.shtml", day)
}

pub fn transcript_url(published_day: u32) -> String {
    format!("http://www.nhc.gov.cn/xcs/s2906/202204/t04{:02}.shtml", published_day)
}

pub fn fixture(name: &str) -> String {
    fs::read_to_string(format!("fixtures/{}", name)).expect("Failed to read fixture")
}

pub fn daily_page(day: u32, doses_wan: &str) -> String {
    format!(
        r#"<html><body><div class="con"><div id="xw_box">
            <p>4月{day}日0-24时，31个省（自治区、直辖市）和新疆生产建设兵团报告新冠病毒疫苗接种情况。</p>
            <p>截至2022年4月{day}日，31个省（自治区、直辖市）和新疆生产建设兵团累计报告接种新冠病毒疫苗{doses_wan}万剂次。</p>
        </div></div></body></html>"#
    )
}

/// The 2022-04-29 transcript rewritten to report figures as of `as_of_day`.
pub fn transcript(as_of_day: u32, doses_small: &str) -> String {
    fixture("complete_transcript.html")
        .replace("截至4月28日", &format!("截至4月{}日", as_of_day))
        .replace("33亿3873.9万", &format!("33亿{}万", doses_small))
}

/// Serves a fixed set of pages and records what was visited.
#[derive(Clone, Default)]
pub struct FakeWeb {
    pages: HashMap<String, String>,
    timeouts: Vec<String>,
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    visits: Vec<String>,
    launched: usize,
    open: usize,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Both listings plus four daily bulletins (April 27-30) and four
    /// transcripts (published April 8, 15, 22 and 29).
    pub fn nhc() -> Self {
        Self::new()
            .page(DAILY_INDEX, fixture("daily_listing.html"))
            .page(&daily_url(30), daily_page(30, "333990.2"))
            .page(&daily_url(29), daily_page(29, "333950.1"))
            .page(&daily_url(28), daily_page(28, "333873.9"))
            .page(&daily_url(27), daily_page(27, "333800.0"))
            .page(COMPLETE_INDEX, fixture("complete_listing.html"))
            .page(&transcript_url(29), fixture("complete_transcript.html"))
            .page(&transcript_url(22), transcript(21, "3500.1"))
            .page(&transcript_url(15), transcript(14, "3102.6"))
            .page(&transcript_url(8), transcript(7, "2700.0"))
    }

    pub fn page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    pub fn timeout(mut self, url: &str) -> Self {
        self.timeouts.push(url.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn launched(&self) -> usize {
        self.state.lock().unwrap().launched
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open
    }
}

pub struct FakeSession {
    web: FakeWeb,
    page: Option<Page>,
}

impl FakeSession {
    fn page(&self) -> Result<&Page, BrowserError> {
        self.page
            .as_ref()
            .ok_or_else(|| BrowserError::driver("find_element", "no page loaded"))
    }
}

impl Launcher for FakeWeb {
    type Session = FakeSession;

    async fn launch(&self) -> Result<FakeSession, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.launched += 1;
        state.open += 1;
        Ok(FakeSession {
            web: self.clone(),
            page: None,
        })
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.web.state.lock().unwrap().open -= 1;
    }
}

impl Browser for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.web.state.lock().unwrap().visits.push(url.to_string());

        if self.web.timeouts.iter().any(|u| u == url) {
            return Err(BrowserError::Timeout {
                url: url.to_string(),
            });
        }

        let html = self
            .web
            .pages
            .get(url)
            .ok_or_else(|| BrowserError::driver("navigate", format!("404 Not Found: {}", url)))?;
        self.page = Some(Page::new(url, html.clone())?);
        Ok(())
    }

    fn find_element_text(&self, selector: &str) -> Result<String, BrowserError> {
        self.page()?.find_element_text(selector)
    }

    fn find_elements(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        self.page()?.find_elements(selector)
    }
}
