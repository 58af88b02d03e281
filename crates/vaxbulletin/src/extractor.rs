use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::browser::{Browser, BrowserError, EngineLauncher, Launcher};
use crate::config::ExtractorConfig;
use crate::merge;
use crate::parser::{self, ParseError};
use crate::source::{CompleteListing, Source};
use crate::store::{DatasetStore, StoreError};
use crate::types::{ExportSummary, Metrics, Observation, Record};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to parse {field} from {url}: {reason}")]
    Parse {
        field: String,
        url: String,
        reason: String,
    },
    #[error("Timed out loading {url}")]
    ScrapeTimeout { url: String },
    #[error("Browser operation '{operation}' failed: {reason}")]
    Driver { operation: String, reason: String },
    #[error("Dataset store error: {0}")]
    Store(#[from] StoreError),
}

impl From<BrowserError> for ExportError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::Timeout { url } => ExportError::ScrapeTimeout { url },
            BrowserError::Driver { operation, reason } => ExportError::Driver { operation, reason },
        }
    }
}

fn at(url: &str) -> impl FnOnce(ParseError) -> ExportError + '_ {
    move |e| ExportError::Parse {
        field: e.field,
        url: url.to_string(),
        reason: e.reason,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Link {
    href: String,
    text: String,
}

/// Runs one [`Source`]: walks its listings, reconciles, and attaches the
/// result to a [`DatasetStore`].
#[derive(Debug, Clone)]
pub struct Extractor<L = EngineLauncher> {
    source: Source,
    config: ExtractorConfig,
    launcher: L,
}

impl Extractor<EngineLauncher> {
    /// Builds an extractor on the rendering engine named in `config`.
    pub fn new(source: Source, config: ExtractorConfig) -> Self {
        let launcher = EngineLauncher::new(&config);
        Self::with_launcher(source, config, launcher)
    }
}

impl<L: Launcher> Extractor<L> {
    pub fn with_launcher(source: Source, config: ExtractorConfig, launcher: L) -> Self {
        Self {
            source,
            config,
            launcher,
        }
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Scrapes, reconciles and attaches new records.
    ///
    /// Nothing reaches the store unless both listings were read in full.
    pub async fn export<S: DatasetStore>(
        &self,
        store: &mut S,
    ) -> Result<ExportSummary, ExportError> {
        let location = &self.source.location;
        let watermark = store.load_watermark(location)?;
        match watermark {
            Some(date) => log::info!("{}: latest date on file is {}", location, date),
            None => log::info!("{}: no history on file", location),
        }

        let (incremental, complete) = {
            let mut session = self.launcher.launch().await?;
            let incremental = self.read(&mut session, watermark).await?;
            let complete = self.read_complete(&mut session).await?;
            (incremental, complete)
        };

        let incremental = self.pipeline(incremental);
        let complete = self.pipeline(complete);
        let counts = (incremental.len(), complete.len());

        let merged = merge::reconcile(incremental, complete, Vec::new());
        let attached = store.attach(merged)?;

        let summary = ExportSummary {
            incremental: counts.0,
            complete: counts.1,
            attached,
        };
        log::info!("{}: {}", location, summary);
        Ok(summary)
    }

    /// Walks the daily listing newest first, stopping at the first page dated
    /// on or before `watermark`.
    pub async fn read<B: Browser>(
        &self,
        session: &mut B,
        watermark: Option<NaiveDate>,
    ) -> Result<Vec<Observation>, ExportError> {
        let listing = &self.source.incremental;

        log::info!("Fetching bulletin listing {}...", listing.index_url);
        session.navigate(&listing.index_url).await?;
        let links = collect_links(session, &listing.link_selector, listing.link_filter.as_ref())?;
        log::info!("Found {} bulletin link(s)", links.len());

        let mut observations = Vec::new();
        for link in links {
            session.navigate(&link.href).await?;
            let text = session.find_element_text(&listing.content_selector)?;

            let date = parser::extract_date(&text, &listing.date, &listing.date_format)
                .map_err(at(&link.href))?;
            if watermark.is_some_and(|w| date <= w) {
                log::debug!("Reached known history at {} ({})", date, link.href);
                break;
            }

            let total = parser::extract_count(
                &text,
                &listing.total_vaccinations,
                "total_vaccinations",
                &self.source.number_format,
            )
            .map_err(at(&link.href))?;

            log::info!("Parsed bulletin for {}: {} doses", date, total);
            observations.push(Observation {
                date,
                source_url: link.href,
                metrics: Metrics::doses(total),
            });
        }

        Ok(observations)
    }

    /// Reads the most recent comprehensive bulletins, whatever their date.
    pub async fn read_complete<B: Browser>(
        &self,
        session: &mut B,
    ) -> Result<Vec<Observation>, ExportError> {
        let Some(listing) = &self.source.complete else {
            log::debug!("{} has no comprehensive bulletins", self.source.location);
            return Ok(Vec::new());
        };
        let limit = self.config.complete_links.unwrap_or(listing.links);

        log::info!("Fetching comprehensive bulletin listing {}...", listing.index_url);
        session.navigate(&listing.index_url).await?;
        let links = collect_links(session, &listing.link_selector, Some(&listing.title))?;

        let mut observations = Vec::new();
        for link in links.into_iter().take(limit) {
            let published =
                parser::extract_date(&link.text, &listing.title, &listing.title_format)
                    .map_err(|e| ParseError::new("title", e.reason))
                    .map_err(at(&link.href))?;

            session.navigate(&link.href).await?;
            let text = session.find_element_text(&listing.content_selector)?;
            let observation = self
                .parse_complete(listing, &text, published, &link.href)
                .map_err(at(&link.href))?;

            log::info!(
                "Parsed comprehensive bulletin for {} (published {})",
                observation.date,
                published
            );
            observations.push(observation);
        }

        Ok(observations)
    }

    fn parse_complete(
        &self,
        listing: &CompleteListing,
        text: &str,
        published: NaiveDate,
        url: &str,
    ) -> Result<Observation, ParseError> {
        let format = &self.source.number_format;
        let pair = |caps: &regex::Captures, field: &str| {
            parser::extract_magnitude_pair(
                caps,
                field,
                listing.big_scale,
                listing.small_scale,
                format,
            )
        };

        let doses = parser::captures(text, &listing.doses, "total_vaccinations")?;
        let date = report_date(&doses, published)?;
        let total_vaccinations = pair(&doses, "total_vaccinations")?;

        let field = |pattern: &Regex, name: &str| -> Result<u64, ParseError> {
            let caps = parser::captures(text, pattern, name)?;
            pair(&caps, name)
        };

        Ok(Observation {
            date,
            source_url: url.to_string(),
            metrics: Metrics::full(
                total_vaccinations,
                field(&listing.people_vaccinated, "people_vaccinated")?,
                field(&listing.people_fully_vaccinated, "people_fully_vaccinated")?,
                field(&listing.total_boosters, "total_boosters")?,
            ),
        })
    }

    /// Attaches the source's location and vaccine label.
    pub fn pipeline(&self, observations: Vec<Observation>) -> Vec<Record> {
        observations
            .into_iter()
            .map(|o| Record {
                date: o.date,
                location: self.source.location.clone(),
                metrics: o.metrics,
                vaccine: self.source.vaccine.clone(),
                source_url: o.source_url,
            })
            .collect()
    }
}

fn collect_links<B: Browser>(
    session: &B,
    selector: &str,
    filter: Option<&Regex>,
) -> Result<Vec<Link>, ExportError> {
    let mut links = Vec::new();
    for element in session.find_elements(selector)? {
        if filter.is_some_and(|f| !f.is_match(&element.text)) {
            continue;
        }
        match element.property("href") {
            Some(href) => links.push(Link {
                href: href.to_string(),
                text: element.text.clone(),
            }),
            None => log::debug!("Skipping link without href: '{}'", element.text),
        }
    }
    Ok(links)
}

/// The "as of" day of a comprehensive bulletin. Transcripts only state month
/// and day, so the year comes from the publication date and steps back when
/// that day is after publication or does not exist that year (Feb 29).
fn report_date(caps: &regex::Captures, published: NaiveDate) -> Result<NaiveDate, ParseError> {
    let component = |name: &str| -> Result<u32, ParseError> {
        caps.name(name)
            .ok_or_else(|| ParseError::new("date", format!("missing group '{}'", name)))?
            .as_str()
            .parse()
            .map_err(|e| ParseError::new("date", format!("invalid {}: {}", name, e)))
    };
    let (month, day) = (component("month")?, component("day")?);

    let date_in = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            ParseError::new("date", format!("invalid date {}-{}-{}", year, month, day))
        })
    };

    match date_in(published.year()) {
        Ok(date) if date <= published => Ok(date),
        _ => date_in(published.year() - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn caps_date(text: &str, published: &str) -> Result<NaiveDate, ParseError> {
        let re = Regex::new(r"截至(?P<month>\d{1,2})月(?P<day>\d{1,2})日").unwrap();
        let caps = re.captures(text).unwrap();
        report_date(&caps, NaiveDate::parse_from_str(published, "%Y-%m-%d").unwrap())
    }

    #[test]
    fn test_report_date_uses_publication_year() {
        let date = caps_date("截至4月28日", "2022-04-29").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2022, 4, 28).unwrap());
    }

    #[test]
    fn test_report_date_steps_back_across_new_year() {
        let date = caps_date("截至12月31日", "2023-01-02").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2022, 12, 31).unwrap());
    }

    #[test]
    fn test_report_date_rejects_invalid_day() {
        let err = caps_date("截至2月30日", "2022-03-02").unwrap_err();
        assert_eq!(err.field, "date");
    }

    #[test]
    fn test_report_date_leap_day_from_previous_year() {
        let date = caps_date("截至2月29日", "2025-01-03").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_browser_errors_map_to_export_errors() {
        let timeout: ExportError = BrowserError::Timeout {
            url: "http://x".to_string(),
        }
        .into();
        assert!(matches!(timeout, ExportError::ScrapeTimeout { .. }));

        let driver: ExportError = BrowserError::driver("navigate", "refused").into();
        assert!(matches!(driver, ExportError::Driver { .. }));
    }
}
