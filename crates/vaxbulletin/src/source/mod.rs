mod china;

use std::{fmt::Display, str::FromStr};

use regex::Regex;
use serde::Serialize;

use crate::parser::NumberFormat;

#[derive(Debug, thiserror::Error)]
#[error("Unknown source '{0}'. Accepted values: {accepted}", accepted = names().join(", "))]
pub struct SourceParseError(String);

/// Declarative description of one bulletin publisher. A single generic
/// [`crate::Extractor`] runs any source described this way.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub location: String,
    pub vaccine: String,
    pub number_format: NumberFormat,
    pub incremental: IncrementalListing,
    pub complete: Option<CompleteListing>,
}

/// Reverse-chronological index of per-day bulletins.
#[derive(Debug, Clone)]
pub struct IncrementalListing {
    pub index_url: String,
    pub link_selector: String,
    /// Keeps only links whose anchor text matches.
    pub link_filter: Option<Regex>,
    pub content_selector: String,
    pub date: Regex,
    pub date_format: String,
    pub total_vaccinations: Regex,
}

/// Index of comprehensive bulletins carrying the full metric set.
///
/// `title` captures the bulletin's own year, month and day. `doses` captures
/// named groups `month`, `day`, `big` and `small`; the other metric patterns
/// capture `big` and `small`.
#[derive(Debug, Clone)]
pub struct CompleteListing {
    pub index_url: String,
    pub link_selector: String,
    pub content_selector: String,
    pub title: Regex,
    pub title_format: String,
    pub doses: Regex,
    pub people_vaccinated: Regex,
    pub people_fully_vaccinated: Regex,
    pub total_boosters: Regex,
    pub big_scale: f64,
    pub small_scale: f64,
    pub links: usize,
}

impl Source {
    pub fn info(&self) -> SourceInfo {
        SourceInfo {
            name: self.name.clone(),
            location: self.location.clone(),
            vaccine: self.vaccine.clone(),
            index_url: self.incremental.index_url.clone(),
            complete_index_url: self.complete.as_ref().map(|c| c.index_url.clone()),
        }
    }
}

impl FromStr for Source {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "china" | "cn" => Ok(china::source()),
            _ => Err(SourceParseError(s.to_string())),
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.location, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub name: String,
    pub location: String,
    pub vaccine: String,
    pub index_url: String,
    pub complete_index_url: Option<String>,
}

impl Display for SourceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} — {}", self.name, self.location)?;
        write!(f, "\n   Index:    {}", self.index_url)?;
        if let Some(url) = &self.complete_index_url {
            write!(f, "\n   Complete: {}", url)?;
        }
        write!(f, "\n   Vaccine:  {}", self.vaccine)
    }
}

/// Every registered source.
pub fn all() -> Vec<Source> {
    vec![china::source()]
}

pub fn names() -> Vec<String> {
    all().into_iter().map(|s| s.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_from_str() {
        let source = Source::from_str("China").expect("Failed to resolve source");
        assert_eq!(source.location, "China");
        assert!(Source::from_str("atlantis").is_err());
    }

    #[test]
    fn test_unknown_source_lists_accepted_names() {
        let err = Source::from_str("atlantis").unwrap_err();
        assert!(err.to_string().contains("china"));
    }
}
