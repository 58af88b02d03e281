use std::fmt::Display;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single scraped data point before source metadata is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub date: NaiveDate,
    pub source_url: String,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_vaccinations: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_vaccinated: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub people_fully_vaccinated: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_boosters: Option<u64>,
}

impl Metrics {
    pub fn doses(total_vaccinations: u64) -> Self {
        Self {
            total_vaccinations: Some(total_vaccinations),
            ..Self::default()
        }
    }

    pub fn full(
        total_vaccinations: u64,
        people_vaccinated: u64,
        people_fully_vaccinated: u64,
        total_boosters: u64,
    ) -> Self {
        Self {
            total_vaccinations: Some(total_vaccinations),
            people_vaccinated: Some(people_vaccinated),
            people_fully_vaccinated: Some(people_fully_vaccinated),
            total_boosters: Some(total_boosters),
        }
    }

    /// Named view over the cumulative fields, in column order.
    pub fn fields(&self) -> [(&'static str, Option<u64>); 4] {
        [
            ("total_vaccinations", self.total_vaccinations),
            ("people_vaccinated", self.people_vaccinated),
            ("people_fully_vaccinated", self.people_fully_vaccinated),
            ("total_boosters", self.total_boosters),
        ]
    }
}

/// One row of the canonical dataset, keyed by `(location, date)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub date: NaiveDate,
    pub location: String,
    #[serde(flatten)]
    pub metrics: Metrics,
    pub vaccine: String,
    pub source_url: String,
}

impl Record {
    pub fn key(&self) -> (&str, NaiveDate) {
        (&self.location, self.date)
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.location, self.date)?;
        for (name, value) in self.metrics.fields() {
            if let Some(value) = value {
                write!(f, " · {}={}", name, value)?;
            }
        }
        write!(f, "\n   Source: {}", self.source_url)
    }
}

/// Counts reported by a dataset store after an attach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttachSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub total: usize,
}

impl Display for AttachSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inserted, {} replaced, {} on file",
            self.inserted, self.replaced, self.total
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub incremental: usize,
    pub complete: usize,
    pub attached: AttachSummary,
}

impl Display for ExportSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} incremental, {} complete record(s); {}",
            self.incremental, self.complete, self.attached
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_flat_and_skips_missing_metrics() {
        let record = Record {
            date: NaiveDate::from_ymd_opt(2022, 1, 3).unwrap(),
            location: "China".to_string(),
            metrics: Metrics::doses(130),
            vaccine: "Sinovac".to_string(),
            source_url: "http://example.com/a".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2022-01-03");
        assert_eq!(json["total_vaccinations"], 130);
        assert!(json.get("people_vaccinated").is_none());

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
