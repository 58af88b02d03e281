use std::collections::BTreeMap;
use std::fmt::Display;

use chrono::NaiveDate;

use crate::types::{AttachSummary, Record};

type Key = (String, NaiveDate);

fn key(record: &Record) -> Key {
    (record.location.clone(), record.date)
}

/// Merges the two scraped streams over the prior dataset.
///
/// Precedence is `complete` > `incremental` > `prior`, whole records only.
/// Within a stream the first record for a key wins. The output holds one
/// record per `(location, date)`, sorted by that key.
pub fn reconcile(
    incremental: Vec<Record>,
    complete: Vec<Record>,
    prior: Vec<Record>,
) -> Vec<Record> {
    let mut merged: BTreeMap<Key, Record> = BTreeMap::new();
    for record in complete.into_iter().chain(incremental).chain(prior) {
        merged.entry(key(&record)).or_insert(record);
    }
    merged.into_values().collect()
}

/// Lays `records` over `prior`, as a store does on attach.
pub fn attach(prior: Vec<Record>, records: Vec<Record>) -> (Vec<Record>, AttachSummary) {
    let incoming = reconcile(Vec::new(), records, Vec::new());
    let before: BTreeMap<Key, &Record> = prior.iter().map(|r| (key(r), r)).collect();

    let mut summary = AttachSummary::default();
    for record in &incoming {
        match before.get(&key(record)) {
            None => summary.inserted += 1,
            Some(old) if *old != record => summary.replaced += 1,
            Some(_) => {}
        }
    }

    let merged = reconcile(Vec::new(), incoming, prior);
    summary.total = merged.len();
    (merged, summary)
}

/// A cumulative field that went down between two consecutive dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub location: String,
    pub field: &'static str,
    pub previous_date: NaiveDate,
    pub previous: u64,
    pub date: NaiveDate,
    pub current: u64,
}

impl Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} decreased from {} ({}) to {} ({})",
            self.location, self.field, self.previous, self.previous_date, self.current, self.date
        )
    }
}

/// Reports decreases in cumulative fields. Only checks, never edits.
pub fn monotonic_violations(records: &[Record]) -> Vec<Violation> {
    let mut sorted: Vec<&Record> = records.iter().collect();
    sorted.sort_by(|a, b| a.key().cmp(&b.key()));

    let mut last: BTreeMap<(&str, &'static str), (NaiveDate, u64)> = BTreeMap::new();
    let mut violations = Vec::new();

    for record in sorted {
        for (field, value) in record.metrics.fields() {
            let Some(value) = value else { continue };
            let slot = (record.location.as_str(), field);
            if let Some(&(previous_date, previous)) = last.get(&slot)
                && value < previous
            {
                violations.push(Violation {
                    location: record.location.clone(),
                    field,
                    previous_date,
                    previous,
                    date: record.date,
                    current: value,
                });
            }
            last.insert(slot, (record.date, value));
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metrics;
    use pretty_assertions::assert_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(day: &str, metrics: Metrics, url: &str) -> Record {
        Record {
            date: date(day),
            location: "China".to_string(),
            metrics,
            vaccine: "Sinovac".to_string(),
            source_url: url.to_string(),
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let prior = vec![record("2022-01-01", Metrics::doses(100), "old")];
        let incremental = vec![record("2022-01-03", Metrics::doses(130), "daily")];
        let complete = vec![record("2022-01-01", Metrics::full(110, 90, 80, 5), "full")];

        let merged = reconcile(incremental, complete, prior);

        assert_eq!(
            merged,
            vec![
                record("2022-01-01", Metrics::full(110, 90, 80, 5), "full"),
                record("2022-01-03", Metrics::doses(130), "daily"),
            ]
        );
    }

    #[test]
    fn test_complete_replaces_incremental_entirely() {
        let incremental = vec![record(
            "2022-04-28",
            Metrics {
                total_vaccinations: Some(999),
                people_vaccinated: None,
                people_fully_vaccinated: None,
                total_boosters: Some(7),
            },
            "daily",
        )];
        let complete = vec![record(
            "2022-04-28",
            Metrics {
                total_vaccinations: Some(1000),
                people_vaccinated: Some(800),
                people_fully_vaccinated: Some(700),
                total_boosters: None,
            },
            "full",
        )];

        let merged = reconcile(incremental, complete.clone(), Vec::new());

        // no field-wise blend: the daily booster count must not leak through
        assert_eq!(merged, complete);
    }

    #[test]
    fn test_incremental_replaces_prior() {
        let prior = vec![record("2022-01-03", Metrics::doses(120), "old")];
        let incremental = vec![record("2022-01-03", Metrics::doses(130), "daily")];

        let merged = reconcile(incremental.clone(), Vec::new(), prior);
        assert_eq!(merged, incremental);
    }

    #[test]
    fn test_first_record_in_stream_wins() {
        let complete = vec![
            record("2022-04-28", Metrics::doses(2), "newest"),
            record("2022-04-28", Metrics::doses(1), "older"),
        ];

        let merged = reconcile(Vec::new(), complete, Vec::new());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source_url, "newest");
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let prior = vec![
            record("2021-12-30", Metrics::doses(90), "p1"),
            record("2022-01-01", Metrics::doses(100), "p2"),
        ];
        let incremental = vec![
            record("2022-01-03", Metrics::doses(130), "i1"),
            record("2022-01-02", Metrics::doses(120), "i2"),
        ];
        let complete = vec![record("2022-01-01", Metrics::full(110, 90, 80, 5), "c1")];

        let once = reconcile(incremental.clone(), complete.clone(), prior);
        let twice = reconcile(incremental, complete, once.clone());
        assert_eq!(twice, once);

        let replay = reconcile(Vec::new(), Vec::new(), once.clone());
        assert_eq!(replay, once);
    }

    #[test]
    fn test_locations_are_kept_apart() {
        let mut other = record("2022-01-01", Metrics::doses(5), "x");
        other.location = "Hong Kong".to_string();
        let prior = vec![other.clone()];
        let complete = vec![record("2022-01-01", Metrics::doses(10), "y")];

        let merged = reconcile(Vec::new(), complete, prior);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&other));
    }

    #[test]
    fn test_attach_counts() {
        let prior = vec![
            record("2022-01-01", Metrics::doses(100), "a"),
            record("2022-01-02", Metrics::doses(110), "b"),
        ];
        let records = vec![
            record("2022-01-01", Metrics::doses(101), "a2"),
            record("2022-01-02", Metrics::doses(110), "b"),
            record("2022-01-03", Metrics::doses(120), "c"),
        ];

        let (merged, summary) = attach(prior, records);

        assert_eq!(
            summary,
            AttachSummary {
                inserted: 1,
                replaced: 1,
                total: 3
            }
        );
        assert_eq!(merged[0].metrics.total_vaccinations, Some(101));
    }

    #[test]
    fn test_monotonic_violations() {
        let records = vec![
            record("2022-01-03", Metrics::doses(120), "c"),
            record("2022-01-01", Metrics::doses(100), "a"),
            record("2022-01-02", Metrics::doses(130), "b"),
        ];

        let violations = monotonic_violations(&records);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "total_vaccinations");
        assert_eq!(violations[0].previous, 130);
        assert_eq!(violations[0].current, 120);
        assert_eq!(violations[0].date, date("2022-01-03"));
    }
}
