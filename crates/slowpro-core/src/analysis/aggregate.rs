use super::groups::{GroupAccumulator, median};
use super::ranking::{largest, slowest};
use super::{AggregateStats, Analyzer, FailedRequest, GlobalStats, RequestSummary};
use crate::filter::{DomainFilter, filter_records};
use crate::record::RequestRecord;
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_TOP_N: usize = 10;

/// Status bucket for records without an HTTP status
const NO_STATUS: &str = "none";

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub domain_filter: Option<DomainFilter>,
    pub top_n: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            domain_filter: None,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// Computes [`AggregateStats`] over a record collection.
///
/// Aggregation is a pure function of the records and the options: no
/// state is kept between calls and the output is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    options: AggregateOptions,
}

impl Aggregator {
    pub fn new(options: AggregateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &AggregateOptions {
        &self.options
    }

    pub fn aggregate(&self, records: &[RequestRecord]) -> AggregateStats {
        tracing::debug!("Aggregating {} request records", records.len());

        let selected: Vec<&RequestRecord> =
            filter_records(records, self.options.domain_filter.as_ref()).collect();

        let mut global = GroupAccumulator::default();
        let mut by_domain: BTreeMap<String, GroupAccumulator> = BTreeMap::new();
        let mut by_type: BTreeMap<String, GroupAccumulator> = BTreeMap::new();
        let mut status_codes: BTreeMap<String, usize> = BTreeMap::new();
        let mut sessions = BTreeSet::new();

        for record in &selected {
            global.add(record);
            by_domain.entry(record.domain.clone()).or_default().add(record);
            by_type
                .entry(record.resource_type.as_str().to_string())
                .or_default()
                .add(record);

            let status = record
                .status_code
                .map(|s| s.to_string())
                .unwrap_or_else(|| NO_STATUS.to_string());
            *status_codes.entry(status).or_insert(0) += 1;

            sessions.insert(&record.session_id);
        }

        global.sort();
        let global_stats = GlobalStats {
            total_requests: global.requests,
            total_domains: by_domain.len(),
            total_sessions: sessions.len(),
            completed_requests: global.completed,
            failed_requests: global.failures,
            abandoned_requests: global.abandoned,
            http_errors: global.http_errors,
            failure_rate: global.failure_rate(),
            avg_duration_ms: global.avg_duration(),
            min_duration_ms: global.min_duration(),
            max_duration_ms: global.max_duration(),
            median_duration_ms: median(&global.durations),
            duration_percentiles: global.percentiles(),
            total_bytes: global.total_bytes,
            avg_size_bytes: global.avg_size(),
        };

        let mut failed: Vec<&RequestRecord> =
            selected.iter().copied().filter(|record| record.failed).collect();
        failed.sort_by(|a, b| {
            a.start_time
                .total_cmp(&b.start_time)
                .then_with(|| a.request_id.cmp(&b.request_id))
        });
        let failed_requests = failed
            .into_iter()
            .map(|record| FailedRequest {
                request_id: record.request_id.clone(),
                url: record.url.clone(),
                domain: record.domain.clone(),
                method: record.method.clone(),
                resource_type: record.resource_type,
                error_text: record.error_text.clone().unwrap_or_default(),
                start_time: record.start_time,
                session_id: record.session_id.clone(),
            })
            .collect();

        let stats = AggregateStats {
            global: global_stats,
            domains: by_domain
                .into_iter()
                .map(|(domain, acc)| (domain, acc.finish()))
                .collect(),
            resource_types: by_type
                .into_iter()
                .map(|(kind, acc)| (kind, acc.finish()))
                .collect(),
            status_codes,
            slowest_requests: slowest(&selected, self.options.top_n)
                .into_iter()
                .map(RequestSummary::from)
                .collect(),
            largest_requests: largest(&selected, self.options.top_n)
                .into_iter()
                .map(RequestSummary::from)
                .collect(),
            failed_requests,
        };

        tracing::info!(
            "Aggregation complete: {} requests, {} domains, avg={}",
            stats.global.total_requests,
            stats.global.total_domains,
            stats
                .global
                .avg_duration_ms
                .map(|avg| format!("{:.2}ms", avg))
                .unwrap_or_else(|| "n/a".to_string())
        );

        stats
    }
}

impl Analyzer for Aggregator {
    type Output = AggregateStats;

    fn analyze(&self, records: &[RequestRecord]) -> Self::Output {
        self.aggregate(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResourceType;
    use crate::session::SessionId;
    use chrono::Utc;

    struct Fixture {
        id: &'static str,
        domain: &'static str,
        start: f64,
        duration: Option<f64>,
        size: Option<u64>,
        status: Option<u16>,
        failed: bool,
        kind: ResourceType,
    }

    fn fixture(id: &'static str, domain: &'static str, start: f64, duration: Option<f64>) -> Fixture {
        Fixture {
            id,
            domain,
            start,
            duration,
            size: Some(100),
            status: duration.map(|_| 200),
            failed: false,
            kind: ResourceType::Script,
        }
    }

    fn build(f: Fixture) -> RequestRecord {
        RequestRecord {
            request_id: f.id.to_string(),
            url: format!("https://{}/{}", f.domain, f.id),
            domain: f.domain.to_string(),
            method: "GET".to_string(),
            resource_type: f.kind,
            mime_type: None,
            start_time: f.start,
            end_time: f.duration.map(|d| f.start + d),
            status_code: if f.failed { None } else { f.status },
            encoded_body_size: if f.failed { None } else { f.size },
            duration_ms: f.duration,
            failed: f.failed,
            error_text: f.failed.then(|| "net::ERR_TIMED_OUT".to_string()),
            session_id: SessionId::new("20240101_120000"),
            captured_at: Utc::now(),
        }
    }

    fn mixed() -> Vec<RequestRecord> {
        vec![
            build(fixture("1", "example.com", 0.0, Some(100.0))),
            build(Fixture {
                kind: ResourceType::Image,
                size: Some(4000),
                ..fixture("2", "example.com", 1.0, Some(50.0))
            }),
            build(Fixture {
                failed: true,
                ..fixture("3", "example.com", 2.0, Some(30.0))
            }),
            build(fixture("4", "other.com", 3.0, None)),
            build(Fixture {
                status: Some(404),
                ..fixture("5", "other.com", 4.0, Some(200.0))
            }),
        ]
    }

    #[test]
    fn test_empty_input_yields_zero_counts_and_null_averages() {
        let stats = Aggregator::default().aggregate(&[]);

        assert_eq!(stats.global.total_requests, 0);
        assert_eq!(stats.global.total_domains, 0);
        assert_eq!(stats.global.failed_requests, 0);
        assert_eq!(stats.global.total_bytes, 0);
        assert_eq!(stats.global.avg_duration_ms, None);
        assert_eq!(stats.global.failure_rate, None);
        assert_eq!(stats.global.avg_size_bytes, None);
        assert_eq!(stats.global.duration_percentiles, None);
        assert!(stats.domains.is_empty());
        assert!(stats.slowest_requests.is_empty());

        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("NaN"));
        assert!(json.contains("\"avg_duration_ms\":null"));
    }

    #[test]
    fn test_global_stats() {
        let stats = Aggregator::default().aggregate(&mixed());
        let g = &stats.global;

        assert_eq!(g.total_requests, 5);
        assert_eq!(g.total_domains, 2);
        assert_eq!(g.total_sessions, 1);
        assert_eq!(g.completed_requests, 3);
        assert_eq!(g.failed_requests, 1);
        assert_eq!(g.abandoned_requests, 1);
        assert_eq!(g.http_errors, 1);
        assert_eq!(g.failure_rate, Some(0.2));
        // 100 + 50 + 30 + 200, abandoned excluded
        assert_eq!(g.avg_duration_ms, Some(95.0));
        assert_eq!(g.min_duration_ms, Some(30.0));
        assert_eq!(g.max_duration_ms, Some(200.0));
        assert_eq!(g.median_duration_ms, Some(75.0));
        // failed record has no size
        assert_eq!(g.total_bytes, 100 + 4000 + 100 + 100);
        assert_eq!(g.avg_size_bytes, Some(1075.0));
    }

    #[test]
    fn test_per_domain_stats() {
        let stats = Aggregator::default().aggregate(&mixed());

        let example = &stats.domains["example.com"];
        assert_eq!(example.requests, 3);
        assert_eq!(example.failures, 1);
        assert_eq!(example.failure_rate, Some(1.0 / 3.0));
        assert_eq!(example.avg_duration_ms, Some(60.0));
        assert_eq!(example.total_bytes, 4100);

        let other = &stats.domains["other.com"];
        assert_eq!(other.requests, 2);
        assert_eq!(other.failures, 0);
        assert_eq!(other.failure_rate, Some(0.0));
        assert_eq!(other.abandoned, 1);
        assert_eq!(other.http_errors, 1);
        assert_eq!(other.avg_duration_ms, Some(200.0));
    }

    #[test]
    fn test_per_resource_type_and_status() {
        let stats = Aggregator::default().aggregate(&mixed());

        assert_eq!(stats.resource_types["Script"].requests, 4);
        assert_eq!(stats.resource_types["Image"].requests, 1);
        assert_eq!(stats.resource_types["Image"].total_bytes, 4000);

        assert_eq!(stats.status_codes["200"], 2);
        assert_eq!(stats.status_codes["404"], 1);
        assert_eq!(stats.status_codes["none"], 2);
    }

    #[test]
    fn test_domain_filter_restricts_every_statistic() {
        let options = AggregateOptions {
            domain_filter: Some(DomainFilter::parse(["example.com"]).unwrap()),
            ..Default::default()
        };
        let stats = Aggregator::new(options).aggregate(&mixed());

        assert_eq!(stats.global.total_requests, 3);
        assert_eq!(stats.domains.len(), 1);
        assert!(stats.domains.contains_key("example.com"));
        assert!(stats.slowest_requests.iter().all(|r| r.domain == "example.com"));
        assert!(!stats.status_codes.contains_key("404"));
    }

    #[test]
    fn test_filter_matching_nothing_is_empty_not_error() {
        let options = AggregateOptions {
            domain_filter: Some(DomainFilter::parse(["absent.test"]).unwrap()),
            ..Default::default()
        };
        let stats = Aggregator::new(options).aggregate(&mixed());
        assert_eq!(stats.global.total_requests, 0);
        assert_eq!(stats.global.avg_duration_ms, None);
    }

    #[test]
    fn test_top_n_slowest_example() {
        let records: Vec<RequestRecord> = [Some(100.0), Some(50.0), Some(100.0), None, Some(200.0)]
            .into_iter()
            .enumerate()
            .map(|(i, duration)| {
                let id: &'static str = ["r0", "r1", "r2", "r3", "r4"][i];
                build(fixture(id, "a.com", i as f64 * 10.0, duration))
            })
            .collect();

        let options = AggregateOptions {
            top_n: 2,
            ..Default::default()
        };
        let stats = Aggregator::new(options).aggregate(&records);

        let durations: Vec<f64> = stats
            .slowest_requests
            .iter()
            .map(|r| r.duration_ms.unwrap())
            .collect();
        assert_eq!(durations, vec![200.0, 100.0]);
        assert_eq!(stats.slowest_requests[1].request_id, "r0");
    }

    #[test]
    fn test_failed_requests_are_listed_with_error_text() {
        let stats = Aggregator::default().aggregate(&mixed());
        assert_eq!(stats.failed_requests.len(), 1);
        assert_eq!(stats.failed_requests[0].request_id, "3");
        assert_eq!(stats.failed_requests[0].error_text, "net::ERR_TIMED_OUT");
    }

    #[test]
    fn test_aggregation_is_deterministic() {
        let records = mixed();
        let aggregator = Aggregator::default();
        let first = serde_json::to_string(&aggregator.aggregate(&records)).unwrap();
        let mut reversed = records.clone();
        reversed.reverse();
        let second = serde_json::to_string(&aggregator.aggregate(&reversed)).unwrap();
        assert_eq!(first, second);
    }
}
