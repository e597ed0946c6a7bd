use crate::record::RequestRecord;
use std::cmp::Ordering;

/// Records with the longest durations, longest first.
///
/// Records without a duration are excluded. Ties go to the earlier start
/// time, then to the lower request id.
pub(super) fn slowest<'a>(records: &[&'a RequestRecord], top_n: usize) -> Vec<&'a RequestRecord> {
    top_by(records, top_n, |r| r.duration_ms, |a: &f64, b: &f64| b.total_cmp(a))
}

/// Records with the largest encoded body, largest first; same tie-break as
/// [`slowest`]
pub(super) fn largest<'a>(records: &[&'a RequestRecord], top_n: usize) -> Vec<&'a RequestRecord> {
    top_by(records, top_n, |r| r.encoded_body_size, |a: &u64, b: &u64| b.cmp(a))
}

fn top_by<'a, K>(
    records: &[&'a RequestRecord],
    top_n: usize,
    key: impl Fn(&RequestRecord) -> Option<K>,
    order: impl Fn(&K, &K) -> Ordering,
) -> Vec<&'a RequestRecord> {
    let mut ranked: Vec<(K, &'a RequestRecord)> = records
        .iter()
        .filter_map(|record| key(record).map(|k| (k, *record)))
        .collect();

    ranked.sort_by(|(ka, a), (kb, b)| {
        order(ka, kb)
            .then_with(|| a.start_time.total_cmp(&b.start_time))
            .then_with(|| a.request_id.cmp(&b.request_id))
    });
    ranked.truncate(top_n);

    ranked.into_iter().map(|(_, record)| record).collect()
}
