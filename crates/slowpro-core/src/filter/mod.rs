mod host_matcher;

pub use host_matcher::DomainPattern;

use crate::record::RequestRecord;

/// A set of domain patterns.
///
/// A domain passes when ANY pattern matches it. An empty filter is not
/// constructible: "no filter" is expressed as `Option::<DomainFilter>::None`.
#[derive(Debug, Clone)]
pub struct DomainFilter {
    patterns: Vec<DomainPattern>,
}

impl DomainFilter {
    /// Build a filter from pattern strings.
    ///
    /// Comma-separated values are split, so `["a.com,b.com"]` yields two
    /// patterns.
    pub fn parse<I, S>(patterns: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Vec::new();
        for raw in patterns {
            for piece in raw.as_ref().split(',') {
                if piece.trim().is_empty() {
                    continue;
                }
                parsed.push(DomainPattern::parse(piece)?);
            }
        }

        if parsed.is_empty() {
            return Err(crate::Error::InvalidPattern(
                "At least one domain is required".to_string(),
            ));
        }

        Ok(Self { patterns: parsed })
    }

    pub fn patterns(&self) -> &[DomainPattern] {
        &self.patterns
    }

    pub fn matches(&self, domain: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(domain))
    }

    pub fn matches_record(&self, record: &RequestRecord) -> bool {
        self.matches(&record.domain)
    }
}

/// Apply an optional filter; `None` passes every record
pub fn filter_records<'a>(
    records: &'a [RequestRecord],
    filter: Option<&'a DomainFilter>,
) -> impl Iterator<Item = &'a RequestRecord> + 'a {
    records
        .iter()
        .filter(move |record| filter.is_none_or(|f| f.matches_record(record)))
}
