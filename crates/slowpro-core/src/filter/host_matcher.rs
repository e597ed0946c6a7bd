use glob::Pattern;

/// A single domain selector.
///
/// Patterns containing `*` or `?` are globs; anything else must match the
/// whole domain. Both forms compare case-insensitively.
#[derive(Debug, Clone)]
pub enum DomainPattern {
    Exact(String),
    Glob(Pattern),
}

impl DomainPattern {
    pub fn parse(pattern: &str) -> crate::Result<Self> {
        let normalized = pattern.trim().trim_end_matches('.').to_lowercase();
        if normalized.is_empty() {
            return Err(crate::Error::InvalidPattern(
                "Domain pattern must not be empty".to_string(),
            ));
        }

        if normalized.contains('*') || normalized.contains('?') {
            let glob = Pattern::new(&normalized).map_err(|e| {
                crate::Error::InvalidPattern(format!("Invalid glob pattern '{}': {}", pattern, e))
            })?;
            Ok(DomainPattern::Glob(glob))
        } else {
            Ok(DomainPattern::Exact(normalized))
        }
    }

    pub fn matches(&self, domain: &str) -> bool {
        let domain = domain.to_lowercase();
        match self {
            DomainPattern::Exact(expected) => &domain == expected,
            DomainPattern::Glob(glob) => glob.matches(&domain),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DomainPattern::Exact(expected) => expected,
            DomainPattern::Glob(glob) => glob.as_str(),
        }
    }
}
