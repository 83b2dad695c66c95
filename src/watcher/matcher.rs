//! Pattern matching over assembled lines.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// A matched line, as posted to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub hostname: String,
    pub line: String,
}

/// Tests lines against a compiled pattern and stamps hits with the host name.
#[derive(Debug, Clone)]
pub struct Matcher {
    pattern: Regex,
    hostname: String,
}

impl Matcher {
    #[must_use]
    pub fn new(pattern: Regex, hostname: impl Into<String>) -> Self {
        Self {
            pattern,
            hostname: hostname.into(),
        }
    }

    /// Unanchored search, same as `Regex::is_match`.
    #[must_use]
    pub fn matches(&self, line: &str) -> bool {
        self.pattern.is_match(line)
    }

    /// Build a record for `line` if it matches.
    #[must_use]
    pub fn check(&self, line: String) -> Option<MatchRecord> {
        self.matches(&line).then(|| MatchRecord {
            hostname: self.hostname.clone(),
            line,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }
}

/// Name of this machine, or `"unknown"` if it cannot be read.
#[must_use]
pub fn local_hostname() -> String {
    #[cfg(unix)]
    {
        match nix::unistd::gethostname() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                tracing::warn!(error = %e, "Cannot read hostname");
                "unknown".to_string()
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::env::var("COMPUTERNAME").unwrap_or_else(|_| "unknown".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(pattern: &str) -> Matcher {
        Matcher::new(Regex::new(pattern).unwrap(), "web-01")
    }

    #[test]
    fn test_substring_search() {
        let m = matcher("ERROR");
        assert!(m.matches("2024 ERROR disk full"));
        assert!(!m.matches("no match here"));
    }

    #[test]
    fn test_anchors_are_honored() {
        let m = matcher("^ERROR");
        assert!(m.matches("ERROR at start"));
        assert!(!m.matches("2024 ERROR disk full"));
    }

    #[test]
    fn test_matching_is_repeatable() {
        let m = matcher(r"timeout after \d+ms");
        let line = "upstream timeout after 300ms";
        let first = m.matches(line);
        for _ in 0..10 {
            assert_eq!(m.matches(line), first);
        }
    }

    #[test]
    fn test_check_builds_record() {
        let m = matcher("ERROR");
        assert_eq!(
            m.check("2024 ERROR disk full".to_string()),
            Some(MatchRecord {
                hostname: "web-01".to_string(),
                line: "2024 ERROR disk full".to_string(),
            })
        );
        assert_eq!(m.check("fine".to_string()), None);
    }

    #[test]
    fn test_record_wire_shape() {
        let record = MatchRecord {
            hostname: "web-01".to_string(),
            line: "say \"hi\"".to_string(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"hostname":"web-01","line":"say \"hi\""}"#);
    }

    #[test]
    fn test_local_hostname_not_empty() {
        assert!(!local_hostname().is_empty());
    }
}
