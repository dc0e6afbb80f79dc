//! Indicators of compromise and their reputation summaries

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

static IPV4_EXACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)$")
        .expect("valid IPv4 regex")
});

static IPV4_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b")
        .expect("valid IPv4 regex")
});

static HASH_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[0-9a-fA-F]{64}|[0-9a-fA-F]{40}|[0-9a-fA-F]{32})\b").expect("valid hash regex")
});

static URL_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:https?|ftp)://[^\s"'<>)\]]+"#).expect("valid URL regex")
});

/// Indicator type as understood by the reputation service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IocType {
    Hash,
    Url,
    Ip,
    Domain,
}

impl IocType {
    /// Detect the type of a single indicator value
    pub fn detect(value: &str) -> Self {
        let value = value.trim();

        if matches!(value.len(), 32 | 40 | 64) && value.chars().all(|c| c.is_ascii_hexdigit()) {
            return IocType::Hash;
        }

        if value.starts_with("http://") || value.starts_with("https://") || value.starts_with("ftp://")
        {
            return IocType::Url;
        }

        if IPV4_EXACT.is_match(value) {
            return IocType::Ip;
        }

        IocType::Domain
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IocType::Hash => "hash",
            IocType::Url => "url",
            IocType::Ip => "ip",
            IocType::Domain => "domain",
        }
    }
}

/// Threat level derived from the share of engines flagging an indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Critical,
    High,
    Medium,
    Low,
    Clean,
    Unknown,
}

impl ThreatLevel {
    pub fn from_detections(malicious: u32, total_engines: u32) -> Self {
        if total_engines == 0 {
            return ThreatLevel::Unknown;
        }

        let percentage = f64::from(malicious) / f64::from(total_engines) * 100.0;
        if percentage >= 70.0 {
            ThreatLevel::Critical
        } else if percentage >= 30.0 {
            ThreatLevel::High
        } else if percentage >= 10.0 {
            ThreatLevel::Medium
        } else if percentage > 0.0 {
            ThreatLevel::Low
        } else {
            ThreatLevel::Clean
        }
    }
}

/// Confidence in a reputation verdict, driven by how many engines answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerdictConfidence {
    High,
    Medium,
    Low,
}

impl VerdictConfidence {
    pub fn from_engine_count(total_engines: u32) -> Self {
        if total_engines >= 60 {
            VerdictConfidence::High
        } else if total_engines >= 30 {
            VerdictConfidence::Medium
        } else {
            VerdictConfidence::Low
        }
    }
}

/// Reputation summary for one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IocReputation {
    pub value: String,
    pub ioc_type: IocType,
    pub malicious: u32,
    pub suspicious: u32,
    pub harmless: u32,
    pub undetected: u32,
    pub total_engines: u32,
    pub detection_ratio: String,
    pub reputation: i64,
    pub threat_level: ThreatLevel,
    pub confidence: VerdictConfidence,
    pub labels: Vec<String>,
    pub last_analysis_date: Option<i64>,
}

impl IocReputation {
    /// One-line summary used in prompt context
    pub fn summary_line(&self) -> String {
        let labels = if self.labels.is_empty() {
            String::new()
        } else {
            format!(", labels: {}", self.labels.join(", "))
        };
        format!(
            "{} ({}): {:?} threat, {} engines flagged malicious, reputation {}{}",
            self.value,
            self.ioc_type.as_str(),
            self.threat_level,
            self.detection_ratio,
            self.reputation,
            labels
        )
    }
}

/// Aggregate verdict over the indicators gathered for a threat hunt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreatScore {
    /// Indicators rated medium or worse
    pub flagged: usize,
    pub total: usize,
}

impl ThreatScore {
    pub fn from_reputations(reputations: &[IocReputation]) -> Self {
        let flagged = reputations
            .iter()
            .filter(|r| {
                matches!(
                    r.threat_level,
                    ThreatLevel::Critical | ThreatLevel::High | ThreatLevel::Medium
                )
            })
            .count();
        Self {
            flagged,
            total: reputations.len(),
        }
    }

    /// Share of flagged indicators, 0-100
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.flagged as f64 / self.total as f64 * 100.0
    }

    pub fn level(&self) -> &'static str {
        let percentage = self.percentage();
        if percentage >= 75.0 {
            "critical"
        } else if percentage >= 50.0 {
            "high"
        } else if percentage >= 25.0 {
            "medium"
        } else {
            "low"
        }
    }
}

/// Pull hashes, URLs and IPv4 addresses out of free text
///
/// Results are deduplicated and sorted so the same text always yields the same list.
pub fn extract_iocs(text: &str) -> Vec<(IocType, String)> {
    let mut found = BTreeSet::new();

    for m in URL_IN_TEXT.find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';']);
        found.insert((IocType::Url, url.to_string()));
    }

    for m in HASH_IN_TEXT.find_iter(text) {
        found.insert((IocType::Hash, m.as_str().to_lowercase()));
    }

    for m in IPV4_IN_TEXT.find_iter(text) {
        found.insert((IocType::Ip, m.as_str().to_string()));
    }

    found.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_ioc_types() {
        assert_eq!(IocType::detect("44d88612fea8a8f36de82e1278abb02f"), IocType::Hash);
        assert_eq!(
            IocType::detect("275a021bbfb6489e54d471899f7db9d1663fc695ec2fe2a2c4538aabf651fd0f"),
            IocType::Hash
        );
        assert_eq!(IocType::detect("https://evil.example.com/x"), IocType::Url);
        assert_eq!(IocType::detect("203.0.113.100"), IocType::Ip);
        assert_eq!(IocType::detect("999.0.113.100"), IocType::Domain);
        assert_eq!(IocType::detect("evil.example.com"), IocType::Domain);
    }

    #[test]
    fn test_threat_level_thresholds() {
        assert_eq!(ThreatLevel::from_detections(0, 0), ThreatLevel::Unknown);
        assert_eq!(ThreatLevel::from_detections(49, 70), ThreatLevel::Critical);
        assert_eq!(ThreatLevel::from_detections(21, 70), ThreatLevel::High);
        assert_eq!(ThreatLevel::from_detections(7, 70), ThreatLevel::Medium);
        assert_eq!(ThreatLevel::from_detections(1, 70), ThreatLevel::Low);
        assert_eq!(ThreatLevel::from_detections(0, 70), ThreatLevel::Clean);
    }

    #[test]
    fn test_verdict_confidence() {
        assert_eq!(VerdictConfidence::from_engine_count(70), VerdictConfidence::High);
        assert_eq!(VerdictConfidence::from_engine_count(45), VerdictConfidence::Medium);
        assert_eq!(VerdictConfidence::from_engine_count(5), VerdictConfidence::Low);
    }

    #[test]
    fn test_extract_iocs_from_text() {
        let text = "Beacon to 203.0.113.100 via https://evil.example.com/payload.bin, \
                    dropped 44D88612FEA8A8F36DE82E1278ABB02F. Repeat 203.0.113.100.";
        let iocs = extract_iocs(text);

        assert_eq!(iocs.len(), 3);
        assert!(iocs.contains(&(IocType::Ip, "203.0.113.100".to_string())));
        assert!(iocs.contains(&(
            IocType::Url,
            "https://evil.example.com/payload.bin".to_string()
        )));
        assert!(iocs.contains(&(
            IocType::Hash,
            "44d88612fea8a8f36de82e1278abb02f".to_string()
        )));
    }

    #[test]
    fn test_threat_score_levels() {
        let verdict = |level| IocReputation {
            value: "203.0.113.7".to_string(),
            ioc_type: IocType::Ip,
            malicious: 0,
            suspicious: 0,
            harmless: 0,
            undetected: 0,
            total_engines: 0,
            detection_ratio: "0/0".to_string(),
            reputation: 0,
            threat_level: level,
            confidence: VerdictConfidence::Low,
            labels: vec![],
            last_analysis_date: None,
        };

        let score = ThreatScore::from_reputations(&[
            verdict(ThreatLevel::Critical),
            verdict(ThreatLevel::Low),
            verdict(ThreatLevel::Clean),
            verdict(ThreatLevel::Medium),
        ]);
        assert_eq!(score.flagged, 2);
        assert_eq!(score.percentage(), 50.0);
        assert_eq!(score.level(), "high");

        let empty = ThreatScore::from_reputations(&[]);
        assert_eq!(empty.percentage(), 0.0);
        assert_eq!(empty.level(), "low");
    }
}
