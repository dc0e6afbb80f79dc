//! VirusTotal v3 reputation client
//!
//! Provides indicator reputation lookups used to enrich alert context and by
//! the standalone lookup endpoint.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Client;
use serde::Deserialize;

use crate::model::config::VirusTotalConfig;
use crate::model::ioc::{IocReputation, IocType, ThreatLevel, VerdictConfidence};
use crate::service::llm::ProviderError;

/// Reputation lookup for a single indicator
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    async fn lookup(&self, value: &str) -> Result<IocReputation, ProviderError>;
}

/// Client for the VirusTotal v3 API
#[derive(Debug, Clone)]
pub struct VirusTotalClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl VirusTotalClient {
    /// Create a client; `None` when no API key is configured
    pub fn from_config(config: &VirusTotalConfig) -> Option<Self> {
        let api_key = config.api_key.clone()?;
        Some(Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Object path for an indicator under the API base
    pub fn object_path(ioc_type: IocType, value: &str) -> String {
        match ioc_type {
            IocType::Hash => format!("files/{}", value.to_lowercase()),
            IocType::Url => format!("urls/{}", URL_SAFE_NO_PAD.encode(value.as_bytes())),
            IocType::Ip => format!("ip_addresses/{}", value),
            IocType::Domain => format!("domains/{}", value.to_lowercase()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ObjectResponse {
    data: ObjectData,
}

#[derive(Debug, Deserialize)]
struct ObjectData {
    #[serde(default)]
    attributes: ObjectAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct ObjectAttributes {
    /// Engine verdict counts keyed by category (malicious, harmless, timeout, ...)
    #[serde(default)]
    last_analysis_stats: std::collections::BTreeMap<String, u32>,
    #[serde(default)]
    reputation: i64,
    #[serde(default)]
    last_analysis_date: Option<i64>,
    #[serde(default)]
    popular_threat_classification: Option<ThreatClassification>,
}

#[derive(Debug, Default, Deserialize)]
struct ThreatClassification {
    #[serde(default)]
    suggested_threat_label: Option<String>,
}

/// Build a reputation summary from an object response body
pub fn parse_object_response(
    value: &str,
    ioc_type: IocType,
    body: &str,
) -> Result<IocReputation, ProviderError> {
    let response: ObjectResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::InvalidResponse(format!("Malformed VirusTotal response: {}", e))
    })?;
    let attributes = response.data.attributes;
    let stats = &attributes.last_analysis_stats;

    let count = |key: &str| stats.get(key).copied().unwrap_or(0);
    let malicious = count("malicious");
    let total_engines: u32 = stats.values().sum();

    let labels = attributes
        .popular_threat_classification
        .and_then(|c| c.suggested_threat_label)
        .map(|label| label.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    Ok(IocReputation {
        value: value.to_string(),
        ioc_type,
        malicious,
        suspicious: count("suspicious"),
        harmless: count("harmless"),
        undetected: count("undetected"),
        total_engines,
        detection_ratio: format!("{}/{}", malicious, total_engines),
        reputation: attributes.reputation,
        threat_level: ThreatLevel::from_detections(malicious, total_engines),
        confidence: VerdictConfidence::from_engine_count(total_engines),
        labels,
        last_analysis_date: attributes.last_analysis_date,
    })
}

#[async_trait]
impl ReputationLookup for VirusTotalClient {
    async fn lookup(&self, value: &str) -> Result<IocReputation, ProviderError> {
        let value = value.trim();
        let ioc_type = IocType::detect(value);
        let url = format!("{}/{}", self.base_url, Self::object_path(ioc_type, value));

        tracing::debug!(ioc = %value, ioc_type = ioc_type.as_str(), "Looking up IOC reputation");

        let response = self
            .client
            .get(&url)
            .header("x-apikey", &self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(ioc = %value, status = status, "VirusTotal lookup failed");
            return Err(ProviderError::Status { status, body });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout))?;
        let reputation = parse_object_response(value, ioc_type, &body)?;

        tracing::debug!(
            ioc = %value,
            threat_level = ?reputation.threat_level,
            detection_ratio = %reputation.detection_ratio,
            "Fetched IOC reputation"
        );

        Ok(reputation)
    }
}
