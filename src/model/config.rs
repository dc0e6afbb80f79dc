use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use super::analysis::AnalysisKind;

const ENV_CONFIG_PATH: &str = "OPENSOC_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_LLM_PROVIDER: &str = "OPENSOC_LLM_PROVIDER";
const ENV_LLM_BASE_URL: &str = "OPENSOC_LLM_BASE_URL";
const ENV_LLM_MODEL: &str = "OPENSOC_LLM_MODEL";
const ENV_LLM_API_KEY: &str = "OPENSOC_LLM_API_KEY";
const ENV_NVIDIA_API_KEY: &str = "NVIDIA_API_KEY";
const ENV_VIRUSTOTAL_API_KEY: &str = "VIRUSTOTAL_API_KEY";

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_COMPATIBLE_URL: &str = "https://integrate.api.nvidia.com/v1";
const DEFAULT_NAT_URL: &str = "http://localhost:9902";
const DEFAULT_VIRUSTOTAL_URL: &str = "https://www.virustotal.com/api/v3";

/// Which completion backend serves prompts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions (NVIDIA NIM endpoints)
    OpenaiCompatible,
    /// NAT execution service running the OpenSOC agent workflow
    Nat,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "ollama" => Some(ProviderKind::Ollama),
            "openai_compatible" | "openai" | "nvidia" | "nim" => Some(ProviderKind::OpenaiCompatible),
            "nat" => Some(ProviderKind::Nat),
            _ => None,
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => DEFAULT_OLLAMA_URL,
            ProviderKind::OpenaiCompatible => DEFAULT_OPENAI_COMPATIBLE_URL,
            ProviderKind::Nat => DEFAULT_NAT_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Ollama => "llama3.1:8b",
            ProviderKind::OpenaiCompatible => "meta/llama-3.1-70b-instruct",
            ProviderKind::Nat => "open-soc-agent",
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    /// Falls back to the provider's default URL
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Never read from the config file; supplied through the environment
    #[serde(skip)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            base_url: None,
            model: None,
            api_key: None,
            temperature: 0.0,
            top_p: 1.0,
            max_tokens: 2048,
        }
    }
}

impl LlmConfig {
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    pub fn resolved_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }
}

/// Pipeline behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Append a timeline event when an artifact is created or changes
    pub record_timeline: bool,
    /// Per-kind timeout overrides in seconds, keyed by kind name (e.g. `classification`)
    pub timeouts: HashMap<String, u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            record_timeline: true,
            timeouts: HashMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Reject timeout overrides for unknown kinds or of zero seconds
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, secs) in &self.timeouts {
            if AnalysisKind::parse(key).is_none() {
                let known: Vec<&str> = AnalysisKind::ALL.iter().map(|k| k.as_str()).collect();
                return Err(ConfigError::Invalid(format!(
                    "pipeline.timeouts has unknown kind '{}', expected one of: {}",
                    key,
                    known.join(", ")
                )));
            }
            if *secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "pipeline.timeouts.{} must be at least 1 second",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Provider timeout for a kind: config override, else the kind's default
    pub fn timeout_for(&self, kind: AnalysisKind) -> Duration {
        let secs = self
            .timeouts
            .get(kind.as_str())
            .copied()
            .unwrap_or_else(|| default_timeout_secs(kind));
        Duration::from_secs(secs)
    }
}

/// Default provider timeout per kind; long-form generations get more time
pub fn default_timeout_secs(kind: AnalysisKind) -> u64 {
    match kind {
        AnalysisKind::Classification => 60,
        AnalysisKind::AlertAnalysis
        | AnalysisKind::ImpactAssessment
        | AnalysisKind::InvestigationPlan
        | AnalysisKind::ContainmentStrategy
        | AnalysisKind::Timeline
        | AnalysisKind::LogAnalysis => 120,
        AnalysisKind::IncidentForm | AnalysisKind::ThreatHunt => 180,
        AnalysisKind::ImmediateActionPlaybook | AnalysisKind::InvestigationPlaybook => 300,
    }
}

/// VirusTotal lookup configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VirusTotalConfig {
    pub base_url: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for VirusTotalConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_VIRUSTOTAL_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Configuration file could not be used
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// YAML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub virustotal: VirusTotalConfig,
}

impl ConfigFile {
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let contents = contents.trim();
        if contents.is_empty() {
            return Ok(Self::default());
        }

        let file: Self = serde_yaml::from_str(contents)?;
        file.pipeline.validate()?;
        if file.virustotal.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "virustotal.timeout_secs must be at least 1 second".to_string(),
            ));
        }
        Ok(file)
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub virustotal: VirusTotalConfig,
    pub port: u16,
    pub host: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            pipeline: PipelineConfig::default(),
            virustotal: VirusTotalConfig::default(),
            port: 8080,
            host: "127.0.0.1".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment and config file
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let config_path = std::env::var(ENV_CONFIG_PATH)
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let file = Self::load_config_file(&config_path).unwrap_or_default();

        let mut llm = file.llm;
        if let Ok(provider) = std::env::var(ENV_LLM_PROVIDER) {
            match ProviderKind::parse(&provider) {
                Some(kind) => llm.provider = kind,
                None => {
                    tracing::warn!(provider = %provider, "Unknown LLM provider in environment, keeping configured provider")
                }
            }
        }
        if let Ok(base_url) = std::env::var(ENV_LLM_BASE_URL) {
            llm.base_url = Some(base_url);
        }
        if let Ok(model) = std::env::var(ENV_LLM_MODEL) {
            llm.model = Some(model);
        }
        llm.api_key = std::env::var(ENV_LLM_API_KEY)
            .or_else(|_| std::env::var(ENV_NVIDIA_API_KEY))
            .ok()
            .filter(|k| !k.is_empty());

        let mut virustotal = file.virustotal;
        virustotal.api_key = std::env::var(ENV_VIRUSTOTAL_API_KEY)
            .ok()
            .filter(|k| !k.is_empty());

        Self {
            llm,
            pipeline: file.pipeline,
            virustotal,
            port,
            host,
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<ConfigFile> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => match ConfigFile::parse(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "Loaded configuration from file");
                    Some(config)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Rejected config file, using defaults");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
