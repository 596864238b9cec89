//! Bucket definitions and their validated form

use serde::{Deserialize, Serialize};

/// A bucket as written in configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketDefinition {
    /// Requests per minute
    pub rpm: u64,
    /// Requests per day
    pub rpd: u64,
    /// Tokens per minute
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm: Option<u64>,
    /// Model served through this bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Provider name; coordinator buckets default to the id's tail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Overrides the global safety margin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_margin: Option<f64>,
}

impl BucketDefinition {
    pub fn new(rpm: u64, rpd: u64) -> Self {
        Self {
            rpm,
            rpd,
            tpm: None,
            model: None,
            provider: None,
            safety_margin: None,
        }
    }

    pub fn with_tpm(mut self, tpm: u64) -> Self {
        self.tpm = Some(tpm);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_safety_margin(mut self, margin: f64) -> Self {
        self.safety_margin = Some(margin);
        self
    }
}

/// Configured limits, before the safety margin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    pub rpm: u64,
    pub rpd: u64,
    pub tpm: Option<u64>,
}

/// Organisational group of a bucket, derived from its id.
///
/// `coordinators.<provider>`, `internal.<role>` and `subagents.<name>` are
/// recognised; anything else (including legacy model-family ids) is
/// `Standalone`. The limiter itself treats every id as opaque.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum BucketCategory {
    Coordinator { provider: String },
    Internal { role: String },
    Subagent { name: String },
    Standalone,
}

impl BucketCategory {
    /// Classify a bucket id by its hierarchical prefix
    pub fn classify(bucket_id: &str) -> Result<Self, String> {
        let Some((group, tail)) = bucket_id.split_once('.') else {
            return Ok(BucketCategory::Standalone);
        };

        let category = match group {
            "coordinators" => BucketCategory::Coordinator {
                provider: tail.to_string(),
            },
            "internal" => BucketCategory::Internal {
                role: tail.to_string(),
            },
            "subagents" => BucketCategory::Subagent {
                name: tail.to_string(),
            },
            _ => return Ok(BucketCategory::Standalone),
        };

        if tail.is_empty() {
            return Err(format!("Bucket id '{}' has an empty {} name", bucket_id, group));
        }
        Ok(category)
    }
}

/// A validated bucket, as the limiter consumes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub id: String,
    pub category: BucketCategory,
    pub limits: RateLimits,
    pub safety_margin: f64,
    pub model: Option<String>,
    pub provider: String,
}

impl BucketConfig {
    /// Build from a definition; `global_margin` applies when the bucket has no override.
    ///
    /// The definition is expected to have passed validation already.
    pub fn from_definition(
        id: &str,
        definition: &BucketDefinition,
        global_margin: f64,
    ) -> Result<Self, String> {
        let category = BucketCategory::classify(id)?;
        let provider = definition
            .provider
            .clone()
            .or_else(|| match &category {
                BucketCategory::Coordinator { provider } => Some(provider.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            id: id.to_string(),
            category,
            limits: RateLimits {
                rpm: definition.rpm,
                rpd: definition.rpd,
                tpm: definition.tpm,
            },
            safety_margin: definition.safety_margin.unwrap_or(global_margin),
            model: definition.model.clone(),
            provider,
        })
    }

    pub fn effective_rpm(&self) -> u64 {
        effective_limit(self.limits.rpm, self.safety_margin)
    }

    pub fn effective_rpd(&self) -> u64 {
        effective_limit(self.limits.rpd, self.safety_margin)
    }

    pub fn effective_tpm(&self) -> Option<u64> {
        self.limits
            .tpm
            .map(|tpm| effective_limit(tpm, self.safety_margin))
    }
}

/// `floor(limit × (1 − margin))`
pub fn effective_limit(limit: u64, margin: f64) -> u64 {
    // Nudge so that e.g. 100 × 0.9 does not floor to 89
    ((limit as f64) * (1.0 - margin) + 1e-9).floor() as u64
}
