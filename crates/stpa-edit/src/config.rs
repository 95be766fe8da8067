//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tunables for the smart-edit engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Generation attempts per request (original plus stricter retries)
    pub max_generation_attempts: usize,
    /// Minimum context keywords a generated line must share to count as
    /// grounded when it mentions no entity phrase
    pub min_shared_keywords: usize,
    /// Fallback grounding context: lines taken from the top of the document
    /// when no system-description section exists
    pub fallback_head_lines: usize,
    /// Fallback grounding context: lines taken immediately before the target
    /// section
    pub fallback_context_lines: usize,
    /// Whether to propose repair plans after coverage gaps are found
    pub propose_repairs: bool,
}

impl EngineConfig {
    /// Create the default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a different generation attempt bound.
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_generation_attempts = attempts.max(1);
        self
    }

    /// With a different grounding keyword threshold.
    #[inline]
    #[must_use]
    pub fn with_min_shared_keywords(mut self, min: usize) -> Self {
        self.min_shared_keywords = min;
        self
    }

    /// Enable or disable repair-plan proposals.
    #[inline]
    #[must_use]
    pub fn with_repair_proposals(mut self, enabled: bool) -> Self {
        self.propose_repairs = enabled;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_generation_attempts: 2,
            min_shared_keywords: 2,
            fallback_head_lines: 30,
            fallback_context_lines: 10,
            propose_repairs: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_bound_the_retry_loop() {
        let config = EngineConfig::new();
        assert_eq!(config.max_generation_attempts, 2);
        assert!(config.propose_repairs);
    }

    #[test]
    fn builders_clamp_attempts() {
        let config = EngineConfig::new().with_max_attempts(0);
        assert_eq!(config.max_generation_attempts, 1);
    }
}
