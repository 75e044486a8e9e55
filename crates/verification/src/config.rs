//! Verification configuration and settings

use serde::{Deserialize, Serialize};

/// Verification configuration that controls how thorough the verification process is
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Level of verification to perform
    pub verification_level: VerificationLevel,

    /// Number of random input vectors to run through both functions
    pub test_case_count: usize,

    /// Instruction budget for one run of the original function
    pub fuel: u64,

    /// Random seed for deterministic test generation
    pub test_seed: u64,
}

/// Different levels of verification thoroughness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationLevel {
    /// Quick verification for development (minimal testing)
    Quick,
    /// Standard verification for CI (balanced)
    Standard,
    /// Comprehensive verification before release (exhaustive)
    Comprehensive,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl VerificationConfig {
    /// Quick verification configuration for development
    pub fn development() -> Self {
        Self {
            verification_level: VerificationLevel::Quick,
            test_case_count: 16,
            fuel: 10_000,
            test_seed: 42,
        }
    }

    /// Standard verification configuration for CI
    pub fn standard() -> Self {
        Self {
            verification_level: VerificationLevel::Standard,
            test_case_count: 128,
            fuel: 100_000,
            test_seed: 12345,
        }
    }

    /// Comprehensive verification configuration
    pub fn comprehensive() -> Self {
        Self {
            verification_level: VerificationLevel::Comprehensive,
            test_case_count: 1024,
            fuel: 1_000_000,
            test_seed: 98765,
        }
    }

    pub fn for_level(level: VerificationLevel) -> Self {
        match level {
            VerificationLevel::Quick => Self::development(),
            VerificationLevel::Standard => Self::standard(),
            VerificationLevel::Comprehensive => Self::comprehensive(),
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), crate::VerificationError> {
        if self.test_case_count == 0 {
            return Err(crate::VerificationError::Configuration(
                "test_case_count must be greater than 0".to_string(),
            ));
        }

        if self.fuel == 0 {
            return Err(crate::VerificationError::Configuration(
                "fuel must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = VerificationConfig::development();
        assert!(config.validate().is_ok());

        config.test_case_count = 0;
        assert!(config.validate().is_err());

        config.test_case_count = 10;
        config.fuel = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_verification_levels() {
        let dev = VerificationConfig::for_level(VerificationLevel::Quick);
        let std = VerificationConfig::for_level(VerificationLevel::Standard);
        let full = VerificationConfig::for_level(VerificationLevel::Comprehensive);

        assert_eq!(dev.verification_level, VerificationLevel::Quick);
        assert_eq!(std.verification_level, VerificationLevel::Standard);
        assert_eq!(full.verification_level, VerificationLevel::Comprehensive);

        assert!(full.test_case_count > std.test_case_count);
        assert!(std.test_case_count > dev.test_case_count);
    }

    #[test]
    fn test_config_serde() {
        let json = serde_json::to_string(&VerificationConfig::development()).unwrap();
        let back: VerificationConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verification_level, VerificationLevel::Quick);
        assert_eq!(back.fuel, 10_000);
    }
}
