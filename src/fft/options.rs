//! Plan configuration.
//!
//! Defaults are conservative and tuned for performance on mobile GPUs.

use serde::{Deserialize, Serialize};

use super::types::PrecisionOptions;
use super::FftError;

/// Options that only affect performance, never the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceOptions {
    /// Workgroup size in X. Large values can make small transforms impossible.
    pub workgroup_size_x: u32,
    /// Workgroup size in Y. Must be 1 for transforms with Ny == 1.
    pub workgroup_size_y: u32,
    /// Floats processed per invocation. Scalar GPUs prefer 2, vector GPUs 4 or 8.
    pub vector_size: u32,
    /// Use banked shared memory for radix 16 and 64.
    pub shared_banked: bool,
}

impl Default for PerformanceOptions {
    fn default() -> Self {
        Self {
            workgroup_size_x: 4,
            workgroup_size_y: 1,
            vector_size: 2,
            shared_banked: false,
        }
    }
}

/// Full option set for plan construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FftOptions {
    pub performance: PerformanceOptions,
    pub precision: PrecisionOptions,
}

impl PerformanceOptions {
    /// Vector sizes are 2, 4 or 8 and workgroup sizes are powers of two.
    ///
    /// Any other workgroup size leaves part of a power-of-two axis without
    /// an invocation.
    pub fn validate(&self) -> Result<(), FftError> {
        if !matches!(self.vector_size, 2 | 4 | 8) {
            return Err(FftError::InvalidConfig(format!(
                "vector_size must be 2, 4 or 8, got {}",
                self.vector_size
            )));
        }
        if !self.workgroup_size_x.is_power_of_two() || !self.workgroup_size_y.is_power_of_two() {
            return Err(FftError::InvalidConfig(format!(
                "workgroup sizes must be powers of two, got ({}, {})",
                self.workgroup_size_x, self.workgroup_size_y
            )));
        }
        Ok(())
    }
}

impl FftOptions {
    pub fn validate(&self) -> Result<(), FftError> {
        self.performance.validate()
    }

    /// Same options with different performance settings.
    pub fn with_performance(self, performance: PerformanceOptions) -> Self {
        Self {
            performance,
            ..self
        }
    }

    pub fn from_json(json: &str) -> Result<Self, FftError> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(FftOptions::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_vector_size() {
        let mut options = FftOptions::default();
        options.performance.vector_size = 3;
        assert!(matches!(
            options.validate(),
            Err(FftError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_non_power_of_two_workgroups() {
        for (x, y) in [(0, 1), (3, 1), (4, 0), (4, 6)] {
            let mut options = FftOptions::default();
            options.performance.workgroup_size_x = x;
            options.performance.workgroup_size_y = y;
            assert!(
                matches!(options.validate(), Err(FftError::InvalidConfig(_))),
                "({x}, {y}) accepted"
            );
        }
        let json = r#"{ "performance": { "workgroup_size_x": 12 } }"#;
        assert!(FftOptions::from_json(json).is_err());
    }

    #[test]
    fn test_partial_json() {
        let options =
            FftOptions::from_json(r#"{ "performance": { "vector_size": 4 }, "precision": { "normalize": true } }"#)
                .unwrap();
        assert_eq!(options.performance.vector_size, 4);
        assert_eq!(options.performance.workgroup_size_x, 4);
        assert!(options.precision.normalize);
        assert!(!options.precision.fp16);
    }
}
