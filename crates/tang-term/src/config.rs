//! Per-builder configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TermError};

/// Default steepness of the soft `<` / `<=` constraints.
pub const DEFAULT_STEEPNESS: f64 = 0.01;

/// How the `&` / `|` combinators are interpreted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicMode {
    /// `&` builds MIN nodes, `|` builds MAX nodes.
    #[default]
    Soft,
    /// `&` builds AND nodes, `|` builds OR nodes.
    Crisp,
}

/// Settings a [`TermBuilder`](crate::TermBuilder) applies to the operator-level
/// combinators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub logic: LogicMode,
    /// Slope of a violated `<` / `<=` constraint.
    pub steepness: f64,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            logic: LogicMode::Soft,
            steepness: DEFAULT_STEEPNESS,
        }
    }
}

impl BuilderConfig {
    pub fn crisp() -> Self {
        Self {
            logic: LogicMode::Crisp,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.steepness.is_finite() || self.steepness <= 0.0 {
            return Err(TermError::InvalidConfig {
                reason: format!("steepness must be finite and positive, got {}", self.steepness),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = BuilderConfig::default();
        assert_eq!(c.logic, LogicMode::Soft);
        assert_eq!(c.steepness, DEFAULT_STEEPNESS);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_bad_steepness() {
        let c = BuilderConfig {
            steepness: 0.0,
            ..BuilderConfig::default()
        };
        assert!(matches!(c.validate(), Err(TermError::InvalidConfig { .. })));

        let c = BuilderConfig {
            steepness: f64::NAN,
            ..BuilderConfig::default()
        };
        assert!(c.validate().is_err());
    }

    #[test]
    fn partial_json() {
        let c: BuilderConfig = serde_json::from_str(r#"{ "logic": "crisp" }"#).unwrap();
        assert_eq!(c.logic, LogicMode::Crisp);
        assert_eq!(c.steepness, DEFAULT_STEEPNESS);

        let c: BuilderConfig = serde_json::from_str(r#"{ "steepness": 0.5 }"#).unwrap();
        assert_eq!(c.logic, LogicMode::Soft);
        assert_eq!(c.steepness, 0.5);
    }
}
