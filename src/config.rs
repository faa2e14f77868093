use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// what happens to interest accrued while the first charge is deferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeferredInterestPolicy {
    /// accrued interest is added to the outstanding principal
    Capitalize,
    /// accrued interest is not charged
    Forgive,
}

/// when a bonification status change reaches the rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BonificationChangePolicy {
    /// from the first billing period after the change
    Prospective,
    /// for every period of the plan, including past ones
    Retroactive,
}

/// engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub deferred_interest: DeferredInterestPolicy,
    pub bonification_change: BonificationChangePolicy,
    /// days before the evaluation date in which a non-compliant bonification is at risk
    pub at_risk_window_days: u32,
    /// lead time for upcoming-evaluation and guarantee-ending alerts
    pub alert_lead_days: u32,
    /// longest term accepted on input
    pub max_term_months: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deferred_interest: DeferredInterestPolicy::Capitalize,
            bonification_change: BonificationChangePolicy::Prospective,
            at_risk_window_days: 60,
            alert_lead_days: 30,
            max_term_months: 600,
        }
    }
}

impl EngineConfig {
    /// grace periods forgive accrued interest instead of capitalizing it
    pub fn forgiving_grace() -> Self {
        Self {
            deferred_interest: DeferredInterestPolicy::Forgive,
            ..Self::default()
        }
    }

    /// load from a json document; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_term_months == 0 {
            return Err(EngineError::configuration("max_term_months must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.deferred_interest, DeferredInterestPolicy::Capitalize);
        assert_eq!(config.bonification_change, BonificationChangePolicy::Prospective);
        assert_eq!(config.at_risk_window_days, 60);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "deferred_interest": "Forgive", "alert_lead_days": 15 }"#).unwrap();
        assert_eq!(config, EngineConfig { alert_lead_days: 15, ..EngineConfig::forgiving_grace() });
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(EngineError::Serialization { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json(r#"{ "max_term_months": 0 }"#),
            Err(EngineError::Configuration { .. })
        ));
    }
}
