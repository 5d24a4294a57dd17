//! Workflow settings resolved from configuration

use std::time::Duration;

use corens_core::{RegistrationConfig, Result};
use ethers::types::U256;

#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    pub suffix: String,
    /// Registration fee in wei
    pub fee: U256,
    pub confirmation_timeout: Duration,
    pub confirmation_poll: Duration,
    /// Delay between success and the redirect notification
    pub success_reset_delay: Duration,
}

impl RegistrationSettings {
    /// # Errors
    /// `Config` when the fee does not parse
    pub fn from_config(config: &RegistrationConfig) -> Result<Self> {
        Ok(Self {
            suffix: config.suffix.clone(),
            fee: config.fee_wei()?,
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            confirmation_poll: Duration::from_millis(config.confirmation_poll_ms),
            success_reset_delay: Duration::from_millis(config.success_reset_delay_ms),
        })
    }
}

impl Default for RegistrationSettings {
    fn default() -> Self {
        let config = RegistrationConfig::default();
        Self {
            suffix: config.suffix,
            fee: U256::exp10(18),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
            confirmation_poll: Duration::from_millis(config.confirmation_poll_ms),
            success_reset_delay: Duration::from_millis(config.success_reset_delay_ms),
        }
    }
}
