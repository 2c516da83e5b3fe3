//! Full configuration validation.
//!
//! Each section is checked independently and every violation is collected
//! into a single `ConfigError`.

mod helpers;


use crate::schema::WalkieConfig;
use walkie_common::ConfigError;

use helpers::{check_not_below, check_range, check_ws_url};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &WalkieConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_signaling(&mut errors, config);
    validate_resilience(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_signaling(errors: &mut Vec<String>, config: &WalkieConfig) {
    let signaling = &config.signaling;

    check_ws_url(errors, "signaling.url", &signaling.url);
    check_range(
        errors,
        "signaling.reconnection_attempts",
        signaling.reconnection_attempts,
        0,
        100,
    );
    check_range(
        errors,
        "signaling.reconnection_delay_ms",
        signaling.reconnection_delay_ms,
        100,
        60_000,
    );
    check_not_below(
        errors,
        (
            "signaling.max_reconnection_delay_ms",
            signaling.max_reconnection_delay_ms,
        ),
        (
            "signaling.reconnection_delay_ms",
            signaling.reconnection_delay_ms,
        ),
    );
    check_range(
        errors,
        "signaling.connect_timeout_secs",
        signaling.connect_timeout_secs,
        1,
        120,
    );
}

fn validate_resilience(errors: &mut Vec<String>, config: &WalkieConfig) {
    let resilience = &config.resilience;
    check_range(
        errors,
        "resilience.grace_period_ms",
        resilience.grace_period_ms,
        100,
        60_000,
    );
    check_range(
        errors,
        "resilience.retry_interval_ms",
        resilience.retry_interval_ms,
        100,
        60_000,
    );
}
