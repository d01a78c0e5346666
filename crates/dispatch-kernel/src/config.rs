//! Orchestrator tuning configuration.
//!
//! Everything here is a policy knob this core itself needs, not CI-topology
//! configuration (which builders exist, credentials, source control) —
//! that remains a host responsibility and out of scope for this crate. A
//! host may load [`OrchestratorConfig`] from whatever config layer it
//! already uses via `serde`; with the `config-loader` feature enabled, this
//! crate can also load it directly through the `config` crate (TOML/JSON/
//! YAML, with environment-variable overrides under the `DISPATCH_` prefix).

use serde::{Deserialize, Serialize};

/// How a `BuildSet`'s rolling result escalates among non-`FAILURE`
/// outcomes. `FAILURE` is always the most severe result and always flips
/// `still_hopeful`, regardless of this setting — this knob only orders the
/// remaining outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExceptionSeverity {
    /// `WARNINGS > EXCEPTION > SKIPPED > SUCCESS`. This is the default:
    /// it resolves the upstream "one WARNINGS should mean overall
    /// WARNINGS" note in the direction that note itself pointed.
    WarningsOutrankException,
    /// `EXCEPTION > WARNINGS > SKIPPED > SUCCESS`. Available for hosts
    /// that want an unexpected exception to dominate an expected warning.
    ExceptionOutranksWarnings,
}

impl Default for ExceptionSeverity {
    fn default() -> Self {
        Self::WarningsOutrankException
    }
}

/// Whether a failure in one cohort should stop later cohorts from being
/// submitted at all, in ordered mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShortCircuitPolicy {
    /// Matches the upstream behavior this crate is modeled on: every
    /// request eventually runs, regardless of earlier failures. This is
    /// the default — existing callers see unchanged behavior.
    ContinueAfterFailure,
    /// Skip submitting any cohort after the first one containing a
    /// failure; those requests are never created and are reported as
    /// `Skipped` to watchers that enumerate per-request outcomes.
    StopOnFailure,
}

impl Default for ShortCircuitPolicy {
    fn default() -> Self {
        Self::ContinueAfterFailure
    }
}

/// Tuning knobs for the `BuildSet` orchestrator. `OrchestratorConfig::default()`
/// reproduces the original upstream behavior exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub exception_severity: ExceptionSeverity,
    pub short_circuit: ShortCircuitPolicy,
    /// Buffer size for the broadcast channel backing the reference
    /// `InMemoryStatusSink`'s watcher fan-out.
    pub request_channel_capacity: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            exception_severity: ExceptionSeverity::default(),
            short_circuit: ShortCircuitPolicy::default(),
            request_channel_capacity: 256,
        }
    }
}

#[cfg(feature = "config-loader")]
mod loader {
    use super::OrchestratorConfig;
    use config::{Config, Environment, File};

    /// Load an [`OrchestratorConfig`] from a file (format auto-detected
    /// from its extension) layered with `DISPATCH_`-prefixed environment
    /// variable overrides. Fields absent from both sources keep the
    /// `#[serde(default)]` values on [`OrchestratorConfig`].
    pub fn load(path: &str) -> Result<OrchestratorConfig, config::ConfigError> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("DISPATCH"))
            .build()?;
        settings.try_deserialize()
    }
}

#[cfg(feature = "config-loader")]
pub use loader::load;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_base_spec_behavior() {
        let cfg = OrchestratorConfig::default();
        assert_eq!(cfg.short_circuit, ShortCircuitPolicy::ContinueAfterFailure);
        assert_eq!(
            cfg.exception_severity,
            ExceptionSeverity::WarningsOutrankException
        );
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = OrchestratorConfig {
            short_circuit: ShortCircuitPolicy::StopOnFailure,
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: OrchestratorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
