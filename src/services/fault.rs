//! Fault injection for consistency testing
//!
//! An injectable hook that makes a persistence step fail with a configured
//! probability, used to demonstrate that a failing unit of work leaves no
//! partial writes behind. Disabled unless `FAULT_INJECTION_PROBABILITY` is
//! set; never unconditional.

use std::fmt;

use rand::Rng;

#[derive(Debug)]
pub struct InjectedFault {
    operation: String,
}

impl fmt::Display for InjectedFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "injected fault during {}", self.operation)
    }
}

impl std::error::Error for InjectedFault {}

#[derive(Clone)]
pub struct FaultInjector {
    probability: f64,
}

impl FaultInjector {
    /// Read `FAULT_INJECTION_PROBABILITY` (0.0 - 1.0); unset or unparsable
    /// means disabled.
    pub fn from_env() -> Self {
        let probability = std::env::var("FAULT_INJECTION_PROBABILITY")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0);
        Self {
            probability: probability.clamp(0.0, 1.0),
        }
    }

    /// Deterministic constructors for tests.
    #[allow(dead_code)]
    pub fn disabled() -> Self {
        Self { probability: 0.0 }
    }

    #[allow(dead_code)]
    pub fn always() -> Self {
        Self { probability: 1.0 }
    }

    pub fn enabled(&self) -> bool {
        self.probability > 0.0
    }

    /// Fail `operation` with the configured probability.
    pub fn maybe_fail(&self, operation: &str) -> Result<(), InjectedFault> {
        if self.probability > 0.0 && rand::rng().random_bool(self.probability) {
            return Err(InjectedFault {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}
