use serde::Deserialize;

/// Errors raised by `StrategyParameters::new` when a preset or an
/// override violates the delay invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("base_delay must be > 0 (got {0})")]
    BaseDelay(f64),

    #[error("min_delay must be within [0, base_delay] (got min={min}, base={base})")]
    MinDelay { min: f64, base: f64 },

    #[error("max_delay must be > base_delay (got max={max}, base={base})")]
    MaxDelay { max: f64, base: f64 },

    #[error("backoff_multiplier must be within (0, 10] (got {0})")]
    BackoffMultiplier(f64),

    #[error("decay_factor must be within (0, 1) (got {0})")]
    DecayFactor(f64),
}

// ------------------------------------------------------------
// Strategy parameters
// ------------------------------------------------------------
//
// Immutable tuning constants for one source type.
//
// All delays are in seconds. Construct through `new` (or one of
// the presets in `sources::*`) so the invariant
//
//     0 <= min_delay <= base_delay < max_delay
//
// always holds. Fields are private; read them via accessors.
//
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyParameters {
    base_delay: f64,
    min_delay: f64,
    max_delay: f64,
    backoff_multiplier: f64,
    decay_factor: f64,
    failure_grace: u32,
}

impl StrategyParameters {
    pub const DEFAULT_DECAY_FACTOR: f64 = 0.95;
    pub const DEFAULT_FAILURE_GRACE: u32 = 1;

    /// Validates and builds a parameter set with the default decay
    /// factor and failure grace.
    pub fn new(
        base_delay: f64,
        min_delay: f64,
        max_delay: f64,
        backoff_multiplier: f64,
    ) -> Result<Self, ParamsError> {
        Self {
            base_delay,
            min_delay,
            max_delay,
            backoff_multiplier,
            decay_factor: Self::DEFAULT_DECAY_FACTOR,
            failure_grace: Self::DEFAULT_FAILURE_GRACE,
        }
        .validated()
    }

    /// Returns a copy with a different success decay factor.
    pub fn with_decay_factor(mut self, decay_factor: f64) -> Result<Self, ParamsError> {
        self.decay_factor = decay_factor;
        self.validated()
    }

    /// Returns a copy tolerating `grace` consecutive failures before
    /// backing off. 0 backs off on the very first failure.
    pub fn with_failure_grace(mut self, grace: u32) -> Self {
        self.failure_grace = grace;
        self
    }

    fn validated(self) -> Result<Self, ParamsError> {
        // Written as negated comparisons so NaN is rejected too
        if !(self.base_delay > 0.0) || !self.base_delay.is_finite() {
            return Err(ParamsError::BaseDelay(self.base_delay));
        }
        if !(self.min_delay >= 0.0 && self.min_delay <= self.base_delay) {
            return Err(ParamsError::MinDelay {
                min: self.min_delay,
                base: self.base_delay,
            });
        }
        if !(self.max_delay > self.base_delay) || !self.max_delay.is_finite() {
            return Err(ParamsError::MaxDelay {
                max: self.max_delay,
                base: self.base_delay,
            });
        }
        if !(self.backoff_multiplier > 0.0 && self.backoff_multiplier <= 10.0) {
            return Err(ParamsError::BackoffMultiplier(self.backoff_multiplier));
        }
        if !(self.decay_factor > 0.0 && self.decay_factor < 1.0) {
            return Err(ParamsError::DecayFactor(self.decay_factor));
        }
        Ok(self)
    }

    /// Applies optional overrides from configuration on top of `self`.
    ///
    /// The result is validated as a whole, so an override may only be
    /// rejected in combination with the preset it is applied to.
    pub fn apply_overrides(&self, o: &ParamOverrides) -> Result<Self, ParamsError> {
        Self {
            base_delay: o.base_delay.unwrap_or(self.base_delay),
            min_delay: o.min_delay.unwrap_or(self.min_delay),
            max_delay: o.max_delay.unwrap_or(self.max_delay),
            backoff_multiplier: o.backoff_multiplier.unwrap_or(self.backoff_multiplier),
            decay_factor: o.decay_factor.unwrap_or(self.decay_factor),
            failure_grace: o.failure_grace.unwrap_or(self.failure_grace),
        }
        .validated()
    }

    pub fn base_delay(&self) -> f64 {
        self.base_delay
    }

    pub fn min_delay(&self) -> f64 {
        self.min_delay
    }

    pub fn max_delay(&self) -> f64 {
        self.max_delay
    }

    pub fn backoff_multiplier(&self) -> f64 {
        self.backoff_multiplier
    }

    pub fn decay_factor(&self) -> f64 {
        self.decay_factor
    }

    pub fn failure_grace(&self) -> u32 {
        self.failure_grace
    }
}

impl Default for StrategyParameters {
    fn default() -> Self {
        Self {
            base_delay: 2.0,
            min_delay: 0.5,
            max_delay: 60.0,
            backoff_multiplier: 2.0,
            decay_factor: Self::DEFAULT_DECAY_FACTOR,
            failure_grace: Self::DEFAULT_FAILURE_GRACE,
        }
    }
}

/// Per-source parameter overrides as read from `config.json`.
///
/// Every field is optional; missing fields keep the preset value.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct ParamOverrides {
    pub base_delay: Option<f64>,
    pub min_delay: Option<f64>,
    pub max_delay: Option<f64>,
    pub backoff_multiplier: Option<f64>,
    pub decay_factor: Option<f64>,
    pub failure_grace: Option<u32>,
}
