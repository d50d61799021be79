use crate::error::{IrError, Result};

/// Environment key toggling lowered-shape verification.
pub const VERIFY_SHAPES_ENV: &str = "IR_VERIFY_SHAPES";
/// Environment key toggling full node descriptions in lowering traces.
pub const TRACE_LOWERING_ENV: &str = "IR_TRACE_LOWERING";

/// Knobs for a lowering session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoweringConfig {
    /// Check every lowered output against the node's inferred shape.
    pub verify_shapes: bool,
    /// Log the full node description (rather than id and kind) for every
    /// node lowered.
    pub trace_descriptions: bool,
}

impl Default for LoweringConfig {
    fn default() -> Self {
        LoweringConfig {
            verify_shapes: true,
            trace_descriptions: false,
        }
    }
}

impl LoweringConfig {
    pub fn with_verify_shapes(mut self, verify_shapes: bool) -> Self {
        self.verify_shapes = verify_shapes;
        self
    }

    pub fn with_trace_descriptions(mut self, trace_descriptions: bool) -> Self {
        self.trace_descriptions = trace_descriptions;
        self
    }

    /// Reads overrides from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from defaults overridden by whatever `lookup` returns
    /// for each known key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(VERIFY_SHAPES_ENV) {
            config.verify_shapes = parse_flag(VERIFY_SHAPES_ENV, &value)?;
        }
        if let Some(value) = lookup(TRACE_LOWERING_ENV) {
            config.trace_descriptions = parse_flag(TRACE_LOWERING_ENV, &value)?;
        }
        Ok(config)
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(IrError::InvalidConfig {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}
