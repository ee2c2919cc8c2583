#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be {constraint}, got {value}")]
    OutOfRange {
        field: &'static str,
        constraint: &'static str,
        value: f64,
    },
    #[error("scoring table needs at least one zone")]
    NoZones,
    #[error("zone '{0}' has an invalid max distance")]
    InvalidZone(String),
}

pub(crate) fn positive(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            constraint: "finite and > 0",
            value,
        })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            constraint: "finite and >= 0",
            value,
        })
    }
}

pub(crate) fn unit_interval(field: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            field,
            constraint: "in (0,
            1]",
            value,
        })
    }
}
