//! Error type shared by every part of the simulator.

use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("I/O error on `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {what}")]
    Config { what: String },

    #[error("invalid argument: {what}")]
    InvalidArg { what: String },

    #[error("non-finite value for {what}: {value}")]
    NonFinite { what: &'static str, value: f64 },

    #[error("degenerate computation: {what}")]
    Degenerate { what: &'static str },
}

impl SimError {
    pub fn config<S: Into<String>>(what: S) -> SimError {
        SimError::Config { what: what.into() }
    }

    pub fn invalid_arg<S: Into<String>>(what: S) -> SimError {
        SimError::InvalidArg { what: what.into() }
    }
}

/// Returns `value` if it is finite, otherwise a `NonFinite` error naming it.
pub(crate) fn ensure_finite(what: &'static str, value: f64) -> SimResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SimError::NonFinite { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = SimError::config("`bore` must be greater than zero");
        assert!(err.to_string().contains("bore"));

        let err = SimError::NonFinite {
            what: "temperature",
            value: f64::NAN,
        };
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn finite_guard() {
        assert_eq!(ensure_finite("pressure", 1.0e5).unwrap(), 1.0e5);
        assert!(matches!(
            ensure_finite("pressure", f64::INFINITY),
            Err(SimError::NonFinite { what: "pressure", .. })
        ));
    }
}
