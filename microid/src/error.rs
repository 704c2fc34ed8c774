use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("serial {0} is outside the 20-bit range 0..=1048575")]
    InvalidSerial(u64),

    #[error("grid text has {0} binary characters, expected 25")]
    InvalidGridLength(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown module type '{0}'")]
    UnknownModuleType(String),

    #[error("module table parse error: {0}")]
    Parse(String),

    #[error("module table is empty")]
    Empty,

    #[error("module '{0}' is defined more than once")]
    Duplicate(String),

    #[error("module '{name}': {field} must be positive and finite, got {value}")]
    InvalidDimension {
        name: String,
        field: &'static str,
        value: f64,
    },

    #[error("module '{0}': Micro-ID footprint does not fit inside the module")]
    FootprintOutside(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocateError {
    #[error("no module-shaped region found in the image")]
    ModuleNotDetected,
}

/// Failure reported by a grid reader for one crop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("crop is empty")]
    EmptyCrop,

    #[error("no answer for rotation {0}°")]
    NoAnswer(u16),

    #[error("reader failed: {0}")]
    Failed(String),
}
