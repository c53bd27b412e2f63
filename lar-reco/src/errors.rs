//! Error types for the reconstruction orchestrator.
//!
//! Startup problems (`ConfigurationError`, and `GeometryError` wrapped inside
//! it) are fatal. `ReconstructionError` is scoped to a single event and is
//! contained by the event loop.

use crate::core::RecoStage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Umbrella error for the binary and other top-level callers.
#[derive(Debug, Error)]
pub enum LarRecoError {
    /// Missing or inconsistent configuration.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    /// A reconstruction context failed outside event processing.
    #[error("{0}")]
    Reconstruction(#[from] ReconstructionError),

    /// The event input could not be opened or read.
    #[error("{0}")]
    EventSource(#[from] EventSourceError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal configuration error raised before any event is processed.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A mandatory parameter was left empty.
    #[error("Missing mandatory parameter '{name}'")]
    MissingParameter {
        /// The parameter name.
        name: &'static str,
    },

    /// A referenced file does not exist.
    #[error("{what} not found: {}", path.display())]
    FileNotFound {
        /// Human readable description of the file.
        what: &'static str,
        /// The path that was checked.
        path: PathBuf,
    },

    /// A referenced file exists but could not be read.
    #[error("Unable to read {what} {}: {source}", path.display())]
    Unreadable {
        /// Human readable description of the file.
        what: &'static str,
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A parameter has an unusable value.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// The parameter name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// The parameters file could not be parsed.
    #[error("Malformed parameters file {}: {reason}", path.display())]
    MalformedParameters {
        /// The parameters file.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The drift volume description could not be turned into volumes.
    #[error("{0}")]
    Geometry(#[from] GeometryError),

    /// Context creation failed while wiring the instances.
    #[error("Context creation failed: {0}")]
    ContextCreation(#[from] ReconstructionError),
}

impl ConfigurationError {
    /// Creates a missing parameter error.
    #[must_use]
    pub fn missing(name: &'static str) -> Self {
        Self::MissingParameter { name }
    }

    /// Creates a file-not-found error.
    #[must_use]
    pub fn not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound {
            what,
            path: path.into(),
        }
    }

    /// Creates an invalid parameter error.
    #[must_use]
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Failure reading the event input.
#[derive(Debug, Error)]
pub enum EventSourceError {
    /// The input could not be opened or read.
    #[error("Unable to read events from {}: {source}", path.display())]
    Io {
        /// The event file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// One record could not be decoded. Later records may still be readable.
    #[error("Malformed event record at line {line}: {reason}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// Decoder message.
        reason: String,
    },
}

impl EventSourceError {
    /// Returns true if reading cannot continue after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

/// Malformed drift volume or detector geometry description.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// The description text failed to parse.
    #[error("Malformed {what} {}: {reason}", path.display())]
    Parse {
        /// Which description failed.
        what: &'static str,
        /// The file that failed.
        path: PathBuf,
        /// Parser message.
        reason: String,
    },

    /// The description contains no drift volumes.
    #[error("Drift volume description {} defines no volumes", path.display())]
    NoVolumes {
        /// The description file.
        path: PathBuf,
    },

    /// Two volumes share an identifier.
    #[error("Duplicate drift volume identifier {volume_id}")]
    DuplicateVolume {
        /// The repeated identifier.
        volume_id: u32,
    },

    /// A volume has a zero or negative extent.
    #[error("Drift volume {volume_id} has non-positive width along {axis}")]
    DegenerateVolume {
        /// The offending volume.
        volume_id: u32,
        /// Axis name.
        axis: &'static str,
    },

    /// A detector gap does not sit between two drift volumes.
    #[error("Detector gap [{x_low}, {x_high}] does not separate two drift volumes")]
    UnboundedGap {
        /// Low x edge of the gap.
        x_low: f64,
        /// High x edge of the gap.
        x_high: f64,
    },
}

/// A context call failed while reconstructing one event.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("Reconstruction error in '{context}'{}: {message}", stage.map(|s| format!(" during {s}")).unwrap_or_default())]
pub struct ReconstructionError {
    /// Name of the context that failed.
    pub context: String,
    /// The stage being run, if any.
    pub stage: Option<RecoStage>,
    /// The error message.
    pub message: String,
    /// Additional context.
    #[serde(default)]
    pub details: HashMap<String, String>,
}

impl ReconstructionError {
    /// Creates a new reconstruction error.
    #[must_use]
    pub fn new(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            stage: None,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates an error attributed to a stage.
    #[must_use]
    pub fn in_stage(context: impl Into<String>, stage: RecoStage, message: impl Into<String>) -> Self {
        Self::new(context, message).with_stage(stage)
    }

    /// Sets the stage.
    #[must_use]
    pub fn with_stage(mut self, stage: RecoStage) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Adds a single detail entry.
    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
