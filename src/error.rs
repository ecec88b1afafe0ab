//! Error types for contact-law configuration and restart handling.
//!
//! Numerical degeneracies (near-zero Stokes numbers, zero relative mass) have
//! no variant here; they propagate as `inf`/`NaN` into the force output.

use thiserror::Error;

/// Errors raised while configuring or restoring a granular pair style.
#[derive(Debug, Error)]
pub enum GranularError {
    /// A settings keyword that no contact law registered.
    #[error("unknown setting keyword: {0}")]
    UnknownSetting(String),

    /// A settings keyword was given a value it cannot take.
    #[error("invalid value '{value}' for setting '{keyword}' (expected on/off)")]
    InvalidSettingValue {
        /// The keyword being set.
        keyword: String,
        /// The rejected value token.
        value: String,
    },

    /// A settings keyword appeared last without its value.
    #[error("missing value for setting '{0}'")]
    MissingSettingValue(String),

    /// A property was connected before being registered.
    #[error("unknown property: {0}")]
    UnknownProperty(String),

    /// A property was connected as the wrong kind.
    #[error("property '{name}' is not a {expected} property")]
    PropertyKind {
        /// Property name.
        name: String,
        /// The kind the caller asked for.
        expected: &'static str,
    },

    /// A global material property required by a factory is absent.
    #[error("global material property '{0}' is not defined")]
    MissingMaterial(String),

    /// A per-type or per-type-pair table has the wrong number of entries.
    #[error("global material property '{name}' has {found} entries, expected {expected}")]
    MaterialShape {
        /// Property name.
        name: String,
        /// Expected entry count.
        expected: usize,
        /// Entry count found.
        found: usize,
    },

    /// A 1-based type index outside the configured range.
    #[error("type index {index} out of range 1..={ntypes}")]
    TypeOutOfRange {
        /// Offending index.
        index: usize,
        /// Number of configured types.
        ntypes: usize,
    },

    /// A coefficient that would make a contact law ill-defined.
    #[error("invalid coefficient {name}[{itype}][{jtype}] = {value}: {reason}")]
    InvalidCoefficient {
        /// Coefficient table name.
        name: String,
        /// First type index (1-based).
        itype: usize,
        /// Second type index (1-based).
        jtype: usize,
        /// Offending value.
        value: f64,
        /// What the value violates.
        reason: &'static str,
    },

    /// Restart data was written by a different contact-law configuration.
    #[error("wrong pair style loaded! (expected hashcode {expected}, found {found})")]
    WrongPairStyle {
        /// Hashcode of the running configuration.
        expected: i64,
        /// Hashcode read from the restart stream.
        found: i64,
    },

    /// Restored history layout does not match the running configuration.
    #[error("history layout mismatch: {reason}")]
    LayoutMismatch {
        /// Description of the difference.
        reason: String,
    },

    /// Neighbor list history stride differs from the model's.
    #[error("neighbor list stores {found} history values per contact, model needs {expected}")]
    StrideMismatch {
        /// Stride required by the model.
        expected: usize,
        /// Stride of the neighbor list.
        found: usize,
    },

    /// Snapshot encoding or decoding failed.
    #[error("snapshot serialization failed: {0}")]
    Snapshot(String),

    /// Underlying I/O failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GranularError {
    /// Create a history layout mismatch error.
    #[must_use]
    pub fn layout_mismatch(reason: impl Into<String>) -> Self {
        Self::LayoutMismatch {
            reason: reason.into(),
        }
    }

    /// Whether this error comes from user configuration (settings, properties, coefficients).
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownSetting(_)
                | Self::InvalidSettingValue { .. }
                | Self::MissingSettingValue(_)
                | Self::UnknownProperty(_)
                | Self::PropertyKind { .. }
                | Self::MissingMaterial(_)
                | Self::MaterialShape { .. }
                | Self::TypeOutOfRange { .. }
                | Self::InvalidCoefficient { .. }
        )
    }

    /// Whether this error was raised while reading restart data.
    #[must_use]
    pub fn is_restart_error(&self) -> bool {
        matches!(
            self,
            Self::WrongPairStyle { .. }
                | Self::LayoutMismatch { .. }
                | Self::StrideMismatch { .. }
                | Self::Snapshot(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GranularError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_pair_style_message() {
        let err = GranularError::WrongPairStyle {
            expected: 2,
            found: 7,
        };
        assert!(err.to_string().contains("wrong pair style loaded"));
        assert!(err.is_restart_error());
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_coefficient_error_is_config() {
        let err = GranularError::InvalidCoefficient {
            name: "kn2kcMax".to_string(),
            itype: 1,
            jtype: 2,
            value: 0.5,
            reason: "must exceed 1",
        };
        assert!(err.is_config_error());
        assert!(err.to_string().contains("kn2kcMax[1][2]"));
    }
}
