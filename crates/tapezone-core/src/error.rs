//! Error taxonomy for zone and memory operations.

use tape_state::StoreError;

/// Errors produced by versioned zones and the memory zone.
#[derive(Debug, thiserror::Error)]
pub enum ZoneError {
    /// The tape could not be read or written. Never retried automatically.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    /// A seal anchor without a usable matching open anchor.
    ///
    /// Reads recover from this locally; it is only surfaced through logs.
    #[error("corrupt zone {zone} at version {version}: {reason}")]
    CorruptZone {
        zone: String,
        version: u64,
        reason: String,
    },

    /// The zone is at the largest representable version; nothing was written.
    #[error("zone {zone} cannot advance past version {version}")]
    VersionExhausted { zone: String, version: u64 },

    /// Caller input rejected before anything was appended.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type for zone operations.
pub type Result<T> = std::result::Result<T, ZoneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: ZoneError = StoreError::Unavailable(io).into();
        assert!(matches!(err, ZoneError::StoreUnavailable(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn corrupt_zone_display() {
        let err = ZoneError::CorruptZone {
            zone: "memory".into(),
            version: 5,
            reason: "no matching open anchor".into(),
        };
        assert_eq!(
            err.to_string(),
            "corrupt zone memory at version 5: no matching open anchor"
        );
    }
}
