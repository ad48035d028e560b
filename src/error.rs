use std::fmt;

/// Which location permission was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionKind {
    Foreground,
    Background,
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionKind::Foreground => write!(f, "foreground"),
            PermissionKind::Background => write!(f, "background"),
        }
    }
}

/// Errors surfaced by the session lifecycle
///
/// Fix filtering never produces an error; rejected fixes are routine.
#[derive(Debug)]
pub enum TrackingError {
    /// Location permission refused; the attempted operation is abandoned
    PermissionDenied(PermissionKind),
    /// Operation not allowed in the session's current phase
    InvalidPhase {
        operation: &'static str,
        phase: String,
    },
    /// The session state is currently owned by the other tracking context
    NotOwner,
    /// Location provider failure
    Provider(anyhow::Error),
    /// Persistence failure
    Storage(anyhow::Error),
}

impl TrackingError {
    /// Whether the caller should abandon the flow and tell the user
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, TrackingError::PermissionDenied(_))
    }
}

impl fmt::Display for TrackingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingError::PermissionDenied(kind) => write!(
                f,
                "Location permission ({}) is required to record a walk",
                kind
            ),
            TrackingError::InvalidPhase { operation, phase } => {
                write!(f, "Cannot {} while session is {}", operation, phase)
            }
            TrackingError::NotOwner => {
                write!(f, "Walk session is owned by the other tracking context")
            }
            TrackingError::Provider(e) => write!(f, "Location provider error: {:#}", e),
            TrackingError::Storage(e) => write!(f, "Session storage error: {:#}", e),
        }
    }
}

impl std::error::Error for TrackingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TrackingError::Provider(e) | TrackingError::Storage(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}
