// Fatal error taxonomy - the failures that end a run.
//
// Per-post failures never reach this type: the orchestrator counts them and
// moves on. Everything here maps to a distinct process exit status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalError {
    /// Missing credentials or an unusable config file. Raised before any
    /// network activity.
    #[error("configuration error: {0}")]
    Config(String),

    /// One of the services rejected our credentials.
    #[error("{service} authentication failed: {source:#}")]
    Auth {
        service: &'static str,
        #[source]
        source: anyhow::Error,
    },

    /// Operator hit Ctrl-C. Posts committed before the interrupt stay valid.
    #[error("transfer interrupted by user")]
    Interrupted,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FatalError {
    /// Process exit status for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            FatalError::Other(_) => 1,
            FatalError::Config(_) => 2,
            FatalError::Auth { .. } => 3,
            FatalError::Interrupted => 130,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            FatalError::Other(anyhow::anyhow!("boom")).exit_code(),
            FatalError::Config("missing".into()).exit_code(),
            FatalError::Auth {
                service: "Bluesky",
                source: anyhow::anyhow!("bad password"),
            }
            .exit_code(),
            FatalError::Interrupted.exit_code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
            assert_ne!(*a, 0);
        }
    }

    #[test]
    fn auth_error_message_keeps_service_reply() {
        let err = FatalError::Auth {
            service: "Mastodon",
            source: anyhow::anyhow!("401 Unauthorized: invalid token"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Mastodon"));
        assert!(msg.contains("invalid token"));
    }
}
