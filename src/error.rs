use thiserror::Error;

pub type Result<T> = std::result::Result<T, RegtestError>;

#[derive(Error, Debug)]
pub enum RegtestError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Service responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Transaction not found: {0}")]
    NotFound(String),
    #[error("Transaction rejected: {0}")]
    Rejected(String),
    #[error("Verification of {tx_id}:{vout} failed: {reason}")]
    Assertion {
        tx_id: String,
        vout: u32,
        reason: String,
    },
    #[error("Missing inputs after {attempts} faucet attempts")]
    MissingInputs { attempts: u32 },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Hex(#[from] bitcoin::hex::HexToArrayError),
    #[error(transparent)]
    Decode(#[from] bitcoin::consensus::encode::FromHexError),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
}

impl RegtestError {
    /// Status code of a non-success HTTP response, if this error carries one.
    pub fn status(&self) -> Option<u16> {
        match self {
            RegtestError::Status { status, .. } => Some(*status),
            RegtestError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_exposed_for_http_errors() {
        let err = RegtestError::Status {
            status: 404,
            body: "Not Found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(
            err.to_string(),
            "Service responded with status 404: Not Found"
        );
    }

    #[test]
    fn test_status_is_absent_for_assertions() {
        let err = RegtestError::Assertion {
            tx_id: "ab".to_string(),
            vout: 1,
            reason: "value 5 != 6".to_string(),
        };
        assert_eq!(err.status(), None);
        assert_eq!(err.to_string(), "Verification of ab:1 failed: value 5 != 6");
    }
}
