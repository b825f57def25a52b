use koma_core::error::CoreError;
use serde::Deserialize;

/// Errors from talking to the simulation backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend declared an application error with a readable message.
    #[error("{msg}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message from the `{msg}` (or `{error}`) body, verbatim.
        msg: String,
    },

    /// A status code the caller does not handle, without a usable body.
    #[error("Unexpected response status {0}")]
    UnexpectedStatus(u16),

    /// A job submission was accepted without a `Location` header.
    #[error("Job accepted without a status location")]
    MissingLocation,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A response body did not have the expected shape.
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The status poll reported that the job failed.
    #[error("The job reported an error")]
    JobFailed,

    /// The local poll chain was torn down before a terminal response.
    #[error("Polling cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Storage error: {0}")]
    Store(#[from] std::io::Error),
}

impl ClientError {
    /// Message suitable for the error panel.
    ///
    /// Declared application errors are shown verbatim, everything else
    /// collapses to a generic failure text.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Api { msg, .. } => msg.clone(),
            ClientError::JobFailed => self.to_string(),
            ClientError::Core(CoreError::InvalidSignal(_)) => {
                "The server sent an unexpected progress value".to_string()
            }
            _ => "Request error".to_string(),
        }
    }
}

/// Error body returned by the backend on 4xx/5xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    msg: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    /// Build a [`ClientError`] from a failed response's status and body.
    pub(crate) fn into_error(status: u16, body: &str) -> ClientError {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(ErrorBody { msg: Some(msg), .. }) | Ok(ErrorBody { error: Some(msg), .. }) => {
                ClientError::Api { status, msg }
            }
            _ => ClientError::UnexpectedStatus(status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn msg_body_becomes_api_error() {
        let err = ErrorBody::into_error(500, r#"{"msg":"bad sequence"}"#);
        assert_matches!(err, ClientError::Api { status: 500, ref msg } if msg == "bad sequence");
        assert_eq!(err.user_message(), "bad sequence");
    }

    #[test]
    fn error_field_is_accepted() {
        let err = ErrorBody::into_error(404, r#"{"error":"not yours"}"#);
        assert_eq!(err.user_message(), "not yours");
    }

    #[test]
    fn unparseable_body_is_generic() {
        let err = ErrorBody::into_error(502, "<html>Bad gateway</html>");
        assert_matches!(err, ClientError::UnexpectedStatus(502));
        assert_eq!(err.user_message(), "Request error");
    }
}
