use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The action needs a signed-in user.
    #[error("login required")]
    LoginRequired,

    #[error("{0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    /// Any other non-2xx answer from the service.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gateway: {0}")]
    Gateway(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Map a non-2xx status and the service's error message to a variant.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => Self::LoginRequired,
            403 => Self::Forbidden(message),
            404 => Self::NotFound,
            409 => Self::Conflict(message),
            400 | 422 => Self::Validation(message),
            _ => Self::Server { status, message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_variants() {
        assert!(matches!(ClientError::from_status(401, String::new()), ClientError::LoginRequired));
        assert!(matches!(
            ClientError::from_status(422, "cannot message yourself".into()),
            ClientError::Validation(m) if m == "cannot message yourself"
        ));
        assert!(matches!(
            ClientError::from_status(503, "down".into()),
            ClientError::Server { status: 503, .. }
        ));
    }
}
