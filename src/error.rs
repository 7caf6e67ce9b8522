use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrumbError {
    /// Registration-time configuration failure. The guard refuses to install.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Request failed crumb validation. Always surfaced as 403 Forbidden.
    #[error("Forbidden")]
    Forbidden,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CrumbError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            CrumbError::Forbidden => 403,
            CrumbError::Config(_) | CrumbError::Internal(_) => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }
}

pub type Result<T> = std::result::Result<T, CrumbError>;
