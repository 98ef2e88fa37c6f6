use thiserror::Error;

#[derive(Debug, Error)]
pub enum UnisetupError {
    #[error("version '{input}' does not conform to version format 0.0.0x0: {reason}")]
    Format { input: String, reason: String },
    #[error("could not find a version that matches '{spec}'")]
    NoMatch { spec: String },
    #[error("could not load URL '{url}': {reason}")]
    Fetch { url: String, reason: String },
    #[error("failed to download '{file}' after {attempts} attempt(s): {reason}")]
    Download {
        file: String,
        attempts: u32,
        reason: String,
    },
    #[error("downloaded file '{file}' is corrupt, md5 {actual} does not match expected {expected}")]
    Integrity {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("installing only components but no installation of version {version} was found")]
    MissingInstallation { version: String },
    #[error("{message}")]
    Conflict { message: String },
    #[error("installation of package '{package}' failed: {output}")]
    Install { package: String, output: String },
}

impl UnisetupError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Format { .. } => 2,
            Self::NoMatch { .. } => 3,
            Self::Fetch { .. } => 4,
            Self::Download { .. } => 5,
            Self::Integrity { .. } => 6,
            Self::MissingInstallation { .. } => 7,
            Self::Conflict { .. } => 8,
            Self::Install { .. } => 9,
        }
    }

    pub fn fetch(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }
}

/// Finds the taxonomy variant anywhere in an error's context chain.
pub fn classify(err: &anyhow::Error) -> Option<&UnisetupError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<UnisetupError>())
}
