use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    /// The requested provider key is not known to the registry.
    UnsupportedProvider(String),
    /// A configuration error occurred (missing secret, bad endpoint, ...).
    Config(String),
    /// The request failed validation before any work was done.
    InvalidRequest(String),
    /// An error occurred in the LLM provider.
    LlmProvider { provider: String, details: String },
    /// A network error outside of LLM calls.
    Network(String),
    /// An error occurred while rendering a template.
    TemplateRendering(String),
    /// A generic system or unknown error.
    System(String),
}

impl Error {
    pub fn llm(provider: impl Into<String>, details: impl Into<String>) -> Self {
        Error::LlmProvider {
            provider: provider.into(),
            details: details.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedProvider(key) => write!(f, "Unsupported LLM provider: {key}"),
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            Error::LlmProvider { provider, details } => {
                write!(f, "LLM error ({provider}): {details}")
            }
            Error::Network(msg) => write!(f, "Network error: {msg}"),
            Error::TemplateRendering(msg) => write!(f, "Template error: {msg}"),
            Error::System(msg) => write!(f, "System error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
