use reqwest::StatusCode;
use thiserror::Error;

/// Fatal errors: any of these aborts the whole run.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Cannot reach registry {url}: {reason}")]
    Connectivity { url: String, reason: String },
}

/// Failure of a single registry call.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned status {status}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("missing Docker-Content-Digest header for {0}")]
    MissingDigest(String),

    #[error("authentication failed: {0}")]
    Auth(String),
}

/// A repository's catalog could not be built completely.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("could not list tags of {repository}: {source}")]
    Tags {
        repository: String,
        #[source]
        source: RegistryError,
    },

    #[error("could not resolve {repository}:{tag}: {source}")]
    Tag {
        repository: String,
        tag: String,
        #[source]
        source: RegistryError,
    },

    #[error("manifest of {repository}:{tag} has no config descriptor")]
    MissingConfig { repository: String, tag: String },

    #[error("config blob of {repository}:{tag} carries no creation time")]
    MissingCreated { repository: String, tag: String },
}
