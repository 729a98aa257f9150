use thiserror::Error;

/// Failures inside the catalog, artwork and lighting adapters.
///
/// These never cross an adapter boundary: the public adapter operations log
/// them and degrade to an empty result, `None`, or a no-op.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport failure or timeout talking to a remote API.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote API answered with a non-success status.
    #[error("unexpected status {status} from {url}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },

    /// Payload could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Artwork bytes could not be decoded as an image.
    #[error(transparent)]
    Decode(#[from] image::ImageError),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A blocking worker panicked or was cancelled.
    #[error("background worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
