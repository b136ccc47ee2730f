//! Error types for the Vimeo provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Vimeo provider errors
#[derive(Error, Debug)]
pub enum VimeoError {
    /// API request returned a non-success status
    #[error("Vimeo API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Video {video_id} does not expose any caption/subtitle tracks")]
    NoTextTracks { video_id: String },

    #[error("Unable to determine a download URL for text track {track_id}")]
    MissingTrackLink { track_id: String },

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, VimeoError>;

impl From<VimeoError> for BridgeError {
    fn from(error: VimeoError) -> Self {
        match error {
            VimeoError::ApiError {
                status_code: 404,
                message,
            } => BridgeError::NotFound(message),
            VimeoError::ApiError {
                status_code,
                message,
            } => BridgeError::Http {
                status: status_code,
                message,
            },
            VimeoError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            err @ VimeoError::NoTextTracks { .. } => BridgeError::NotFound(err.to_string()),
            err @ VimeoError::MissingTrackLink { .. } => {
                BridgeError::OperationFailed(err.to_string())
            }
            VimeoError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = VimeoError::ApiError {
            status_code: 401,
            message: "Unauthorized".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Vimeo API error (status 401): Unauthorized"
        );
    }

    #[test]
    fn test_not_found_conversion() {
        let bridge_error: BridgeError = VimeoError::ApiError {
            status_code: 404,
            message: "gone".to_string(),
        }
        .into();
        assert!(bridge_error.is_not_found());

        let bridge_error: BridgeError = VimeoError::NoTextTracks {
            video_id: "1".to_string(),
        }
        .into();
        assert!(bridge_error.is_not_found());
    }

    #[test]
    fn test_status_is_kept() {
        let bridge_error: BridgeError = VimeoError::ApiError {
            status_code: 503,
            message: "down".to_string(),
        }
        .into();
        assert!(matches!(bridge_error, BridgeError::Http { status: 503, .. }));
    }
}
