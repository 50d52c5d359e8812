//! Geocoding error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("Geocoder request failed: {0}")]
    Transport(String),

    #[error("Geocoder returned status {0}")]
    HttpStatus(u16),

    #[error("Malformed geocoder response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GeocodeError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            GeocodeError::HttpStatus(status.as_u16())
        } else {
            GeocodeError::Transport(err.to_string())
        }
    }
}
