//! Centralized error types for SkyCast.
//!
//! This module provides a typed error hierarchy that:
//! - Separates "location not found" from every other provider failure
//! - Provides user-friendly messages suitable for the dashboard banner
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a message fit for display.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Location error: {0}")]
    Location(#[from] LocationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Network(e) => e.user_message().to_string(),
            AppError::Config(e) => e.user_message().to_string(),
            AppError::Weather(e) => e.user_message().to_string(),
            AppError::Location(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.".to_string(),
            AppError::Other(_) => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => "A required setting is missing. Check your settings.",
        }
    }
}

/// Weather provider errors.
///
/// The provider answers 404 when a query matches no location; every other
/// failure (status, transport, decoding) is `Unavailable`.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Location not found: {0}")]
    NotFound(String),

    #[error("Weather service unavailable: {0}")]
    Unavailable(#[from] NetworkError),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::NotFound(_) => {
                "Location not found. Please check the city name and try again."
            }
            WeatherError::Unavailable(_) => {
                "Unable to fetch weather data. Please try again later."
            }
        }
    }
}

/// Geolocation errors. Codes 1-3 follow the W3C `GeolocationPositionError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("Geolocation is not supported")]
    Unsupported,

    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location information unavailable")]
    PositionUnavailable,

    #[error("Location request timed out")]
    Timeout,

    #[error("Location error: {0}")]
    Unknown(String),
}

impl LocationError {
    /// Map a standard geolocation error code.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => LocationError::PermissionDenied,
            2 => LocationError::PositionUnavailable,
            3 => LocationError::Timeout,
            other => LocationError::Unknown(format!("code {}", other)),
        }
    }

    pub fn user_message(&self) -> String {
        let detail = match self {
            LocationError::Unsupported => {
                return "Geolocation is not available on this system. Please search for a city."
                    .to_string();
            }
            LocationError::PermissionDenied => {
                "Location permission was denied. Please enable location services or search for a city."
            }
            LocationError::PositionUnavailable => {
                "Location information is unavailable. Please try searching for a city instead."
            }
            LocationError::Timeout => {
                "Location request timed out. Please try again or search for a city."
            }
            LocationError::Unknown(_) => "Please try searching for a city instead.",
        };
        format!("Unable to get current location. {}", detail)
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    /// Classify a transport error. The request URL is stripped first, since
    /// it carries the API key as a query parameter.
    fn into_network_error(self) -> NetworkError {
        let err = self.without_url();
        if err.is_timeout() {
            NetworkError::Timeout
        } else if err.is_connect() {
            NetworkError::ConnectionFailed(err.to_string())
        } else if err.is_decode() {
            NetworkError::InvalidResponse(err.to_string())
        } else if let Some(status) = err.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(err.to_string())
        }
    }
}
