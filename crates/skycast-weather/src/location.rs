//! Device position acquisition.
//!
//! A terminal has no browser geolocation, so the position comes from an IP
//! lookup, from configured coordinates, or is unsupported altogether.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use skycast_core::{GeolocationConfig, GeolocationProvider, LocationError};

use crate::types::Coordinates;

/// Options for a position request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    pub timeout: Duration,
    /// Reuse a previous fix no older than this; zero always asks again
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(5000),
            maximum_age: Duration::ZERO,
        }
    }
}

impl PositionOptions {
    pub fn from_config(config: &GeolocationConfig) -> Self {
        Self {
            enable_high_accuracy: config.high_accuracy,
            timeout: Duration::from_millis(config.timeout_ms),
            maximum_age: Duration::from_millis(config.maximum_age_ms),
        }
    }
}

/// A device position fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub coordinates: Coordinates,
    pub accuracy_meters: Option<f64>,
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self, options: &PositionOptions) -> Result<Position, LocationError>;
}

#[async_trait]
impl<T: Geolocator + ?Sized> Geolocator for Box<T> {
    async fn current_position(&self, options: &PositionOptions) -> Result<Position, LocationError> {
        (**self).current_position(options).await
    }
}

/// Build the geolocator selected in configuration.
pub fn from_config(config: &GeolocationConfig) -> Box<dyn Geolocator> {
    match config.provider {
        GeolocationProvider::Ip => match IpGeolocator::new(&config.ip_lookup_url) {
            Ok(geolocator) => Box::new(geolocator),
            Err(e) => {
                tracing::warn!("IP geolocation unavailable: {}", e);
                Box::new(DisabledGeolocator)
            }
        },
        GeolocationProvider::Fixed => match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => match Coordinates::new(lat, lon) {
                Ok(coordinates) => Box::new(FixedGeolocator::new(coordinates)),
                Err(e) => {
                    tracing::warn!("Ignoring configured position: {}", e);
                    Box::new(DisabledGeolocator)
                }
            },
            _ => Box::new(DisabledGeolocator),
        },
        GeolocationProvider::Disabled => Box::new(DisabledGeolocator),
    }
}

/// Approximate position from an IP lookup service (ip-api.com compatible).
pub struct IpGeolocator {
    client: Client,
    url: String,
    last_fix: Mutex<Option<(Instant, Position)>>,
}

#[derive(Debug, Deserialize)]
struct IpLookupResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
}

impl IpGeolocator {
    pub fn new(url: &str) -> Result<Self, LocationError> {
        let client = Client::builder()
            .user_agent(concat!("SkyCast/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LocationError::Unknown(e.to_string()))?;

        Ok(Self {
            client,
            url: url.to_string(),
            last_fix: Mutex::new(None),
        })
    }

    fn cached(&self, maximum_age: Duration) -> Option<Position> {
        if maximum_age.is_zero() {
            return None;
        }
        let last_fix = self.last_fix.lock();
        match *last_fix {
            Some((at, position)) if at.elapsed() <= maximum_age => Some(position),
            _ => None,
        }
    }

    async fn lookup(&self) -> Result<Position, LocationError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            let e = e.without_url();
            tracing::debug!("IP lookup request failed: {}", e);
            if e.is_timeout() {
                LocationError::Timeout
            } else {
                LocationError::PositionUnavailable
            }
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(LocationError::PermissionDenied);
        }
        if !status.is_success() {
            tracing::debug!("IP lookup returned status {}", status);
            return Err(LocationError::PositionUnavailable);
        }

        let body: IpLookupResponse = response
            .json()
            .await
            .map_err(|e| {
                LocationError::Unknown(format!("IP lookup parse error: {}", e.without_url()))
            })?;

        if body.status.as_deref() == Some("fail") {
            tracing::debug!(
                "IP lookup failed: {}",
                body.message.as_deref().unwrap_or("no message")
            );
            return Err(LocationError::PositionUnavailable);
        }

        let (Some(lat), Some(lon)) = (body.lat, body.lon) else {
            return Err(LocationError::PositionUnavailable);
        };
        let coordinates =
            Coordinates::new(lat, lon).map_err(|_| LocationError::PositionUnavailable)?;

        tracing::info!(
            "IP position {} ({})",
            coordinates,
            body.city.as_deref().unwrap_or("unknown city")
        );
        Ok(Position {
            coordinates,
            accuracy_meters: None,
        })
    }
}

#[async_trait]
impl Geolocator for IpGeolocator {
    async fn current_position(&self, options: &PositionOptions) -> Result<Position, LocationError> {
        if let Some(position) = self.cached(options.maximum_age) {
            tracing::debug!("Reusing position fix younger than {:?}", options.maximum_age);
            return Ok(position);
        }
        if options.enable_high_accuracy {
            tracing::debug!("IP lookup cannot honour high accuracy; position is approximate");
        }

        let position = match tokio::time::timeout(options.timeout, self.lookup()).await {
            Ok(result) => result?,
            Err(_) => return Err(LocationError::Timeout),
        };

        *self.last_fix.lock() = Some((Instant::now(), position));
        Ok(position)
    }
}

/// Always reports the configured coordinates.
pub struct FixedGeolocator {
    position: Position,
}

impl FixedGeolocator {
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            position: Position {
                coordinates,
                accuracy_meters: Some(0.0),
            },
        }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Position, LocationError> {
        Ok(self.position)
    }
}

/// Geolocation not available on this system.
pub struct DisabledGeolocator;

#[async_trait]
impl Geolocator for DisabledGeolocator {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Position, LocationError> {
        Err(LocationError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(timeout_ms: u64, maximum_age_ms: u64) -> PositionOptions {
        PositionOptions {
            enable_high_accuracy: true,
            timeout: Duration::from_millis(timeout_ms),
            maximum_age: Duration::from_millis(maximum_age_ms),
        }
    }

    #[tokio::test]
    async fn test_ip_lookup_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success", "lat": 18.52, "lon": 73.86, "city": "Pune"
            })))
            .mount(&mock_server)
            .await;

        let geolocator = IpGeolocator::new(&mock_server.uri()).unwrap();
        let position = geolocator.current_position(&options(2000, 0)).await.unwrap();
        assert_eq!(position.coordinates, Coordinates::new(18.52, 73.86).unwrap());
    }

    #[tokio::test]
    async fn test_ip_lookup_fail_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail", "message": "private range"
            })))
            .mount(&mock_server)
            .await;

        let geolocator = IpGeolocator::new(&mock_server.uri()).unwrap();
        let err = geolocator.current_position(&options(2000, 0)).await.unwrap_err();
        assert_eq!(err, LocationError::PositionUnavailable);
    }

    #[tokio::test]
    async fn test_ip_lookup_forbidden_is_permission_denied() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let geolocator = IpGeolocator::new(&mock_server.uri()).unwrap();
        let err = geolocator.current_position(&options(2000, 0)).await.unwrap_err();
        assert_eq!(err, LocationError::PermissionDenied);
    }

    #[tokio::test]
    async fn test_ip_lookup_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "success", "lat": 1.0, "lon": 1.0 }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let geolocator = IpGeolocator::new(&mock_server.uri()).unwrap();
        let err = geolocator.current_position(&options(50, 0)).await.unwrap_err();
        assert_eq!(err, LocationError::Timeout);
    }

    #[tokio::test]
    async fn test_maximum_age_reuses_fix() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success", "lat": 10.0, "lon": 20.0
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let geolocator = IpGeolocator::new(&mock_server.uri()).unwrap();
        let first = geolocator.current_position(&options(2000, 60_000)).await.unwrap();
        let second = geolocator.current_position(&options(2000, 60_000)).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_fixed_and_disabled() {
        let coords = Coordinates::new(47.6, -122.3).unwrap();
        let fixed = FixedGeolocator::new(coords);
        assert_eq!(
            fixed.current_position(&PositionOptions::default()).await.unwrap().coordinates,
            coords
        );

        let err = DisabledGeolocator
            .current_position(&PositionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::Unsupported);
    }

    #[tokio::test]
    async fn test_from_config_fixed_without_coordinates_is_disabled() {
        let config = GeolocationConfig {
            provider: GeolocationProvider::Fixed,
            ..GeolocationConfig::default()
        };
        let geolocator = from_config(&config);
        let err = geolocator
            .current_position(&PositionOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, LocationError::Unsupported);
    }

    #[test]
    fn test_options_from_config() {
        let config = GeolocationConfig::default();
        let options = PositionOptions::from_config(&config);
        assert_eq!(options, PositionOptions::default());
    }
}
