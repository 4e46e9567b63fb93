//! Turns user input or the device position into a weather query.
//!
//! Every path ends in a usable query: free text passes through, a position
//! becomes a place name or a "lat,lon" pair, and a failed position lookup
//! falls back to a fixed city.

use skycast_core::LocationError;

use crate::geocode::ReverseGeocoder;
use crate::location::{Geolocator, PositionOptions};
use crate::types::Coordinates;

/// Query used when the device position cannot be resolved.
pub const FALLBACK_LOCATION: &str = "Pune";

/// How a query was obtained
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionOrigin {
    /// Typed by the user
    Search,
    /// Device position named by reverse geocoding
    ReverseGeocoded { coordinates: Coordinates },
    /// Device position without a name
    CoordinatePair { coordinates: Coordinates },
    /// Position lookup failed
    Fallback { error: LocationError },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub query: String,
    pub origin: ResolutionOrigin,
}

impl Resolution {
    /// The geolocation failure that caused a fallback, if any
    pub fn failure(&self) -> Option<&LocationError> {
        match &self.origin {
            ResolutionOrigin::Fallback { error } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LocationResolver {
    options: PositionOptions,
    fallback: String,
}

impl Default for LocationResolver {
    fn default() -> Self {
        Self::new(PositionOptions::default(), FALLBACK_LOCATION)
    }
}

impl LocationResolver {
    pub fn new(options: PositionOptions, fallback: &str) -> Self {
        Self {
            options,
            fallback: fallback.to_string(),
        }
    }

    /// Free text is resolved provider-side, so it passes through unchanged.
    pub fn resolve_text(&self, text: &str) -> Resolution {
        Resolution {
            query: text.to_string(),
            origin: ResolutionOrigin::Search,
        }
    }

    /// Resolve the device position to a query.
    pub async fn resolve_device<L, R>(&self, geolocator: &L, geocoder: &R) -> Resolution
    where
        L: Geolocator + ?Sized,
        R: ReverseGeocoder + ?Sized,
    {
        let position = match geolocator.current_position(&self.options).await {
            Ok(position) => position,
            Err(error) => {
                tracing::info!(
                    "Geolocation failed ({}); falling back to default location: {}",
                    error,
                    self.fallback
                );
                return Resolution {
                    query: self.fallback.clone(),
                    origin: ResolutionOrigin::Fallback { error },
                };
            }
        };

        let coordinates = position.coordinates;
        match geocoder.reverse_geocode(coordinates).await {
            Some(name) => Resolution {
                query: name,
                origin: ResolutionOrigin::ReverseGeocoded { coordinates },
            },
            None => Resolution {
                query: coordinates.to_query(),
                origin: ResolutionOrigin::CoordinatePair { coordinates },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::{DisabledGeolocator, FixedGeolocator, Position};
    use async_trait::async_trait;

    struct Named(Option<&'static str>);

    #[async_trait]
    impl ReverseGeocoder for Named {
        async fn reverse_geocode(&self, _coordinates: Coordinates) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    struct Failing(LocationError);

    #[async_trait]
    impl Geolocator for Failing {
        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Position, LocationError> {
            Err(self.0.clone())
        }
    }

    fn pune() -> Coordinates {
        Coordinates::new(18.52, 73.86).unwrap()
    }

    #[test]
    fn test_text_passes_through_unchanged() {
        let resolver = LocationResolver::default();
        let resolution = resolver.resolve_text("  New York ");
        assert_eq!(resolution.query, "  New York ");
        assert_eq!(resolution.origin, ResolutionOrigin::Search);
    }

    #[tokio::test]
    async fn test_device_reverse_geocoded() {
        let resolver = LocationResolver::default();
        let resolution = resolver
            .resolve_device(&FixedGeolocator::new(pune()), &Named(Some("Pune")))
            .await;
        assert_eq!(resolution.query, "Pune");
        assert_eq!(
            resolution.origin,
            ResolutionOrigin::ReverseGeocoded { coordinates: pune() }
        );
        assert!(resolution.failure().is_none());
    }

    #[tokio::test]
    async fn test_device_without_name_uses_coordinate_pair() {
        let resolver = LocationResolver::default();
        let resolution = resolver
            .resolve_device(&FixedGeolocator::new(pune()), &Named(None))
            .await;
        assert_eq!(resolution.query, "18.52,73.86");
        assert!(matches!(
            resolution.origin,
            ResolutionOrigin::CoordinatePair { .. }
        ));
    }

    #[tokio::test]
    async fn test_permission_denied_falls_back_to_pune() {
        let resolver = LocationResolver::default();
        let resolution = resolver
            .resolve_device(&Failing(LocationError::PermissionDenied), &Named(Some("X")))
            .await;
        assert_eq!(resolution.query, "Pune");
        assert_eq!(resolution.failure(), Some(&LocationError::PermissionDenied));
    }

    #[tokio::test]
    async fn test_unsupported_falls_back_to_configured_city() {
        let resolver = LocationResolver::new(PositionOptions::default(), "Oslo");
        let resolution = resolver
            .resolve_device(&DisabledGeolocator, &Named(Some("X")))
            .await;
        assert_eq!(resolution.query, "Oslo");
        assert_eq!(resolution.failure(), Some(&LocationError::Unsupported));
    }
}
