//! Reverse geocoding: convert coordinates to a human-readable place name.
//! Uses the OpenWeather geocoding API with the same key as the weather calls.

use async_trait::async_trait;
use serde::Deserialize;

use crate::provider::OpenWeatherProvider;
use crate::types::Coordinates;

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Returns `None` on any failure; the caller falls back to coordinates.
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct GeoEntry {
    name: Option<String>,
}

#[async_trait]
impl ReverseGeocoder for OpenWeatherProvider {
    async fn reverse_geocode(&self, coordinates: Coordinates) -> Option<String> {
        let url = format!("{}/reverse", self.geo_base_url);

        let response = match self
            .client
            .get(&url)
            .query(&[
                ("lat", coordinates.latitude().to_string()),
                ("lon", coordinates.longitude().to_string()),
                ("limit", "1".to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!("Reverse geocode request failed: {}", e.without_url());
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Reverse geocode returned status {}", response.status());
            return None;
        }

        let entries: Vec<GeoEntry> = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!("Reverse geocode parse error: {}", e.without_url());
                return None;
            }
        };

        let name = entries
            .into_iter()
            .next()?
            .name
            .filter(|n| !n.trim().is_empty())?;

        tracing::info!("Reverse geocoded {} to: {}", coordinates, name);
        Some(name)
    }
}
