//! OpenWeather client: current conditions, forecast and air quality.
//!
//! Every call is a single GET. No retries and no caching: each invocation
//! re-fetches.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use skycast_core::{NetworkError, ReqwestErrorExt, WeatherConfig, WeatherError};
use tracing::instrument;

use crate::types::{
    AirQualitySample, AqiLevel, Coordinates, ForecastSample, ForecastSeries, Pollutant, Unit,
    WeatherSnapshot,
};

const USER_AGENT: &str = concat!("SkyCast/", env!("CARGO_PKG_VERSION"));

/// The three weather lookups the dashboard depends on.
#[async_trait]
pub trait WeatherGateway: Send + Sync {
    /// Current conditions for a free-text location query.
    async fn fetch_current(&self, query: &str, unit: Unit) -> Result<WeatherSnapshot, WeatherError>;

    /// 3-hourly forecast for a free-text location query.
    async fn fetch_forecast(&self, query: &str, unit: Unit) -> Result<ForecastSeries, WeatherError>;

    /// Air quality at resolved coordinates.
    async fn fetch_air_quality(
        &self,
        coordinates: Coordinates,
    ) -> Result<AirQualitySample, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    pub(crate) client: Arc<Client>,
    pub(crate) api_key: String,
    api_base_url: String,
    pub(crate) geo_base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(
        api_key: &str,
        api_base_url: &str,
        geo_base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, WeatherError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| e.into_network_error())?;

        Ok(Self {
            client: Arc::new(client),
            api_key: api_key.to_string(),
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            geo_base_url: geo_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, WeatherError> {
        Self::new(
            &config.api_key,
            &config.api_base_url,
            &config.geo_base_url,
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }

    #[instrument(skip(self), level = "info")]
    pub async fn current(&self, query: &str, unit: Unit) -> Result<WeatherSnapshot, WeatherError> {
        let url = format!("{}/weather", self.api_base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("units", unit.as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        let raw: RawCurrent = handle_response(response, Some(query)).await?;
        let snapshot = raw.into_snapshot()?;

        tracing::info!(
            "Current weather for {}: {:.1}{}",
            snapshot.display_name(),
            snapshot.temperature,
            unit.temperature_symbol()
        );
        Ok(snapshot)
    }

    #[instrument(skip(self), level = "info")]
    pub async fn forecast(&self, query: &str, unit: Unit) -> Result<ForecastSeries, WeatherError> {
        let url = format!("{}/forecast", self.api_base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("units", unit.as_str()),
                ("appid", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        let raw: RawForecast = handle_response(response, Some(query)).await?;
        let series = raw.into_series()?;

        tracing::info!("Forecast for {}: {} samples", series.city_name, series.samples.len());
        Ok(series)
    }

    #[instrument(skip(self), level = "info")]
    pub async fn air_quality(
        &self,
        coordinates: Coordinates,
    ) -> Result<AirQualitySample, WeatherError> {
        let url = format!("{}/air_pollution", self.api_base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", coordinates.latitude().to_string()),
                ("lon", coordinates.longitude().to_string()),
                ("appid", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        // Coordinates come from a current-weather response; a 404 is a provider fault.
        let raw: RawAirPollution = handle_response(response, None).await?;
        let sample = raw.into_sample()?;

        tracing::info!("Air quality at {}: AQI {}", coordinates, sample.aqi.index());
        Ok(sample)
    }
}

#[async_trait]
impl WeatherGateway for OpenWeatherProvider {
    async fn fetch_current(&self, query: &str, unit: Unit) -> Result<WeatherSnapshot, WeatherError> {
        self.current(query, unit).await
    }

    async fn fetch_forecast(&self, query: &str, unit: Unit) -> Result<ForecastSeries, WeatherError> {
        self.forecast(query, unit).await
    }

    async fn fetch_air_quality(
        &self,
        coordinates: Coordinates,
    ) -> Result<AirQualitySample, WeatherError> {
        self.air_quality(coordinates).await
    }
}

/// Map the provider response to a decoded body or a typed failure.
/// Decode a provider response. A 404 means an unknown location only for
/// requests made with a user `query`; otherwise it is a server error.
async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
    query: Option<&str>,
) -> Result<T, WeatherError> {
    let status = response.status();

    if status.is_success() {
        response
            .json()
            .await
            .map_err(|e| {
                NetworkError::InvalidResponse(format!("JSON parse error: {}", e.without_url()))
                    .into()
            })
    } else if let (StatusCode::NOT_FOUND, Some(query)) = (status, query) {
        tracing::debug!("Provider found no location for {:?}", query);
        Err(WeatherError::NotFound(query.to_string()))
    } else {
        let text = response.text().await.unwrap_or_default();
        tracing::warn!("Weather provider returned {}: {}", status, text);
        Err(NetworkError::ServerError {
            status: status.as_u16(),
            message: text,
        }
        .into())
    }
}

fn invalid(message: impl Into<String>) -> WeatherError {
    NetworkError::InvalidResponse(message.into()).into()
}

fn timestamp(secs: i64, field: &str) -> Result<DateTime<Utc>, WeatherError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| invalid(format!("bad {} timestamp {}", field, secs)))
}

fn coordinates(raw: &RawCoord) -> Result<Coordinates, WeatherError> {
    Coordinates::new(raw.lat, raw.lon).map_err(|e| invalid(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct RawCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct RawCondition {
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct RawMain {
    temp: f64,
    #[serde(default)]
    feels_like: Option<f64>,
    #[serde(default)]
    temp_min: Option<f64>,
    #[serde(default)]
    temp_max: Option<f64>,
    #[serde(default)]
    pressure: u32,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct RawWind {
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSys {
    #[serde(default)]
    country: Option<String>,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct RawCurrent {
    coord: RawCoord,
    weather: Vec<RawCondition>,
    main: RawMain,
    #[serde(default)]
    visibility: Option<u32>,
    wind: RawWind,
    dt: i64,
    sys: RawSys,
    #[serde(default)]
    timezone: i32,
    #[serde(default)]
    name: String,
}

impl RawCurrent {
    fn into_snapshot(self) -> Result<WeatherSnapshot, WeatherError> {
        let coordinates = coordinates(&self.coord)?;
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| invalid("No weather information available"))?;

        Ok(WeatherSnapshot {
            location_name: self.name,
            country: self.sys.country,
            coordinates,
            temperature: self.main.temp,
            feels_like: self.main.feels_like.unwrap_or(self.main.temp),
            temp_min: self.main.temp_min.unwrap_or(self.main.temp),
            temp_max: self.main.temp_max.unwrap_or(self.main.temp),
            humidity: self.main.humidity,
            pressure: self.main.pressure,
            visibility: self.visibility,
            wind_speed: self.wind.speed,
            wind_direction: self.wind.deg,
            description: condition.description,
            icon: condition.icon,
            observed_at: timestamp(self.dt, "observation")?,
            sunrise: timestamp(self.sys.sunrise, "sunrise")?,
            sunset: timestamp(self.sys.sunset, "sunset")?,
            timezone_offset: self.timezone,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawForecastEntry {
    dt: i64,
    main: RawMain,
    weather: Vec<RawCondition>,
    wind: RawWind,
    #[serde(default)]
    pop: f64,
}

#[derive(Debug, Deserialize)]
struct RawCity {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawForecast {
    list: Vec<RawForecastEntry>,
    city: RawCity,
}

impl RawForecast {
    fn into_series(self) -> Result<ForecastSeries, WeatherError> {
        let samples = self
            .list
            .into_iter()
            .map(|entry| {
                let condition = entry.weather.into_iter().next();
                Ok(ForecastSample {
                    time: timestamp(entry.dt, "forecast")?,
                    temperature: entry.main.temp,
                    humidity: entry.main.humidity,
                    wind_speed: entry.wind.speed,
                    description: condition
                        .as_ref()
                        .map(|c| c.description.clone())
                        .unwrap_or_default(),
                    icon: condition.map(|c| c.icon).unwrap_or_default(),
                    precipitation_chance: entry.pop,
                })
            })
            .collect::<Result<Vec<_>, WeatherError>>()?;

        Ok(ForecastSeries {
            city_name: self.city.name,
            samples,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawAqi {
    aqi: u8,
}

#[derive(Debug, Deserialize)]
struct RawAirEntry {
    main: RawAqi,
    #[serde(default)]
    components: BTreeMap<String, f64>,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct RawAirPollution {
    list: Vec<RawAirEntry>,
}

impl RawAirPollution {
    fn into_sample(self) -> Result<AirQualitySample, WeatherError> {
        let entry = self
            .list
            .into_iter()
            .next()
            .ok_or_else(|| invalid("Air pollution response has no entries"))?;

        let aqi = AqiLevel::from_index(entry.main.aqi)
            .ok_or_else(|| invalid(format!("AQI {} outside 1-5", entry.main.aqi)))?;

        let mut components = BTreeMap::new();
        for (code, value) in entry.components {
            match Pollutant::from_code(&code) {
                Some(pollutant) => {
                    components.insert(pollutant, value);
                }
                None => tracing::debug!("Ignoring unknown pollutant {:?}", code),
            }
        }

        Ok(AirQualitySample {
            aqi,
            measured_at: timestamp(entry.dt, "air quality")?,
            components,
        })
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Provider payloads for the client tests.

    pub fn current_json(name: &str, lat: f64, lon: f64, temp: f64) -> serde_json::Value {
        serde_json::json!({
            "coord": { "lon": lon, "lat": lat },
            "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }],
            "main": {
                "temp": temp,
                "feels_like": temp - 0.6,
                "temp_min": temp - 1.0,
                "temp_max": temp + 1.0,
                "pressure": 1012,
                "humidity": 40
            },
            "visibility": 10000,
            "wind": { "speed": 3.2, "deg": 270 },
            "dt": 1_700_000_000,
            "sys": { "country": "IN", "sunrise": 1_699_923_000, "sunset": 1_699_964_000 },
            "timezone": 19800,
            "name": name,
            "cod": 200
        })
    }

    pub fn forecast_json(name: &str, samples: usize) -> serde_json::Value {
        let list: Vec<serde_json::Value> = (0..samples)
            .map(|i| {
                serde_json::json!({
                    "dt": 1_700_000_000 + (i as i64) * 10_800,
                    "main": { "temp": 20.0 + i as f64, "humidity": 50 },
                    "weather": [{ "description": "light rain", "icon": "10d" }],
                    "wind": { "speed": 4.1 },
                    "pop": 0.3
                })
            })
            .collect();
        serde_json::json!({ "cod": "200", "list": list, "city": { "name": name } })
    }

    pub fn air_json(aqi: u8) -> serde_json::Value {
        serde_json::json!({
            "coord": { "lon": 73.86, "lat": 18.52 },
            "list": [{
                "main": { "aqi": aqi },
                "components": {
                    "co": 201.94, "no": 0.02, "no2": 0.77, "o3": 68.66,
                    "so2": 0.64, "pm2_5": 12.5, "pm10": 20.1, "nh3": 0.12
                },
                "dt": 1_700_000_000
            }]
        })
    }
}
