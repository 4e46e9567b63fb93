use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

pub use skycast_core::Unit;

/// Coordinates outside the valid latitude/longitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Invalid coordinates: latitude {latitude}, longitude {longitude}")]
pub struct InvalidCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A validated latitude/longitude pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinates> {
        if (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude) {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(InvalidCoordinates {
                latitude,
                longitude,
            })
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// "lat,lon" form accepted as a weather query
    pub fn to_query(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// A resolved location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinates: Coordinates,
    pub display_name: Option<String>,
}

/// Current weather conditions for one location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub country: Option<String>,
    pub coordinates: Coordinates,
    pub temperature: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub humidity: u8,
    /// hPa
    pub pressure: u32,
    /// Metres; the provider omits it for some stations
    pub visibility: Option<u32>,
    pub wind_speed: f64,
    pub wind_direction: Option<f64>,
    pub description: String,
    pub icon: String,
    pub observed_at: DateTime<Utc>,
    pub sunrise: DateTime<Utc>,
    pub sunset: DateTime<Utc>,
    /// Shift from UTC in seconds for the location
    pub timezone_offset: i32,
}

impl WeatherSnapshot {
    /// "Name, CC" when the provider reports a country
    pub fn display_name(&self) -> String {
        match &self.country {
            Some(country) if !country.is_empty() => format!("{}, {}", self.location_name, country),
            _ => self.location_name.clone(),
        }
    }

    /// The location's UTC offset
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone_offset).unwrap_or_else(|| Utc.fix())
    }
}

/// One 3-hour forecast sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub time: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: u8,
    pub wind_speed: f64,
    pub description: String,
    pub icon: String,
    /// Probability of precipitation, 0.0-1.0
    pub precipitation_chance: f64,
}

/// Ordered forecast samples as returned by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub city_name: String,
    pub samples: Vec<ForecastSample>,
}

/// Air quality index levels used by the provider (1 = best, 5 = worst)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AqiLevel {
    Good,
    Fair,
    Moderate,
    Poor,
    VeryPoor,
}

impl AqiLevel {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1 => Some(Self::Good),
            2 => Some(Self::Fair),
            3 => Some(Self::Moderate),
            4 => Some(Self::Poor),
            5 => Some(Self::VeryPoor),
            _ => None,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Self::Good => 1,
            Self::Fair => 2,
            Self::Moderate => 3,
            Self::Poor => 4,
            Self::VeryPoor => 5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Moderate => "Moderate",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
        }
    }

    pub fn health_implication(&self) -> &'static str {
        match self {
            Self::Good => "Air quality is considered satisfactory, and air pollution poses little or no risk.",
            Self::Fair => "Air quality is acceptable; however, some pollutants may be of concern for a small number of people.",
            Self::Moderate => "Members of sensitive groups may experience health effects. General public is less likely to be affected.",
            Self::Poor => "Everyone may begin to experience health effects. Members of sensitive groups may experience more serious effects.",
            Self::VeryPoor => "Health warnings of emergency conditions. The entire population is more likely to be affected.",
        }
    }

    /// Advice shown for levels above Fair
    pub fn advisory(&self) -> Option<&'static str> {
        match self {
            Self::Good | Self::Fair => None,
            Self::Moderate => Some(
                "Sensitive individuals should consider reducing prolonged outdoor activities.",
            ),
            Self::Poor | Self::VeryPoor => Some(
                "Consider reducing outdoor activities and wearing a mask when outside.",
            ),
        }
    }
}

/// Pollutants reported by the air pollution endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pollutant {
    Co,
    No,
    No2,
    O3,
    So2,
    Pm25,
    Pm10,
    Nh3,
}

impl Pollutant {
    pub const ALL: [Pollutant; 8] = [
        Pollutant::Co,
        Pollutant::No,
        Pollutant::No2,
        Pollutant::O3,
        Pollutant::So2,
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::Nh3,
    ];

    /// Provider component key
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "co" => Some(Self::Co),
            "no" => Some(Self::No),
            "no2" => Some(Self::No2),
            "o3" => Some(Self::O3),
            "so2" => Some(Self::So2),
            "pm2_5" => Some(Self::Pm25),
            "pm10" => Some(Self::Pm10),
            "nh3" => Some(Self::Nh3),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Co => "co",
            Self::No => "no",
            Self::No2 => "no2",
            Self::O3 => "o3",
            Self::So2 => "so2",
            Self::Pm25 => "pm2_5",
            Self::Pm10 => "pm10",
            Self::Nh3 => "nh3",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Co => "Carbon Monoxide",
            Self::No => "Nitrogen Monoxide",
            Self::No2 => "Nitrogen Dioxide",
            Self::O3 => "Ozone",
            Self::So2 => "Sulfur Dioxide",
            Self::Pm25 => "PM2.5",
            Self::Pm10 => "PM10",
            Self::Nh3 => "Ammonia",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Co => "Colorless, odorless gas that can be harmful when inhaled",
            Self::No => "Colorless gas formed during combustion",
            Self::No2 => "Reddish-brown gas with a pungent, acrid odor",
            Self::O3 => "A reactive form of oxygen that can affect breathing",
            Self::So2 => "Colorless gas with a sharp, pungent odor",
            Self::Pm25 => "Fine particulate matter smaller than 2.5 micrometers",
            Self::Pm10 => "Particulate matter smaller than 10 micrometers",
            Self::Nh3 => "Colorless gas with a characteristic pungent smell",
        }
    }
}

/// Air quality at one point in time; concentrations in µg/m³
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirQualitySample {
    pub aqi: AqiLevel,
    pub measured_at: DateTime<Utc>,
    pub components: BTreeMap<Pollutant, f64>,
}

/// Everything fetched by one successful aggregation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub query: String,
    pub unit: Unit,
    pub location: Location,
    pub weather: WeatherSnapshot,
    pub forecast: ForecastSeries,
    pub air_quality: AirQualitySample,
    pub fetched_at: DateTime<Utc>,
}

/// Aggregation flow phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowPhase {
    #[default]
    Idle,
    Resolving,
    FetchingCurrent,
    FetchingForecast,
    FetchingAirQuality,
    Ready,
    Errored,
}

impl FlowPhase {
    pub fn is_fetching(self) -> bool {
        matches!(
            self,
            FlowPhase::FetchingCurrent | FlowPhase::FetchingForecast | FlowPhase::FetchingAirQuality
        )
    }

    pub fn is_busy(self) -> bool {
        self == FlowPhase::Resolving || self.is_fetching()
    }
}

/// Dashboard state owned by the aggregation flow.
///
/// Readers only ever see immutable snapshots; each update swaps in a new value.
#[derive(Debug, Clone, Default)]
pub struct AggregatedState {
    pub report: Option<Arc<WeatherReport>>,
    pub unit: Unit,
    pub phase: FlowPhase,
    pub loading: bool,
    pub locating: bool,
    pub error: Option<String>,
    /// Generation of the cycle that last wrote this state
    pub generation: u64,
}

impl AggregatedState {
    pub fn location(&self) -> Option<&Location> {
        self.report.as_deref().map(|r| &r.location)
    }

    pub fn weather(&self) -> Option<&WeatherSnapshot> {
        self.report.as_deref().map(|r| &r.weather)
    }

    pub fn forecast(&self) -> Option<&ForecastSeries> {
        self.report.as_deref().map(|r| &r.forecast)
    }

    pub fn air_quality(&self) -> Option<&AirQualitySample> {
        self.report.as_deref().map(|r| &r.air_quality)
    }

    /// Query of the last successful cycle
    pub fn last_query(&self) -> Option<&str> {
        self.report.as_deref().map(|r| r.query.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinates_range() {
        assert!(Coordinates::new(18.52, 73.86).is_ok());
        assert!(Coordinates::new(90.0, -180.0).is_ok());
        assert!(Coordinates::new(90.1, 0.0).is_err());
        assert!(Coordinates::new(0.0, 180.5).is_err());
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_coordinates_query() {
        let coords = Coordinates::new(18.5, 73.75).unwrap();
        assert_eq!(coords.to_query(), "18.5,73.75");
    }

    #[test]
    fn test_aqi_levels() {
        for index in 1..=5 {
            let level = AqiLevel::from_index(index).unwrap();
            assert_eq!(level.index(), index);
            assert!(!level.label().is_empty());
        }
        assert_eq!(AqiLevel::from_index(0), None);
        assert_eq!(AqiLevel::from_index(6), None);
        assert_eq!(AqiLevel::VeryPoor.label(), "Very Poor");
    }

    #[test]
    fn test_aqi_advisory_above_fair() {
        assert!(AqiLevel::Good.advisory().is_none());
        assert!(AqiLevel::Fair.advisory().is_none());
        assert!(AqiLevel::Moderate.advisory().unwrap().contains("Sensitive"));
        assert!(AqiLevel::Poor.advisory().unwrap().contains("mask"));
    }

    #[test]
    fn test_pollutant_codes_round_trip() {
        for pollutant in Pollutant::ALL {
            assert_eq!(Pollutant::from_code(pollutant.code()), Some(pollutant));
        }
        assert_eq!(Pollutant::from_code("pm1"), None);
    }

    #[test]
    fn test_flow_phase_flags() {
        assert!(FlowPhase::FetchingForecast.is_fetching());
        assert!(FlowPhase::Resolving.is_busy());
        assert!(!FlowPhase::Resolving.is_fetching());
        assert!(!FlowPhase::Ready.is_busy());
    }

    #[test]
    fn test_empty_state_has_no_report() {
        let state = AggregatedState::default();
        assert!(state.weather().is_none());
        assert!(state.last_query().is_none());
        assert_eq!(state.phase, FlowPhase::Idle);
        assert_eq!(state.unit, Unit::Metric);
    }
}
