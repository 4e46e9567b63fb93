//! Weather data for SkyCast
//!
//! Fetches current conditions, a five-day forecast and air quality from the
//! OpenWeather APIs and aggregates them into a single dashboard state.

pub mod flow;
pub mod geocode;
pub mod location;
pub mod provider;
pub mod resolver;
pub mod types;

pub use flow::{AggregationFlow, CycleOutcome, FlowSettings};
pub use geocode::ReverseGeocoder;
pub use location::{
    DisabledGeolocator, FixedGeolocator, Geolocator, IpGeolocator, Position, PositionOptions,
};
pub use provider::{OpenWeatherProvider, WeatherGateway};
pub use resolver::{LocationResolver, Resolution, ResolutionOrigin, FALLBACK_LOCATION};
pub use types::*;
