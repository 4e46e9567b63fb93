//! Aggregation flow: resolve a location, fetch current conditions, forecast and
//! air quality in order, and commit them to the dashboard state as one unit.
//!
//! Phases: `Idle -> Resolving -> FetchingCurrent -> FetchingForecast ->
//! FetchingAirQuality -> Ready`. A failed fetch passes through `Errored` and
//! settles on `Ready` when an earlier report is still shown, `Idle` otherwise.
//!
//! Each cycle takes a generation number. Only the newest cycle may write state,
//! so a slow response from an older search never replaces a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use skycast_core::{Config, PreferenceKey, PreferenceStore, WeatherError};

use crate::geocode::ReverseGeocoder;
use crate::location::{Geolocator, PositionOptions};
use crate::provider::WeatherGateway;
use crate::resolver::{LocationResolver, FALLBACK_LOCATION};
use crate::types::{AggregatedState, FlowPhase, Location, Unit, WeatherReport};

/// Settings the flow needs from configuration
#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub default_unit: Unit,
    pub fallback_location: String,
    pub position_options: PositionOptions,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            default_unit: Unit::Metric,
            fallback_location: FALLBACK_LOCATION.to_string(),
            position_options: PositionOptions::default(),
        }
    }
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_unit: config.weather.default_unit,
            fallback_location: config.weather.fallback_location.clone(),
            position_options: PositionOptions::from_config(&config.geolocation),
        }
    }
}

/// How a cycle ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new report was committed
    Committed,
    /// A fetch failed; the previous report is kept
    Failed { message: String },
    /// A newer cycle started before this one finished
    Superseded,
}

enum CycleError {
    Superseded,
    Fetch(WeatherError),
}

impl From<WeatherError> for CycleError {
    fn from(err: WeatherError) -> Self {
        CycleError::Fetch(err)
    }
}

pub struct AggregationFlow<G, L, P> {
    gateway: G,
    geolocator: L,
    preferences: P,
    resolver: LocationResolver,
    state: RwLock<Arc<AggregatedState>>,
    generation: AtomicU64,
}

impl<G, L, P> AggregationFlow<G, L, P>
where
    G: WeatherGateway + ReverseGeocoder,
    L: Geolocator,
    P: PreferenceStore,
{
    pub fn new(gateway: G, geolocator: L, preferences: P, settings: FlowSettings) -> Self {
        let unit = match preferences.get(PreferenceKey::PreferredUnit) {
            Some(raw) => raw.parse::<Unit>().unwrap_or_else(|e| {
                tracing::warn!("Ignoring stored unit preference: {}", e);
                settings.default_unit
            }),
            None => settings.default_unit,
        };

        let state = AggregatedState {
            unit,
            ..AggregatedState::default()
        };

        Self {
            gateway,
            geolocator,
            preferences,
            resolver: LocationResolver::new(settings.position_options, &settings.fallback_location),
            state: RwLock::new(Arc::new(state)),
            generation: AtomicU64::new(0),
        }
    }

    /// Read-only snapshot of the current state
    pub fn state(&self) -> Arc<AggregatedState> {
        self.state.read().clone()
    }

    pub fn unit(&self) -> Unit {
        self.state.read().unit
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn preferences(&self) -> &P {
        &self.preferences
    }

    /// Load the last searched location, or locate the device when there is none.
    pub async fn start(&self) -> CycleOutcome {
        match self.preferences.get(PreferenceKey::LastSearchedLocation) {
            Some(query) if !query.trim().is_empty() => {
                tracing::info!("Restoring last searched location: {}", query);
                self.search(&query).await
            }
            _ => self.locate().await,
        }
    }

    /// Run a full cycle for a free-text query.
    pub async fn search(&self, query: &str) -> CycleOutcome {
        let resolution = self.resolver.resolve_text(query);
        let generation = self.begin_cycle(false);
        self.run_cycle(generation, &resolution.query, None).await
    }

    /// Resolve the device position (falling back to the default city) and run a cycle.
    pub async fn locate(&self) -> CycleOutcome {
        let generation = self.begin_cycle(true);

        let resolution = self
            .resolver
            .resolve_device(&self.geolocator, &self.gateway)
            .await;

        let notice = resolution.failure().map(|e| e.user_message());
        if let Some(message) = &notice {
            tracing::warn!("{}", message);
        }

        let still_current = self.update_if_current(generation, |state| {
            state.locating = false;
            state.error = notice.clone();
        });
        if !still_current {
            return CycleOutcome::Superseded;
        }

        self.run_cycle(generation, &resolution.query, notice).await
    }

    /// Flip the unit and re-run the last successful query under it.
    ///
    /// Returns `None` when nothing has been fetched yet; no request is made.
    pub async fn toggle_unit(&self) -> Option<CycleOutcome> {
        let unit = self.unit().toggled();
        self.replace_state(|state| state.unit = unit);

        if let Err(e) = self.preferences.set(PreferenceKey::PreferredUnit, unit.as_str()) {
            tracing::warn!("Failed to persist unit preference: {:#}", e);
        }
        tracing::info!("Unit switched to {}", unit);

        let query = self.state().last_query().map(str::to_string)?;
        Some(self.search(&query).await)
    }

    fn begin_cycle(&self, locating: bool) -> u64 {
        let mut guard = self.state.write();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut next = (**guard).clone();
        next.generation = generation;
        next.loading = true;
        next.locating = locating;
        next.error = None;
        log_transition(guard.phase, FlowPhase::Resolving, generation);
        next.phase = FlowPhase::Resolving;

        *guard = Arc::new(next);
        generation
    }

    async fn run_cycle(&self, generation: u64, query: &str, notice: Option<String>) -> CycleOutcome {
        let unit = self.unit();

        match self.fetch_report(generation, query, unit).await {
            Ok(report) => self.commit(generation, report, notice),
            Err(CycleError::Superseded) => {
                tracing::debug!("Discarding results of superseded cycle {} for {:?}", generation, query);
                CycleOutcome::Superseded
            }
            Err(CycleError::Fetch(err)) => self.fail(generation, query, err),
        }
    }

    async fn fetch_report(
        &self,
        generation: u64,
        query: &str,
        unit: Unit,
    ) -> Result<WeatherReport, CycleError> {
        self.enter(generation, FlowPhase::FetchingCurrent)?;
        let weather = self.gateway.fetch_current(query, unit).await?;

        self.enter(generation, FlowPhase::FetchingForecast)?;
        let forecast = self.gateway.fetch_forecast(query, unit).await?;

        // The air pollution endpoint only takes coordinates.
        self.enter(generation, FlowPhase::FetchingAirQuality)?;
        let air_quality = self.gateway.fetch_air_quality(weather.coordinates).await?;

        let display_name = if weather.location_name.trim().is_empty() {
            query.to_string()
        } else {
            weather.display_name()
        };

        Ok(WeatherReport {
            query: query.to_string(),
            unit,
            location: Location {
                coordinates: weather.coordinates,
                display_name: Some(display_name),
            },
            weather,
            forecast,
            air_quality,
            fetched_at: Utc::now(),
        })
    }

    fn commit(&self, generation: u64, report: WeatherReport, notice: Option<String>) -> CycleOutcome {
        let query = report.query.clone();
        let report = Arc::new(report);

        let committed = self.update_if_current(generation, |state| {
            state.report = Some(report.clone());
            state.phase = FlowPhase::Ready;
            state.loading = false;
            state.locating = false;
            state.error = notice.clone();
        });
        if !committed {
            return CycleOutcome::Superseded;
        }

        if let Err(e) = self
            .preferences
            .set(PreferenceKey::LastSearchedLocation, &query)
        {
            tracing::warn!("Failed to persist last searched location: {:#}", e);
        }

        tracing::info!("Weather report committed for {:?} (cycle {})", query, generation);
        CycleOutcome::Committed
    }

    fn fail(&self, generation: u64, query: &str, err: WeatherError) -> CycleOutcome {
        tracing::warn!("Weather fetch for {:?} failed: {}", query, err);
        let message = err.user_message().to_string();

        let updated = self.update_if_current(generation, |state| {
            log_transition(state.phase, FlowPhase::Errored, generation);
            state.phase = if state.report.is_some() {
                FlowPhase::Ready
            } else {
                FlowPhase::Idle
            };
            state.loading = false;
            state.locating = false;
            state.error = Some(message.clone());
        });
        if !updated {
            return CycleOutcome::Superseded;
        }

        // Don't retry a known-bad query on the next start.
        if let Err(e) = self.preferences.remove(PreferenceKey::LastSearchedLocation) {
            tracing::warn!("Failed to clear last searched location: {:#}", e);
        }

        CycleOutcome::Failed { message }
    }

    fn enter(&self, generation: u64, phase: FlowPhase) -> Result<(), CycleError> {
        if self.update_if_current(generation, |state| state.phase = phase) {
            Ok(())
        } else {
            Err(CycleError::Superseded)
        }
    }

    /// Apply `f` to a copy of the state and swap it in, unless a newer cycle has started.
    fn update_if_current(&self, generation: u64, f: impl FnOnce(&mut AggregatedState)) -> bool {
        let mut guard = self.state.write();
        if guard.generation != generation {
            return false;
        }

        let mut next = (**guard).clone();
        f(&mut next);
        log_transition(guard.phase, next.phase, generation);

        *guard = Arc::new(next);
        true
    }

    fn replace_state(&self, f: impl FnOnce(&mut AggregatedState)) {
        let mut guard = self.state.write();
        let mut next = (**guard).clone();
        f(&mut next);
        *guard = Arc::new(next);
    }
}

fn log_transition(from: FlowPhase, to: FlowPhase, generation: u64) {
    if from != to {
        tracing::debug!("Cycle {}: {:?} -> {:?}", generation, from, to);
    }
}
