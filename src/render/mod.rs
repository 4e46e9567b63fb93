//! Text rendering of the dashboard.
//!
//! Every function here is pure: it takes a state snapshot (or part of one) and
//! returns the text to print.

pub mod air_quality;
pub mod chart;
pub mod current;
pub mod forecast;
pub mod map;

use skycast_weather::AggregatedState;

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";

/// Compose the whole dashboard: error banner, progress line and every panel with data.
pub fn dashboard(state: &AggregatedState) -> String {
    let mut sections = Vec::new();

    if let Some(error) = &state.error {
        sections.push(format!("! {}", error));
    }
    if state.locating {
        sections.push("Locating...".to_string());
    } else if state.loading {
        sections.push("Loading weather data...".to_string());
    }

    match &state.report {
        Some(report) => {
            // Readings are in the unit they were fetched with.
            let unit = report.unit;
            let weather = &report.weather;
            sections.push(current::render(weather, unit));
            sections.push(chart::render(weather, unit));
            sections.push(forecast::render(&report.forecast, unit, weather.local_offset()));
            sections.push(air_quality::render(&report.air_quality));
            sections.push(map::render(&report.location, Some(weather), unit));
        }
        None if sections.is_empty() => {
            sections.push("No weather data yet. Search for a city to get started.".to_string());
        }
        None => {}
    }

    sections.join(&format!("\n{}\n", SEPARATOR))
}

/// Round half away from zero, the way readings are shown.
pub(crate) fn round(value: f64) -> i64 {
    value.round() as i64
}

/// "clear sky" -> "Clear Sky"
pub(crate) fn capitalize(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
