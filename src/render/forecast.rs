//! Five-day forecast panel.

use chrono::FixedOffset;
use skycast_weather::{ForecastSample, ForecastSeries, Unit};

use super::{capitalize, round};

/// Samples are three hours apart, so every 8th one is a new day.
const SAMPLES_PER_DAY: usize = 8;

pub fn daily_samples(series: &ForecastSeries) -> Vec<&ForecastSample> {
    series.samples.iter().step_by(SAMPLES_PER_DAY).collect()
}

pub fn render(series: &ForecastSeries, unit: Unit, offset: FixedOffset) -> String {
    let mut lines = vec!["5-Day Forecast".to_string()];

    for sample in daily_samples(series) {
        lines.push(format!(
            "  {:<12} {:>4}{}  {:<20} humidity {}%  wind {} {}",
            sample.time.with_timezone(&offset).format("%a, %b %-d"),
            round(sample.temperature),
            unit.temperature_symbol(),
            capitalize(&sample.description),
            sample.humidity,
            sample.wind_speed,
            unit.wind_speed_symbol()
        ));
    }

    if lines.len() == 1 {
        lines.push("  No forecast data available".to_string());
    }
    lines.join("\n")
}
