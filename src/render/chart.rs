//! "Weather Details" bar chart of the current readings.

use skycast_weather::{Unit, WeatherSnapshot};

const BAR_WIDTH: usize = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ChartRow {
    pub label: &'static str,
    pub value: f64,
    pub unit: &'static str,
}

pub fn rows(weather: &WeatherSnapshot, unit: Unit) -> Vec<ChartRow> {
    let temp = unit.temperature_symbol();
    vec![
        ChartRow {
            label: "Temperature",
            value: weather.temperature,
            unit: temp,
        },
        ChartRow {
            label: "Feels Like",
            value: weather.feels_like,
            unit: temp,
        },
        ChartRow {
            label: "Min Temp",
            value: weather.temp_min,
            unit: temp,
        },
        ChartRow {
            label: "Max Temp",
            value: weather.temp_max,
            unit: temp,
        },
        ChartRow {
            label: "Humidity",
            value: f64::from(weather.humidity),
            unit: "%",
        },
        ChartRow {
            label: "Wind Speed",
            value: weather.wind_speed,
            unit: unit.wind_speed_symbol(),
        },
    ]
}

fn bar_len(value: f64, scale: f64) -> usize {
    if scale <= 0.0 {
        return 0;
    }
    ((value.abs() / scale) * BAR_WIDTH as f64).round() as usize
}

pub fn render(weather: &WeatherSnapshot, unit: Unit) -> String {
    let rows = rows(weather, unit);
    let scale = rows.iter().map(|r| r.value.abs()).fold(0.0, f64::max);

    let mut lines = vec!["Weather Details".to_string()];
    for row in &rows {
        lines.push(format!(
            "  {:<12} {:<width$} {:.1}{}",
            row.label,
            "█".repeat(bar_len(row.value, scale)),
            row.value,
            row.unit,
            width = BAR_WIDTH
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::snapshot;

    #[test]
    fn test_rows_follow_reading_order() {
        let labels: Vec<_> = rows(&snapshot(), Unit::Metric)
            .into_iter()
            .map(|r| r.label)
            .collect();
        assert_eq!(
            labels,
            ["Temperature", "Feels Like", "Min Temp", "Max Temp", "Humidity", "Wind Speed"]
        );
    }

    #[test]
    fn test_largest_reading_fills_bar() {
        let chart = render(&snapshot(), Unit::Metric);
        let humidity = chart.lines().find(|l| l.contains("Humidity")).unwrap();
        assert_eq!(humidity.matches('█').count(), BAR_WIDTH);
        assert!(humidity.ends_with("40.0%"));
    }

    #[test]
    fn test_zero_scale_draws_no_bars() {
        assert_eq!(bar_len(5.0, 0.0), 0);
        assert_eq!(bar_len(-10.0, 20.0), 15);
    }
}
