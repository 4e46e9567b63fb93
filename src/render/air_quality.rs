//! Air quality panel.

use skycast_weather::AirQualitySample;

pub fn render(sample: &AirQualitySample) -> String {
    let aqi = sample.aqi;
    let mut lines = vec![
        "Air Quality Index".to_string(),
        format!("  AQI {} - {}", aqi.index(), aqi.label()),
        format!("  {}", aqi.health_implication()),
        String::new(),
    ];

    for (pollutant, value) in &sample.components {
        lines.push(format!(
            "  {:<18} {:>8.1} µg/m³  {}",
            pollutant.name(),
            value,
            pollutant.description()
        ));
    }

    if let Some(advisory) = aqi.advisory() {
        lines.push(String::new());
        lines.push(format!("  Health Advisory: {}", advisory));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use skycast_weather::{AqiLevel, Pollutant};
    use std::collections::BTreeMap;

    fn sample(index: u8) -> AirQualitySample {
        AirQualitySample {
            aqi: AqiLevel::from_index(index).unwrap(),
            measured_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            components: BTreeMap::from([(Pollutant::Pm25, 12.5), (Pollutant::Co, 201.94)]),
        }
    }

    #[test]
    fn test_render_level_and_pollutants() {
        let panel = render(&sample(2));
        assert!(panel.contains("AQI 2 - Fair"));
        assert!(panel.contains("PM2.5"));
        assert!(panel.contains("12.5 µg/m³"));
        assert!(panel.contains("201.9 µg/m³"));
        assert!(panel.contains("Carbon Monoxide"));
    }

    #[test]
    fn test_advisory_only_above_fair() {
        assert!(!render(&sample(2)).contains("Health Advisory"));
        assert!(render(&sample(3)).contains("Health Advisory"));
        assert!(render(&sample(5)).contains("wearing a mask"));
    }
}
