//! Current conditions card.

use skycast_weather::{Unit, WeatherSnapshot};

use super::{capitalize, round};

const COMPASS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// 16-point compass direction for a wind bearing in degrees.
pub fn compass_direction(degrees: f64) -> &'static str {
    let idx = (degrees.rem_euclid(360.0) / 22.5).round() as usize % 16;
    COMPASS[idx]
}

pub fn render(weather: &WeatherSnapshot, unit: Unit) -> String {
    let temp = unit.temperature_symbol();
    let offset = weather.local_offset();

    let wind_direction = weather
        .wind_direction
        .map(compass_direction)
        .unwrap_or("n/a");
    let visibility = match weather.visibility {
        Some(meters) => format!(
            "{:.1} {}",
            unit.visibility_from_meters(f64::from(meters)),
            unit.distance_symbol()
        ),
        None => "n/a".to_string(),
    };

    let lines = [
        format!("Current Weather in {}", weather.display_name()),
        format!(
            "  {}{}  {}",
            round(weather.temperature),
            temp,
            capitalize(&weather.description)
        ),
        format!("  Feels like   {}{}", round(weather.feels_like), temp),
        format!("  Humidity     {}%", weather.humidity),
        format!(
            "  Wind         {} {} {}",
            weather.wind_speed,
            unit.wind_speed_symbol(),
            wind_direction
        ),
        format!("  Pressure     {} hPa", weather.pressure),
        format!("  Visibility   {}", visibility),
        format!(
            "  Sunrise      {}   Sunset {}",
            weather.sunrise.with_timezone(&offset).format("%H:%M"),
            weather.sunset.with_timezone(&offset).format("%H:%M")
        ),
        format!(
            "  Min/Max      {}/{}{}",
            round(weather.temp_min),
            round(weather.temp_max),
            temp
        ),
    ];

    lines.join("\n")
}
