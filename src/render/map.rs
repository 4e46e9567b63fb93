//! Map panel: OpenStreetMap link and the slippy-map tile holding the location.

use std::f64::consts::PI;

use skycast_weather::{Coordinates, Location, Unit, WeatherSnapshot};

use super::{capitalize, round};

pub const TILE_ZOOM: u8 = 10;

/// Web Mercator cannot show the poles.
const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_78;

/// Tile column and row for `coordinates` at `zoom`.
pub fn tile_for(coordinates: Coordinates, zoom: u8) -> (u32, u32) {
    let n = f64::from(1u32 << zoom);
    let lat = coordinates
        .latitude()
        .clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE)
        .to_radians();

    let x = (coordinates.longitude() + 180.0) / 360.0 * n;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n;

    let max = n - 1.0;
    (x.floor().clamp(0.0, max) as u32, y.floor().clamp(0.0, max) as u32)
}

pub fn tile_url(coordinates: Coordinates) -> String {
    let (x, y) = tile_for(coordinates, TILE_ZOOM);
    format!("https://tile.openstreetmap.org/{}/{}/{}.png", TILE_ZOOM, x, y)
}

pub fn osm_link(coordinates: Coordinates) -> String {
    let (lat, lon) = (coordinates.latitude(), coordinates.longitude());
    format!(
        "https://www.openstreetmap.org/?mlat={lat:.4}&mlon={lon:.4}#map={}/{lat:.4}/{lon:.4}",
        TILE_ZOOM
    )
}

pub fn render(location: &Location, weather: Option<&WeatherSnapshot>, unit: Unit) -> String {
    let coordinates = location.coordinates;
    let mut lines = vec![
        "Map".to_string(),
        format!("  Coordinates  {}", coordinates),
        format!("  OpenStreetMap {}", osm_link(coordinates)),
        format!("  Tile         {}", tile_url(coordinates)),
    ];

    if let Some(weather) = weather {
        let name = location
            .display_name
            .clone()
            .unwrap_or_else(|| weather.display_name());
        lines.push(format!(
            "  Marker       {}: {}, {}{}",
            name,
            capitalize(&weather.description),
            round(weather.temperature),
            unit.temperature_symbol()
        ));
    }

    lines.push("  © OpenStreetMap contributors".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::snapshot;

    fn coords(lat: f64, lon: f64) -> Coordinates {
        Coordinates::new(lat, lon).unwrap()
    }

    #[test]
    fn test_tile_at_origin() {
        assert_eq!(tile_for(coords(0.0, 0.0), TILE_ZOOM), (512, 512));
        assert_eq!(tile_for(coords(0.0, 0.0), 0), (0, 0));
    }

    #[test]
    fn test_tile_for_pune() {
        assert_eq!(tile_for(coords(18.52, 73.86), TILE_ZOOM), (722, 458));
    }

    #[test]
    fn test_tile_clamped_at_edges() {
        assert_eq!(tile_for(coords(89.0, 180.0), TILE_ZOOM), (1023, 0));
        assert_eq!(tile_for(coords(-89.0, -180.0), TILE_ZOOM), (0, 1023));
    }

    #[test]
    fn test_osm_link() {
        assert_eq!(
            osm_link(coords(18.52, 73.86)),
            "https://www.openstreetmap.org/?mlat=18.5200&mlon=73.8600#map=10/18.5200/73.8600"
        );
    }

    #[test]
    fn test_render_marker_line() {
        let weather = snapshot();
        let location = Location {
            coordinates: weather.coordinates,
            display_name: Some("Pune, IN".to_string()),
        };
        let panel = render(&location, Some(&weather), Unit::Metric);
        assert!(panel.contains("tile.openstreetmap.org/10/722/458.png"));
        assert!(panel.contains("Marker       Pune, IN: Clear Sky, 31°C"));
    }
}
