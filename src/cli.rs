use std::path::PathBuf;

use clap::builder::{styling::AnsiColor, Styles};
use clap::{Parser, Subcommand};

const ABOUT: &str = "Terminal weather dashboard";

const LONG_ABOUT: &str = "
Weather dashboard for the terminal, backed by the OpenWeather APIs.

Shows current conditions, a 5-day forecast, air quality and a map link for a city or for the
current position. Set OPENWEATHER_API_KEY or `weather.api_key` in the config file.

The last searched city and the preferred unit are saved, so a plain `skycast` shows the last
location again. Without a saved city the current position is used, falling back to Pune.
";

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default())
    .usage(AnsiColor::Green.on_default())
    .literal(AnsiColor::Green.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug)]
#[command(version, styles=STYLES, about=ABOUT, long_about = LONG_ABOUT)]
pub struct Args {
    #[arg(long, help = "Keep preferences in memory for this run only")]
    pub no_persist: bool,

    #[arg(long, value_name = "FILE", help = "Path to an alternative config.toml")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Show weather for a city (e.g. "Pune", "London,GB")
    Search {
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },
    /// Show weather for the current position
    Locate,
    /// Switch between metric and imperial units
    ToggleUnits,
    /// Show stored preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },
    /// Read commands from stdin
    Interactive,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum PrefsAction {
    /// Remove all stored preferences
    Clear,
}

impl Command {
    /// Joined city words, as typed
    pub fn search_query(city: &[String]) -> String {
        city.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_command_means_start() {
        let args = Args::try_parse_from(["skycast"]).unwrap();
        assert!(args.command.is_none());
        assert!(!args.no_persist);
    }

    #[test]
    fn test_search_joins_words() {
        let args = Args::try_parse_from(["skycast", "search", "New", "York"]).unwrap();
        match args.command {
            Some(Command::Search { city }) => {
                assert_eq!(Command::search_query(&city), "New York")
            }
            other => unreachable!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_search_requires_city() {
        assert!(Args::try_parse_from(["skycast", "search"]).is_err());
    }

    #[test]
    fn test_prefs_clear_and_flags() {
        let args = Args::try_parse_from([
            "skycast",
            "--no-persist",
            "--config",
            "/tmp/skycast.toml",
            "prefs",
            "clear",
        ])
        .unwrap();
        assert!(args.no_persist);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/skycast.toml")));
        assert_eq!(
            args.command,
            Some(Command::Prefs {
                action: Some(PrefsAction::Clear)
            })
        );
    }

    #[test]
    fn test_toggle_units_name() {
        let args = Args::try_parse_from(["skycast", "toggle-units"]).unwrap();
        assert_eq!(args.command, Some(Command::ToggleUnits));
    }
}
