//! Line-oriented interactive session over one aggregation flow.

use std::io::Write;

use anyhow::Result;
use skycast_core::{PreferenceKey, PreferenceStore};
use skycast_weather::{AggregationFlow, CycleOutcome, Geolocator, ReverseGeocoder, WeatherGateway};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::render;

const PROMPT: &str = "skycast> ";

const HELP: &str = "\
Commands:
  search <city>   show weather for a city (a bare city name works too)
  locate          show weather for the current position
  units           switch between metric and imperial
  show            print the dashboard again
  quit            leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Search(String),
    Locate,
    ToggleUnits,
    Show,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<SessionCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "search" if rest.is_empty() => SessionCommand::Help,
        "search" => SessionCommand::Search(rest.to_string()),
        "locate" if rest.is_empty() => SessionCommand::Locate,
        "units" if rest.is_empty() => SessionCommand::ToggleUnits,
        "show" if rest.is_empty() => SessionCommand::Show,
        "help" | "?" if rest.is_empty() => SessionCommand::Help,
        "quit" | "exit" if rest.is_empty() => SessionCommand::Quit,
        _ => SessionCommand::Search(line.to_string()),
    };
    Some(command)
}

/// Switch units and refetch under the new one.
///
/// Without a report in memory (a fresh process) the stored last search is
/// fetched instead. `None` means there was nothing to fetch.
pub async fn toggle_units<G, L, P>(flow: &AggregationFlow<G, L, P>) -> Option<CycleOutcome>
where
    G: WeatherGateway + ReverseGeocoder,
    L: Geolocator,
    P: PreferenceStore,
{
    if let Some(outcome) = flow.toggle_unit().await {
        return Some(outcome);
    }

    let query = flow
        .preferences()
        .get(PreferenceKey::LastSearchedLocation)
        .filter(|q| !q.trim().is_empty())?;
    tracing::info!("Refetching last searched location {} in {}", query, flow.unit());
    Some(flow.search(&query).await)
}

/// Read commands from `input` until `quit` or end of input, printing the dashboard after each.
pub async fn run<G, L, P, R, W>(
    flow: &AggregationFlow<G, L, P>,
    input: R,
    output: &mut W,
) -> Result<()>
where
    G: WeatherGateway + ReverseGeocoder,
    L: Geolocator,
    P: PreferenceStore,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(output, "{}", HELP)?;

    loop {
        write!(output, "{}", PROMPT)?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = parse_line(&line) else {
            continue;
        };
        tracing::debug!("Session command: {:?}", command);

        match command {
            SessionCommand::Search(query) => {
                flow.search(&query).await;
            }
            SessionCommand::Locate => {
                flow.locate().await;
            }
            SessionCommand::ToggleUnits => {
                if toggle_units(flow).await.is_none() {
                    writeln!(
                        output,
                        "Units set to {}. Search for a city to fetch data.",
                        flow.unit()
                    )?;
                    continue;
                }
            }
            SessionCommand::Show => {}
            SessionCommand::Help => {
                writeln!(output, "{}", HELP)?;
                continue;
            }
            SessionCommand::Quit => break,
        }

        writeln!(output, "{}", render::dashboard(&flow.state()))?;
    }

    Ok(())
}
