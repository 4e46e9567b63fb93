mod cli;
mod render;
mod session;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use skycast_core::{
    AppError, Config, ConfigError, FilePreferences, MemoryPreferences, PreferenceKey,
    PreferenceStore,
};
use skycast_weather::{location, AggregationFlow, CycleOutcome, FlowSettings, OpenWeatherProvider};

use crate::cli::{Args, Command, PrefsAction};

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = skycast_core::init() {
        eprintln!("{:#}", e);
    }

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::debug!("Fatal error: {:?}", e);
            eprintln!("Error: {}", describe(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let (config, _) = Config::load_validated(args.config.as_deref())?;
    tracing::info!("Config directory: {}", config.config_dir.display());

    let preferences: Arc<dyn PreferenceStore> = if args.no_persist {
        Arc::new(MemoryPreferences::new())
    } else {
        Arc::new(FilePreferences::new(&config.config_dir))
    };

    if let Some(Command::Prefs { action }) = &args.command {
        return show_or_clear_preferences(preferences.as_ref(), action.as_ref());
    }

    let provider = OpenWeatherProvider::from_config(&config.weather).map_err(AppError::from)?;
    let geolocator = location::from_config(&config.geolocation);
    let flow = AggregationFlow::new(
        provider,
        geolocator,
        preferences,
        FlowSettings::from_config(&config),
    );

    let outcome = match args.command {
        None => Some(flow.start().await),
        Some(Command::Search { city }) => {
            let query = Command::search_query(&city);
            Some(flow.search(&query).await)
        }
        Some(Command::Locate) => Some(flow.locate().await),
        Some(Command::ToggleUnits) => {
            let outcome = session::toggle_units(&flow).await;
            if outcome.is_none() {
                println!(
                    "Units set to {}. Search for a city to fetch data.",
                    flow.unit()
                );
                return Ok(ExitCode::SUCCESS);
            }
            outcome
        }
        Some(Command::Interactive) => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            session::run(&flow, stdin, &mut std::io::stdout()).await?;
            None
        }
        Some(Command::Prefs { .. }) => None,
    };

    let Some(outcome) = outcome else {
        return Ok(ExitCode::SUCCESS);
    };

    println!("{}", render::dashboard(&flow.state()));
    Ok(match outcome {
        CycleOutcome::Failed { .. } => ExitCode::FAILURE,
        CycleOutcome::Committed | CycleOutcome::Superseded => ExitCode::SUCCESS,
    })
}

fn show_or_clear_preferences(
    preferences: &dyn PreferenceStore,
    action: Option<&PrefsAction>,
) -> Result<ExitCode> {
    match action {
        Some(PrefsAction::Clear) => {
            for key in PreferenceKey::ALL {
                preferences.remove(key)?;
            }
            println!("Preferences cleared");
        }
        None => {
            for key in PreferenceKey::ALL {
                let value = preferences.get(key);
                println!(
                    "{} = {}",
                    key.as_str(),
                    value.as_deref().unwrap_or("(not set)")
                );
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Message for the terminal; the full chain goes to the debug log.
fn describe(err: &anyhow::Error) -> String {
    if let Some(app) = err.downcast_ref::<AppError>() {
        return app.user_message();
    }
    if let Some(config) = err.downcast_ref::<ConfigError>() {
        return format!("{} ({})", config.user_message(), config);
    }
    format!("{:#}", err)
}
