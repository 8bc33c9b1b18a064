use anyhow::Context;
use chrono::Utc;
use city_weather::{
    connect_postgres, ensure_schema, CitiesSettings, CitySource, CsvCitySource, FileStore,
    ObservationStore, ObservationsSettings, OpenMeteoClient, PgCitySource, PostgresStore,
    Settings, SyncMode, WeatherSync,
};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Keeps an hourly weather archive for a set of cities in sync with the Open-Meteo archive API."
)]
struct Args {
    /// Settings file, defaults to config/city-weather.toml
    #[arg(short, long, env = "CITY_WEATHER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the full history of cities that have no observations yet
    GapFill,
    /// Re-fetch the days around today for every city and upsert them
    Refresh,
    /// Create the city and weather tables if they are missing
    InitDb,
}

async fn city_source(settings: &Settings) -> anyhow::Result<Box<dyn CitySource>> {
    Ok(match &settings.cities {
        CitiesSettings::Csv { path } => Box::new(CsvCitySource::new(path)),
        CitiesSettings::Postgres { table } => {
            let pool = connect_postgres(settings.database("postgres city source")?).await?;
            Box::new(PgCitySource::new(pool, table)?)
        }
    })
}

async fn observation_store(settings: &Settings) -> anyhow::Result<Box<dyn ObservationStore>> {
    Ok(match &settings.observations {
        ObservationsSettings::File { path, output } => {
            let store = FileStore::new(path)?;
            match output {
                Some(output) => Box::new(store.with_output(output)?),
                None => Box::new(store),
            }
        }
        ObservationsSettings::Postgres { table } => {
            let pool = connect_postgres(settings.database("postgres observation store")?).await?;
            Box::new(PostgresStore::new(pool, table, settings.sync.batch_size)?)
        }
    })
}

async fn sync(settings: Settings, mode: SyncMode) -> anyhow::Result<()> {
    let config = settings.sync_config(mode, Utc::now().date_naive())?;
    let client = OpenMeteoClient::builder()
        .base_url(settings.api.base_url.clone())
        .maybe_api_key(settings.api.api_key.clone())
        .timeout(settings.api.timeout())
        .maybe_cache(settings.api.response_cache()?)
        .build()?;
    let cities = city_source(&settings).await?;
    let store = observation_store(&settings).await?;

    let report = WeatherSync::new(client, config)?
        .run(cities.as_ref(), store.as_ref(), mode)
        .await?;

    if !report.sink.is_complete() {
        warn!(
            "{} of {} batches failed ({} rows), run again to retry",
            report.sink.failed.len(),
            report.sink.batches,
            report.sink.rows_failed()
        );
    }
    Ok(())
}

async fn init_db(settings: Settings) -> anyhow::Result<()> {
    let pool = connect_postgres(settings.database("init-db")?).await?;
    ensure_schema(&pool).await?;
    info!("Database schema is ready");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load(args.config.as_deref()).context("Failed to load settings")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match args.command {
            Command::GapFill => sync(settings, SyncMode::GapFill).await,
            Command::Refresh => sync(settings, SyncMode::Refresh).await,
            Command::InitDb => init_db(settings).await,
        }
    })
}
