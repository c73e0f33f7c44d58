//! CLI entry point for the segment pipeline.
//!
//! Provides subcommands for processing trips from the source database or a
//! CSV export, listing the registered rules, and clearing the store.

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use segment_pipeline::{
    config::PipelineConfig,
    fetch::BasicClient,
    infra::{
        csv_source::CsvSource,
        datafordeler::ElevationClient,
        memory::InMemoryStorage,
        overpass::OverpassClient,
        postgres::{self, PgSource, PgStorage},
        valhalla::ValhallaClient,
    },
    output::append_record,
    pipeline::Pipeline,
    rules::Registry,
    services::{ElevationService, MeasurementSource, Storage},
    stats::TripStats,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "segment_pipeline")]
#[command(about = "Turns vehicle sensor trips into per-segment road statistics", long_about = None)]
struct Cli {
    /// CSV file to append per-trip stats to
    #[arg(long, global = true, default_value = "trip_stats.csv")]
    stats: String,

    /// Keep results in memory instead of writing them to the store
    #[arg(long, global = true, default_value_t = false)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process trips read from the source database
    Process {
        /// Trip ids, processed one after the other
        #[arg(value_name = "TRIP", required = true)]
        trips: Vec<String>,
    },
    /// Process trips read from a CSV export of the source database
    ProcessCsv {
        /// CSV file with MeasurementId, T, lat, lon, message, FK_Trip,
        /// Created_Date and Updated_Date columns
        #[arg(short, long)]
        file: String,

        /// Only process this trip (default: every trip in the file)
        #[arg(short, long)]
        trip: Option<String>,
    },
    /// List the registered computed-value types and aggregation methods
    Rules,
    /// Delete every row the pipeline writes
    ClearStore,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/segment_pipeline.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("segment_pipeline.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;
    let registry = Registry::builtin();

    match &cli.command {
        Commands::Process { trips } => {
            let pool = postgres::connect(config.source_database_url()?).await?;
            let source = PgSource::new(pool);
            process_trips(&config, &cli, &registry, &source, trips).await?;
        }
        Commands::ProcessCsv { file, trip } => {
            let source = CsvSource::new(file);
            let trips = match trip {
                Some(trip) => vec![trip.clone()],
                None => source.trips()?,
            };
            info!(file = %file, trips = trips.len(), "Trips found");
            process_trips(&config, &cli, &registry, &source, &trips).await?;
        }
        Commands::Rules => {
            for cv_type in registry.computed_value_types() {
                info!(
                    id = cv_type.id,
                    name = %cv_type.name,
                    unit = %cv_type.unit,
                    aggregations = ?cv_type.aggregations,
                    "Computed value type"
                );
            }
            for method in registry.aggregation_methods() {
                info!(id = method.id, name = %method.name, "Aggregation method");
            }
            for rule in registry.property_rules() {
                info!(name = rule.name(), "Segment property");
            }
        }
        Commands::ClearStore => {
            if cli.dry_run {
                warn!("Dry run, nothing to clear");
            } else {
                let pool = postgres::connect(config.database_url()?).await?;
                PgStorage::new(pool).delete_all().await?;
                info!("Store cleared");
            }
        }
    }

    Ok(())
}

/// Runs the pipeline for each trip in turn, appending one stats row per trip.
/// A failed trip does not stop the others, but makes the process fail.
#[tracing::instrument(skip_all, fields(trips = trips.len(), dry_run = cli.dry_run))]
async fn process_trips(
    config: &PipelineConfig,
    cli: &Cli,
    registry: &Registry,
    source: &dyn MeasurementSource,
    trips: &[String],
) -> Result<()> {
    let storage: Box<dyn Storage> = if cli.dry_run {
        info!("Dry run, results stay in memory");
        Box::new(InMemoryStorage::new())
    } else {
        Box::new(PgStorage::new(postgres::connect(config.database_url()?).await?))
    };

    let elevation: Box<dyn ElevationService> =
        match (&config.elevation_user, &config.elevation_password) {
            (Some(user), Some(password)) => Box::new(ElevationClient::with_credentials(
                &config.elevation_url,
                user,
                password,
            )),
            _ => {
                warn!("ELEVATION_USER or ELEVATION_PASSWORD not set, sending unauthenticated requests");
                Box::new(ElevationClient::new(BasicClient::new(), &config.elevation_url))
            }
        };

    let matcher = ValhallaClient::new(&config.map_matching_url, config.search_radius);
    let geometry = OverpassClient::new(&config.overpass_url);

    let pipeline = Pipeline {
        source,
        matcher: &matcher,
        geometry: &geometry,
        elevation: elevation.as_ref(),
        storage: storage.as_ref(),
        registry,
        chunk_size: config.chunk_size,
    };

    let mut failed = 0;
    for trip in trips {
        let stats = match pipeline.run_trip(trip).await {
            Ok(stats) => {
                info!(
                    trip = %trip,
                    measurements = stats.measurements,
                    new_segments = stats.new_segments,
                    inserted_aggregates = stats.inserted_aggregates,
                    updated_aggregates = stats.updated_aggregates,
                    "Trip processed"
                );
                stats
            }
            Err(e) => {
                error!(trip = %trip, error = ?e, "Trip failed");
                failed += 1;
                TripStats::from_error(trip, "run_error", &format!("{e:#}"))
            }
        };
        if let Err(e) = append_record(&cli.stats, &stats) {
            error!(error = %e, path = %cli.stats, "Failed to write trip stats");
        }
    }

    if failed > 0 {
        bail!("{failed} of {} trips failed", trips.len());
    }
    Ok(())
}
