use std::{fs::OpenOptions, path::{Path, PathBuf}, sync::Arc};

use anyhow::{anyhow, bail, Context};
use chrono::Local;
use clap::{Parser, Subcommand};
use pace_tracker_data_management::{
    providers::{FixedPosition, NominatimGeocoding, OsrmRouting, StraightLineRouting},
    Configuration, HistoryManager,
};
use pace_tracker_lib::{
    ArrivalSpec, Coordinate, Destination, GeocodingProvider, Place, RoutingProvider, TripSession, TripSnapshot,
    TripStatus, TripUpdate, UpdateKind,
};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "PaceCLI")]
#[command(about = "Tells you how fast to drive to arrive on time", long_about = None)]
struct Cli {
    /// Config file to use instead of data/pace_tracker.conf
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Track a trip until arrival or Ctrl-C
    Track {
        /// Destination to search for
        destination: Option<String>,
        /// Destination as "lat,lon"
        #[arg(long, conflicts_with = "destination", allow_hyphen_values = true)]
        to_coord: Option<String>,
        /// Arrival time, e.g. "5:30 PM" or "17:30"
        #[arg(long)]
        at: String,
        /// Current position as "lat,lon"
        #[arg(long, allow_hyphen_values = true)]
        from: String,
        /// Straight-line distances, destinations from the history only
        #[arg(long)]
        offline: bool,
    },
    /// List recent destinations
    Recent,
    /// List saved destinations
    Saved,
    /// Save a destination under a name
    Save {
        name: String,
        #[arg(allow_hyphen_values = true)]
        coordinate: String,
    },
    /// Remove a saved destination
    Unsave { name: String },
    /// Remove a destination from the recent list
    Forget { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let config = match &cli.config {
        Some(path) => Configuration::load(path).await?,
        None => Configuration::start_or_default().await?,
    };
    let history = HistoryManager::from_config(&config)
        .await
        .context("Could not open the destination history, set history_file in the config")?;

    match cli.command {
        Commands::Track {
            destination,
            to_coord,
            at,
            from,
            offline,
        } => {
            let destination = match (destination, to_coord) {
                (_, Some(coordinate)) => Target::Coordinate(parse_coordinate(&coordinate)?),
                (Some(text), None) => Target::Text(text),
                (None, None) => bail!("Give a destination or --to-coord"),
            };
            track(config, history, destination, &at, &from, offline).await?;
        }
        Commands::Recent => print_places(&history.recent().await),
        Commands::Saved => print_places(&history.saved().await),
        Commands::Save { name, coordinate } => {
            let coordinate = parse_coordinate(&coordinate)?;
            if history.save(Place::new(name.clone(), coordinate)).await? {
                println!("Saved {}", name);
            } else {
                println!("Updated {}", name);
            }
        }
        Commands::Unsave { name } => {
            if !history.unsave(&name).await? {
                println!("No saved destination named {:?}", name);
            }
        }
        Commands::Forget { name } => {
            if !history.forget(&name).await? {
                println!("No recent destination named {:?}", name);
            }
        }
    }

    Ok(())
}

enum Target {
    Text(String),
    Coordinate(Coordinate),
}

async fn track(
    config: Configuration,
    history: HistoryManager,
    target: Target,
    at: &str,
    from: &str,
    offline: bool,
) -> anyhow::Result<()> {
    let arrival = ArrivalSpec::parse(at)?;
    let origin = parse_coordinate(from)?;

    let (routing, geocoding): (Arc<dyn RoutingProvider>, Arc<dyn GeocodingProvider>) = if offline {
        (Arc::new(StraightLineRouting), Arc::new(history.clone()))
    } else {
        (
            Arc::new(OsrmRouting::from_config(&config)?),
            Arc::new(NominatimGeocoding::from_config(&config)?),
        )
    };
    let session = TripSession::new(Arc::new(FixedPosition(origin)), routing, geocoding, config.engine.clone());

    let destination = match target {
        Target::Coordinate(coordinate) => {
            let name = session.geocoder().display_name(coordinate).await;
            Destination::Place(Place::new(name, coordinate))
        }
        // A name from the history skips the online search
        Target::Text(text) => match history
            .search(&text)
            .await?
            .into_iter()
            .find(|place| place.name.eq_ignore_ascii_case(text.trim()))
        {
            Some(place) => Destination::Place(place),
            None => Destination::Text(text),
        },
    };

    let mut updates = session.subscribe();
    let snapshot = session.start(destination, arrival).await?;
    print_snapshot(&snapshot);
    if let Some(place) = snapshot.destination {
        history.remember(place).await?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, stopping trip");
                session.stop();
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    print_update(&update);
                    if update.kind == UpdateKind::Status(TripStatus::Idle) {
                        break;
                    }
                }
                Err(RecvError::Lagged(missed)) => tracing::warn!("Missed {} updates", missed),
                Err(RecvError::Closed) => break,
            }
        }
    }

    match session.last_outcome() {
        Some(TripStatus::Completed) => println!("Arrival time reached"),
        Some(outcome) => println!("Trip ended: {:?}", outcome),
        None => {}
    }
    Ok(())
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file = log_file
        .map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))
        })
        .transpose()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("{}=debug,pace_tracker_lib=info,pace_tracker_data_management=info", env!("CARGO_CRATE_NAME")).into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file.map(|file| tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file)))
        .init();

    Ok(())
}

fn parse_coordinate(text: &str) -> anyhow::Result<Coordinate> {
    Coordinate::parse(text).ok_or_else(|| anyhow!("Expected \"lat,lon\", got {:?}", text))
}

fn print_places(places: &[Place]) {
    if places.is_empty() {
        println!("-");
    }
    for place in places {
        println!("{}\t{}", place.coordinate, place.name);
    }
}

fn print_snapshot(snapshot: &TripSnapshot) {
    if let (Some(destination), Some(target)) = (&snapshot.destination, snapshot.target) {
        println!(
            "Heading to {} by {}",
            destination.name,
            target.with_timezone(&Local).format("%d/%m/%Y %H:%M:%S")
        );
    }
    println!(
        "{:.1} km to go, {:.1} km/h needed, {}",
        snapshot.last_distance_km,
        snapshot.required_speed_kmh,
        format_remaining(snapshot.remaining_seconds)
    );
    if let Some(route) = &snapshot.route {
        tracing::debug!("Route has {} points", route.0.len());
        if let (Some(first), Some(last)) = (route.points().next(), route.points().last()) {
            println!(
                "Route from {:.5}, {:.5} to {:.5}, {:.5}",
                first.y(),
                first.x(),
                last.y(),
                last.x()
            );
        }
    }
}

fn print_update(update: &TripUpdate) {
    let time = update.at.with_timezone(&Local).format("%H:%M:%S");
    match &update.kind {
        UpdateKind::Speed(speed) => println!("{}\t{:.1} km/h needed", time, speed),
        UpdateKind::Distance(distance) => println!("{}\t{:.2} km to go", time, distance),
        UpdateKind::Position(position) => println!("{}\tat {}", time, position),
        // Every second is too chatty, so only the minutes and the last few seconds
        UpdateKind::RemainingTime(seconds) if *seconds < 10.0 || *seconds as u64 % 60 == 0 => {
            println!("{}\t{} left", time, format_remaining(*seconds))
        }
        UpdateKind::RemainingTime(_) => {}
        UpdateKind::NextRefresh(interval) => tracing::debug!("Next refresh in {:?}", interval),
        UpdateKind::Status(status) => println!("{}\t{:?}", time, status),
    }
}

fn format_remaining(seconds: f64) -> String {
    let total = seconds.max(0.0).round() as u64;
    format!("{}:{:02}:{:02}", total / 3600, total / 60 % 60, total % 60)
}
