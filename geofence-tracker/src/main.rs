/*!
Fleet geofence tracking demo: drives the detection pipeline with a synthetic
vehicle fleet and prints or logs the resulting violations
*/

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Arg, ArgAction, Command};
use tokio::sync::RwLock;
use tracing::{error, info};

use geofence_tracker::{
    Coordinate, EventBus, EventSubscriber, Geofence, GeofenceRegistry, GeofenceShape,
    GeofenceTracker, SyntheticFeed, TrackerConfig, TrackerEvent,
};

/// Prints violations (and, verbosely, position updates) to the terminal
struct TerminalSubscriber {
    verbose: bool,
}

#[async_trait]
impl EventSubscriber for TerminalSubscriber {
    fn name(&self) -> &'static str {
        "terminal"
    }

    async fn handle_event(
        &mut self,
        event: &TrackerEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        match event {
            TrackerEvent::PositionUpdated(report) => {
                if self.verbose {
                    println!(
                        "📍 {} at {:.5}, {:.5} ({:.1} km/h)",
                        report.entity_id,
                        report.coordinate.latitude,
                        report.coordinate.longitude,
                        report.speed_kmh
                    );
                }
            }
            TrackerEvent::ViolationDetected(violation) => {
                println!("🚨 [{:?}] {}", violation.severity, violation.description);
            }
        }
        Ok(())
    }
}

/// Appends every violation as one JSON line to a log file
struct JsonLogSubscriber {
    path: PathBuf,
    file: Option<std::fs::File>,
}

impl JsonLogSubscriber {
    fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }
}

#[async_trait]
impl EventSubscriber for JsonLogSubscriber {
    fn name(&self) -> &'static str {
        "json-log"
    }

    async fn handle_event(
        &mut self,
        event: &TrackerEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let TrackerEvent::ViolationDetected(violation) = event else {
            return Ok(());
        };
        if self.file.is_none() {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            self.file = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?,
            );
        }
        if let Some(ref mut file) = self.file {
            writeln!(file, "{}", serde_json::to_string(violation)?)?;
            file.flush()?;
        }
        Ok(())
    }
}

/// Demo fences around the synthetic fleet's default starting area.
fn default_fences() -> Vec<Geofence> {
    vec![
        Geofence {
            id: "depot".to_string(),
            name: "Central Depot".to_string(),
            shape: GeofenceShape::Circle {
                center: Coordinate::new(40.7128, -74.0060),
                radius_m: 1200.0,
            },
            max_speed_kmh: Some(30.0),
            authorized: true,
            active: true,
        },
        Geofence {
            id: "school-zone".to_string(),
            name: "School Zone".to_string(),
            shape: GeofenceShape::Circle {
                center: Coordinate::new(40.7180, -74.0000),
                radius_m: 500.0,
            },
            max_speed_kmh: Some(25.0),
            authorized: true,
            active: true,
        },
        Geofence {
            id: "restricted-yard".to_string(),
            name: "Restricted Yard".to_string(),
            shape: GeofenceShape::Polygon {
                vertices: vec![
                    Coordinate::new(40.7020, -74.0150),
                    Coordinate::new(40.7020, -74.0100),
                    Coordinate::new(40.7060, -74.0100),
                    Coordinate::new(40.7060, -74.0150),
                ],
            },
            max_speed_kmh: None,
            authorized: false,
            active: true,
        },
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let matches = Command::new("Geofence Tracker")
        .version("0.1.0")
        .about("Monitors a vehicle fleet for geofence violations in real-time")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .help("Path to a TOML config file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("entities")
                .short('n')
                .long("entities")
                .help("Number of simulated vehicles")
                .value_name("COUNT"),
        )
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval-ms")
                .help("Tick interval in milliseconds")
                .value_name("MS"),
        )
        .arg(
            Arg::new("fences")
                .short('f')
                .long("fences")
                .help("JSON file with geofence definitions")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .help("Append violations as JSON lines to this file")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print every position update")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut config = match matches.get_one::<String>("config") {
        Some(path) => TrackerConfig::from_file(path).await?,
        None => TrackerConfig::default(),
    };
    if let Some(count) = matches.get_one::<String>("entities") {
        config.synthetic.entity_count = count.parse::<usize>()?;
    }
    if let Some(ms) = matches.get_one::<String>("interval") {
        config.synthetic.interval_ms = ms.parse::<u64>()?;
    }

    let registry = Arc::new(GeofenceRegistry::new());
    let fences: Vec<Geofence> = match matches.get_one::<String>("fences") {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => default_fences(),
    };
    for fence in fences {
        registry.upsert(fence).await?;
    }
    info!("🗺️ registered {} geofences", registry.len().await);

    let bus = Arc::new(RwLock::new(EventBus::new()));
    {
        let mut bus = bus.write().await;
        bus.subscribe(Box::new(TerminalSubscriber {
            verbose: matches.get_flag("verbose"),
        }));
        if let Some(path) = matches.get_one::<String>("output") {
            bus.subscribe(Box::new(JsonLogSubscriber::new(PathBuf::from(path))));
        }
    }

    let feed = SyntheticFeed::new(config.synthetic.clone());
    let mut tracker = GeofenceTracker::new(&config, registry, bus);

    info!(
        "🚀 tracking {} vehicles every {} ms",
        config.synthetic.entity_count, config.synthetic.interval_ms
    );

    tokio::select! {
        result = tracker.run(Box::new(feed)) => {
            if let Err(e) = result {
                error!("tracker error: {e}");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 shutdown");
        }
    }

    Ok(())
}
