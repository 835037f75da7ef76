use bootstrap::{BootstrapCommand, MarkerOutcome, UserOutcome};
use clap::{Parser, ValueEnum};
use db_infra::mongo::BootstrapSettings;
use db_infra::{orchestrate_bootstrap, BootstrapOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "bootstrap=info,db_infra=info,mongodb=warn";

#[derive(Clone, Copy, ValueEnum)]
enum Command {
    Up,
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum Marker {
    Skip,
    Seed,
}

impl Marker {
    fn as_str(self) -> &'static str {
        match self {
            Marker::Skip => "skip",
            Marker::Seed => "seed",
        }
    }
}

#[derive(Parser)]
#[command(name = "bootstrap")]
#[command(about = "Create the application user and version marker in a MongoDB database")]
struct Args {
    /// Command to run
    #[arg(value_enum, default_value = "up")]
    command: Command,

    /// Override BOOTSTRAP_MARKER
    #[arg(long, value_enum)]
    marker: Option<Marker>,

    /// Override BOOTSTRAP_MARKER_VERSION
    #[arg(long)]
    marker_version: Option<String>,

    /// Skip logging in as the application user afterwards
    #[arg(long)]
    no_verify: bool,
}

#[tokio::main]
async fn main() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_env_filter(filter)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version also land here; let clap pick the exit code.
            e.exit();
        }
    };

    let mut settings = match BootstrapSettings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    if args.marker.is_some() || args.marker_version.is_some() {
        let mode = match args.marker {
            Some(marker) => marker.as_str(),
            None => Marker::Seed.as_str(),
        };
        if let Err(e) = settings.override_marker(mode, args.marker_version) {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    }
    if args.no_verify {
        settings.verify_login = false;
    }

    let command = match args.command {
        Command::Up => BootstrapCommand::Up,
        Command::Status => BootstrapCommand::Status,
    };

    match orchestrate_bootstrap(&settings, command).await {
        Ok(BootstrapOutcome::Bootstrapped(report)) => {
            let user = match report.user {
                UserOutcome::Created => "created",
                UserOutcome::AlreadyPresent => "already present",
            };
            let marker = match report.marker {
                MarkerOutcome::Skipped => "skipped",
                MarkerOutcome::Seeded => "seeded",
                MarkerOutcome::AlreadyPresent => "already present",
            };
            info!(
                "bootstrap=done target_db={} username={} user={:?} marker={:?}",
                settings.target_database, settings.user.username, user, marker
            );
        }
        Ok(BootstrapOutcome::Status(report)) => {
            println!("server version: {}", report.server_version);
            println!("database:       {}", settings.target_database);
            println!("collections:    {}", report.collections.join(", "));
            match report.marker {
                Some(marker) => println!(
                    "marker:         version={} at={} migrated={}",
                    marker.version, marker.at, marker.migrated
                ),
                None => println!("marker:         none"),
            }
        }
        Err(e) => {
            eprintln!(
                "Bootstrap failed (target_db={} username={}): {e}",
                settings.target_database, settings.user.username
            );
            std::process::exit(1);
        }
    }
}
