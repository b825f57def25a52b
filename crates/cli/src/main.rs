//! `koma`: command-line front end for the KomaMRI simulation backend.

mod config;
mod render;

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use koma_client::account::{greeting, logout};
use koma_client::api::SimulationRequest;
use koma_client::jobs::{reconstruct, simulate};
use koma_client::plots::{change_map_mode, display_phantom, plot_sequence, PhantomDisplay};
use koma_client::results::ResultsBrowser;
use koma_client::store::PersistentStore;
use koma_client::{KomaApi, Session};
use koma_core::types::ResultId;
use koma_core::view_state::{MapMode, ResultMode, SeqMode, ViewerMode};

use config::ClientConfig;

/// Proton gyromagnetic ratio in Hz/T.
const PROTON_GAMMA_HZ_PER_T: f64 = 42.577_478_518e6;

#[derive(Parser)]
#[command(name = "koma")]
#[command(about = "Submit MRI simulations and browse their results", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a bearer token and user name for later calls
    Login {
        #[arg(long)]
        token: String,
        #[arg(long)]
        username: String,
    },

    /// End the server session and clear local state
    Logout,

    /// Print the greeting for the stored user
    Whoami,

    /// Run a simulation and write the signal plot
    Simulate {
        /// Sequence JSON file
        #[arg(long)]
        sequence: PathBuf,
        /// Scanner JSON file
        #[arg(long)]
        scanner: PathBuf,
        /// Phantom name on the server
        #[arg(long)]
        phantom: Option<String>,
    },

    /// Reconstruct a finished simulation (default: the last one)
    Reconstruct {
        #[arg(long)]
        job_id: Option<String>,
    },

    /// Render the sequence diagram and k-space trajectory
    PlotSequence {
        #[arg(long)]
        sequence: PathBuf,
        #[arg(long)]
        scanner: PathBuf,
    },

    /// Load a phantom: 3-D plot plus orthogonal slices
    Phantom {
        /// Phantom name, e.g. `brain`
        name: String,
    },

    /// Load a phantom and cut an oblique slice for a gradient and
    /// frequency offset
    Slice {
        name: String,
        /// Gradient direction, e.g. `0,0,10e-3`
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        gradient: Vec<f64>,
        /// Frequency offset in Hz
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        delta_f: f64,
        /// Gyromagnetic ratio in Hz/T
        #[arg(long, default_value_t = PROTON_GAMMA_HZ_PER_T)]
        gamma: f64,
    },

    /// Stored results
    Results {
        #[command(subcommand)]
        action: ResultsCommands,
    },

    /// Show or change a persisted display mode
    Mode {
        #[command(subcommand)]
        action: Option<ModeCommands>,
    },
}

#[derive(Subcommand)]
enum ResultsCommands {
    /// List stored results
    List,
    /// Download a result archive
    Download {
        id: ResultId,
        /// Destination file or directory (default: output directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Delete a result
    Delete { id: ResultId },
}

#[derive(Subcommand)]
enum ModeCommands {
    /// `slices` or `3d`
    Viewer {
        #[arg(value_parser = ViewerMode::from_str)]
        mode: ViewerMode,
    },
    /// `PD`, `T1`, `T2`, `T2s` or `dw`; reloads the last displayed
    /// phantom and rewrites its views
    Map {
        #[arg(value_parser = MapMode::from_str)]
        mode: MapMode,
    },
    /// `signal`, `image` or `kspace`
    Result {
        #[arg(value_parser = ResultMode::from_str)]
        mode: ResultMode,
    },
    /// `diagram` or `kspace`
    Seq {
        #[arg(value_parser = SeqMode::from_str)]
        mode: SeqMode,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "koma=info,koma_client=info,koma_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // --- Configuration ---
    let config = ClientConfig::from_env()?;
    tracing::debug!(base_url = %config.base_url, state_file = %config.state_file.display(), "Loaded client configuration");

    let store = PersistentStore::open(&config.state_file)
        .with_context(|| format!("opening {}", config.state_file.display()))?;
    let mut session = Session::open(store, config.viewport);

    let token = config
        .token
        .clone()
        .or_else(|| session.token().map(str::to_string));
    let api = KomaApi::new(&config.base_url)?.with_token(token);

    // --- Cancellation ---
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping local polling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Commands::Login { token, username } => {
            session.set_token(&token)?;
            session.set_username(&username)?;
            println!("{}", greeting(&session));
        }
        Commands::Logout => {
            logout(&api, &mut session).await?;
            println!("Logged out");
        }
        Commands::Whoami => println!("{}", greeting(&session)),
        Commands::Simulate {
            sequence,
            scanner,
            phantom,
        } => {
            let request = SimulationRequest {
                sequence: read_json(&sequence)?,
                scanner: read_json(&scanner)?,
                phantom,
            };
            let job = simulate(&api, &mut session, &request, config.poll_config(), &cancel).await?;
            if let Some(id) = job.id() {
                println!("Job {id} finished");
            }
            print_written(render::write_surfaces(&session.panel, &config.output_dir)?);
        }
        Commands::Reconstruct { job_id } => {
            reconstruct(
                &api,
                &mut session,
                job_id.as_deref(),
                config.poll_config(),
                &cancel,
            )
            .await?;
            print_written(render::write_surfaces(&session.panel, &config.output_dir)?);
        }
        Commands::PlotSequence { sequence, scanner } => {
            plot_sequence(
                &api,
                &mut session,
                &read_json(&scanner)?,
                &read_json(&sequence)?,
            )
            .await?;
            print_written(render::write_surfaces(&session.panel, &config.output_dir)?);
        }
        Commands::Phantom { name } => {
            show_phantom(&api, &mut session, &name, &config.output_dir).await?;
        }
        Commands::Slice {
            name,
            gradient,
            delta_f,
            gamma,
        } => {
            let [gx, gy, gz] = gradient[..] else {
                anyhow::bail!("--gradient takes three comma-separated components");
            };
            let shown = display_phantom(&api, &mut session, &name).await;
            anyhow::ensure!(shown.volume_loaded, "phantom volume '{name}' could not be loaded");
            let plane = session.set_normal_plane([gx, gy, gz], delta_f, gamma)?;
            println!(
                "Plane origin {:?} mm, normal {:?}",
                plane.origin, plane.normal
            );
            if let Some(viewer) = session.viewer() {
                print_written(render::write_slices(viewer, &config.output_dir)?);
            }
        }
        Commands::Results { action } => {
            let mut browser = ResultsBrowser::new();
            match action {
                ResultsCommands::List => {
                    browser.load(&api).await?;
                    for line in browser.lines() {
                        println!("{line}");
                    }
                }
                ResultsCommands::Download { id, output } => {
                    let dest = output.unwrap_or_else(|| config.output_dir.clone());
                    if output_is_dir(&dest) {
                        std::fs::create_dir_all(&dest)?;
                    }
                    let path = browser.download(&api, id, &dest).await?;
                    println!("{}", path.display());
                }
                ResultsCommands::Delete { id } => {
                    let outcome = browser.delete(&api, id).await;
                    if let Some(status) = browser.status() {
                        println!("{status}");
                    }
                    outcome?;
                    for line in browser.lines() {
                        println!("{line}");
                    }
                }
            }
        }
        Commands::Mode { action } => match action {
            None => {
                println!("viewer: {}", session.viewer_mode());
                println!("map:    {}", session.map_mode());
                println!("result: {}", session.result_mode());
                println!("seq:    {}", session.seq_mode());
            }
            Some(ModeCommands::Viewer { mode }) => {
                session.set_viewer_mode(mode)?;
            }
            Some(ModeCommands::Map { mode }) => {
                if let Some(shown) = change_map_mode(&api, &mut session, mode).await? {
                    write_phantom(&session, &shown, &config.output_dir)?;
                }
            }
            Some(ModeCommands::Result { mode }) => {
                session.set_result_mode(mode)?;
            }
            Some(ModeCommands::Seq { mode }) => {
                session.set_seq_mode(mode)?;
            }
        },
    }

    if let Some(error) = &session.panel.error_text {
        eprintln!("{error}");
    }
    Ok(())
}

async fn show_phantom(
    api: &KomaApi,
    session: &mut Session,
    name: &str,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let shown = display_phantom(api, session, name).await;
    write_phantom(session, &shown, output_dir)
}

fn write_phantom(session: &Session, shown: &PhantomDisplay, output_dir: &Path) -> anyhow::Result<()> {
    let name = session.current_phantom().unwrap_or_default();
    anyhow::ensure!(
        shown.plot_loaded || shown.volume_loaded,
        "phantom '{name}' could not be loaded"
    );
    print_written(render::write_surfaces(&session.panel, output_dir)?);
    if session.panel.slices_visible {
        if let Some(viewer) = session.viewer() {
            print_written(render::write_slices(viewer, output_dir)?);
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// A destination without an extension is treated as a directory.
fn output_is_dir(path: &Path) -> bool {
    path.is_dir() || path.extension().is_none()
}

fn print_written(paths: Vec<PathBuf>) {
    for path in paths {
        println!("{}", path.display());
    }
}
