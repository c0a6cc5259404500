use crate::backend::HttpBackend;
use crate::config::{resolve_api_base_url, resolve_redirect_uri, ClientConfig, PageOrigin};
use crate::error::{FlowError, FlowResult};
use crate::flows::{self, CallbackParams, SaveOptions};
use crate::model::{Navigation, Screen};
use crate::orchestrator::{ControllerEvent, MountOutcome, RunController, RunOutcome, RunTiming};
use crate::prereq::PrerequisiteStore;
use crate::session::SessionStore;
use crate::storage::{FileStorage, StoragePort};
use crate::text_summary::{
    build_classification_summary, build_success_summary, format_progress, TextSummary,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

type Output = mpsc::UnboundedSender<OutputLine>;

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (Output, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "moodlist",
    version,
    about = "Sort a Spotify playlist into per-mood playlists"
)]
pub struct Cli {
    /// Base URL of the classifier backend
    #[arg(long, env = "MOODLIST_API_BASE_URL", global = true)]
    pub api_base_url: Option<String>,

    /// OAuth redirect URI registered with Spotify
    #[arg(long, env = "MOODLIST_REDIRECT_URI", global = true)]
    pub redirect_uri: Option<String>,

    /// Origin of the hosting page, used when the URLs above are not set
    #[arg(long, env = "MOODLIST_PAGE_ORIGIN", global = true)]
    pub page_origin: Option<String>,

    /// Spotify application client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    /// Client storage file (defaults to the user data directory)
    #[arg(long, global = true)]
    pub storage: Option<PathBuf>,

    /// Per-request timeout; classification requests are unbounded when unset
    #[arg(long, global = true)]
    pub timeout: Option<humantime::Duration>,

    /// Interval between simulated progress steps
    #[arg(long, default_value = "700ms", global = true)]
    pub progress_interval: humantime::Duration,

    /// Percentage points added per progress step
    #[arg(long, default_value_t = 3, global = true)]
    pub progress_step: u8,

    /// Interval between example track rotations
    #[arg(long, default_value = "1800ms", global = true)]
    pub rotate_interval: humantime::Duration,

    /// Pause on the finished run before moving on
    #[arg(long, default_value = "1500ms", global = true)]
    pub completion_delay: humantime::Duration,

    /// Debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print the Spotify login URL
    Login,
    /// Finish login with the redirect URL (or the bare code)
    Callback { url_or_code: String },
    /// Show session and run state
    Status,
    /// Forget the session
    Logout,
    /// Choose the playlist to sort
    Select { playlist_url: String },
    /// Choose the mood categories (space or comma separated)
    Emotions {
        #[arg(required = true, value_delimiter = ',')]
        emotions: Vec<String>,
    },
    /// Classify the selected playlist
    Classify {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the stored classification result
    Results {
        #[arg(long)]
        json: bool,
    },
    /// Create one playlist per category
    Save {
        /// Playlist name override, e.g. --name happy="Good Vibes"
        #[arg(long = "name", value_parser = parse_name_override)]
        names: Vec<(String, String)>,
        /// Make the playlists public
        #[arg(long)]
        public: bool,
        /// Continue without saving
        #[arg(long, conflicts_with_all = ["names", "public"])]
        skip: bool,
    },
    /// Show what was saved
    Summary,
    /// Forget the current run and start over
    Reset,
}

fn parse_name_override(raw: &str) -> Result<(String, String), String> {
    let (emotion, name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected CATEGORY=NAME, got `{raw}`"))?;
    let emotion = emotion.trim().to_lowercase();
    if emotion.is_empty() {
        return Err("category must not be empty".to_string());
    }
    Ok((emotion, name.trim().to_string()))
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> Result<ClientConfig> {
    let page = args
        .page_origin
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(PageOrigin::parse)
        .transpose()
        .context("invalid --page-origin")?;
    Ok(ClientConfig {
        api_base_url: resolve_api_base_url(args.api_base_url.as_deref(), page.as_ref()),
        redirect_uri: resolve_redirect_uri(args.redirect_uri.as_deref(), page.as_ref()),
        client_id: args.client_id.clone().filter(|c| !c.trim().is_empty()),
        storage_path: args.storage.clone(),
        request_timeout: args.timeout.map(Duration::from),
        timing: RunTiming {
            progress_period: Duration::from(args.progress_interval),
            progress_step: args.progress_step,
            rotate_period: Duration::from(args.rotate_interval),
            completion_delay: Duration::from(args.completion_delay),
        },
    })
}

/// Everything a command needs.
struct App {
    config: ClientConfig,
    session: SessionStore,
    prereqs: PrerequisiteStore,
    backend: Arc<HttpBackend>,
    out: Output,
}

impl App {
    fn open(config: ClientConfig, out: Output) -> Result<Self> {
        let path = match config.storage_path.clone() {
            Some(p) => p,
            None => FileStorage::default_path()
                .context("could not determine a data directory; pass --storage")?,
        };
        let storage: Arc<dyn StoragePort> = Arc::new(
            FileStorage::open(&path)
                .with_context(|| format!("failed to open storage {}", path.display()))?,
        );
        let backend = HttpBackend::new(config.api_base_url.clone(), config.request_timeout)
            .context("failed to build HTTP client")?;
        Ok(Self {
            session: SessionStore::with_system_clock(Arc::clone(&storage)),
            prereqs: PrerequisiteStore::new(storage),
            backend: Arc::new(backend),
            config,
            out,
        })
    }

    fn stdout(&self, line: impl Into<String>) {
        let _ = self.out.send(OutputLine::Stdout(line.into()));
    }

    fn stderr(&self, line: impl Into<String>) {
        let _ = self.out.send(OutputLine::Stderr(line.into()));
    }

    fn print(&self, summary: TextSummary) {
        for line in summary.lines {
            self.stdout(line);
        }
    }

    fn next(&self, nav: Navigation) {
        self.stderr(format!("Next: {}", next_step(nav.target())));
    }

    /// Attach the follow-up hint to a flow error.
    fn flow<T>(&self, result: FlowResult<T>) -> Result<T> {
        result.map_err(|e| {
            if let Some(nav) = e.navigation() {
                self.next(nav);
            }
            anyhow::Error::new(e)
        })
    }
}

fn next_step(screen: Screen) -> &'static str {
    match screen {
        Screen::Login => "moodlist login",
        Screen::Callback => "moodlist callback <redirect-url>",
        Screen::Home => "moodlist select <playlist-url>",
        Screen::Emotions => "moodlist emotions <category>...",
        Screen::Classify => "moodlist classify",
        Screen::Save => "moodlist save",
        Screen::Success => "moodlist summary",
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let config = build_config(&args)?;
    let (out_tx, out_handle) = spawn_output_writer();
    let result = match App::open(config, out_tx) {
        Ok(app) => dispatch(&app, args.command).await,
        Err(e) => Err(e),
    };
    // The writer exits once every sender is gone.
    let _ = out_handle.await;
    result
}

async fn dispatch(app: &App, command: Command) -> Result<()> {
    match command {
        Command::Login => {
            let client_id = app
                .config
                .client_id
                .as_deref()
                .context("missing --client-id (or SPOTIFY_CLIENT_ID)")?;
            let url = app.flow(flows::begin_login(
                &app.session,
                client_id,
                &app.config.redirect_uri,
            ))?;
            app.stdout(url.to_string());
            app.stderr("Open the URL above, then pass the redirect URL to:");
            app.next(Navigation::Navigate(Screen::Callback));
        }
        Command::Callback { url_or_code } => {
            let params = app.flow(CallbackParams::parse(&url_or_code))?;
            let nav = app.flow(
                flows::complete_login(
                    app.backend.as_ref(),
                    &app.session,
                    &app.config.redirect_uri,
                    params,
                )
                .await,
            )?;
            app.stderr("Logged in.");
            app.next(nav);
        }
        Command::Status => print_status(app),
        Command::Logout => {
            let nav = flows::logout(&app.session);
            app.stderr("Logged out.");
            app.next(nav);
        }
        Command::Select { playlist_url } => {
            let info = app.flow(
                flows::select_playlist(
                    app.backend.as_ref(),
                    &app.session,
                    &app.prereqs,
                    &playlist_url,
                )
                .await,
            )?;
            app.stdout(format!("Playlist {}: {} songs", info.playlist_id, info.total_songs));
            for item in app.prereqs.example_items() {
                app.stdout(format!("  {item}"));
            }
            app.next(Navigation::Navigate(Screen::Emotions));
        }
        Command::Emotions { emotions } => {
            let nav = app.flow(flows::choose_emotions(&app.session, &app.prereqs, &emotions))?;
            app.stdout(format!("Categories: {}", app.prereqs.emotions().join(", ")));
            app.next(nav);
        }
        Command::Classify { json } => run_classification(app, json).await?,
        Command::Results { json } => {
            let result = app
                .prereqs
                .classification_result()
                .context("no classification results stored; run `moodlist classify` first")?;
            if json {
                app.stdout(serde_json::to_string_pretty(&result)?);
            } else {
                app.print(build_classification_summary(&result));
            }
        }
        Command::Save {
            names,
            public,
            skip,
        } => {
            let nav = if skip {
                flows::skip_save(&app.prereqs)
            } else {
                let options = SaveOptions {
                    names: names.into_iter().collect(),
                    public,
                };
                app.flow(
                    flows::save_playlists(app.backend.as_ref(), &app.session, &app.prereqs, options)
                        .await,
                )?
            };
            app.next(nav);
        }
        Command::Summary => {
            let summary = app.flow(flows::load_summary(&app.session, &app.prereqs))?;
            app.print(build_success_summary(&summary));
        }
        Command::Reset => {
            let nav = flows::start_over(&app.prereqs);
            app.next(nav);
        }
    }
    Ok(())
}

fn print_status(app: &App) {
    let session = app.session.read();
    let state = if app.session.is_valid() {
        "valid"
    } else if session.is_empty() {
        "not logged in"
    } else {
        "expired"
    };
    app.stdout(format!("Session: {state}"));
    if let Some(at) = session.expires_at {
        let at = at.format(&Rfc3339).unwrap_or_else(|_| at.to_string());
        app.stdout(format!("Expires: {at}"));
    }
    app.stdout(format!("Backend: {}", app.backend.base_url()));
    app.stdout(format!(
        "Playlist: {}",
        app.prereqs.playlist_url().as_deref().unwrap_or("-")
    ));
    let emotions = app.prereqs.emotions();
    if !emotions.is_empty() {
        app.stdout(format!("Categories: {}", emotions.join(", ")));
    }
    if let Some(result) = app.prereqs.classification_result() {
        app.stdout(format!(
            "Results: {} songs in {} categories",
            result.total_songs,
            result.grouped_tracks.len()
        ));
    }
}

/// Mount the run controller, stream its progress, and cancel it on Ctrl-C.
async fn run_classification(app: &App, json: bool) -> Result<()> {
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<ControllerEvent>();
    let unmount = CancellationToken::new();

    let ctrl_c = {
        let unmount = unmount.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                unmount.cancel();
            }
        })
    };

    let controller = RunController::new(
        Arc::clone(&app.backend),
        app.session.clone(),
        app.prereqs.clone(),
        app.config.timing,
    );
    let handle = tokio::spawn(async move { controller.run(&evt_tx, unmount).await });

    while let Some(ev) = evt_rx.recv().await {
        match ev {
            ControllerEvent::State(run) => app.stderr(format_progress(&run)),
            ControllerEvent::Navigate(nav) => {
                tracing::debug!(target_screen = nav.target().as_str(), "run navigation");
            }
        }
    }
    ctrl_c.abort();
    let outcome = handle.await.context("classification task failed")?;

    match outcome {
        MountOutcome::Redirected(nav) if nav.target() == Screen::Login => {
            app.flow(Err(FlowError::SessionRequired))
        }
        MountOutcome::Redirected(nav) => app.flow(Err(FlowError::PrerequisiteMissing {
            what: "playlist or categories",
            screen: nav.target(),
        })),
        MountOutcome::Unmounted(_) => Err(anyhow::anyhow!("classification cancelled")),
        MountOutcome::Finished(run) => match run.outcome {
            Some(RunOutcome::Success(result)) => {
                if json {
                    app.stdout(serde_json::to_string_pretty(&*result)?);
                } else {
                    app.print(build_classification_summary(&result));
                }
                app.next(Navigation::Navigate(Screen::Save));
                Ok(())
            }
            Some(RunOutcome::Failure(msg)) => app.flow(Err(FlowError::ClassificationFailure(msg))),
            None => Err(anyhow::anyhow!("classification ended without a result")),
        },
    }
}
