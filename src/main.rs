use ghpr::app::{AppConfig, AppState, ModelOpts, POLL_INTERVAL_SECS};
use ghpr::cli::{self, Cli};
use ghpr::controller::Command;
use ghpr::events::{AppEvent, EventHandler};
use ghpr::gh::executor::{self, GhClient};
use ghpr::gh::poller::{self, Poller};
use ghpr::logging;
use ghpr::traits::HostClient;
use ghpr::tui::{self, logs_pane};

use clap::Parser;
use color_eyre::eyre::Result;
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen, SetTitle};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Spawns `fut` and reports a panic inside it as an `AppEvent::Error`.
fn spawn_monitored(
    tx: mpsc::UnboundedSender<AppEvent>,
    label: &'static str,
    fut: impl Future<Output = ()> + Send + 'static,
) {
    tokio::spawn(async move {
        let handle = tokio::spawn(fut);
        if let Err(join_err) = handle.await {
            let msg = if join_err.is_panic() {
                match join_err.into_panic().downcast::<String>() {
                    Ok(s) => *s,
                    Err(payload) => match payload.downcast::<&str>() {
                        Ok(s) => s.to_string(),
                        Err(_) => "unknown panic".to_string(),
                    },
                }
            } else {
                "task cancelled".to_string()
            };
            tracing::error!("{label} panicked: {msg}");
            if tx
                .send(AppEvent::Error(format!("{label} crashed: {msg}")))
                .is_err()
            {
                tracing::warn!("{label}: channel closed while reporting panic");
            }
        }
    });
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    logging::init(args.debug)?;

    let target = cli::resolve_target(&args.target, args.repo.as_deref()).unwrap_or_else(|e| fail(e));

    if let Err(e) = executor::check_gh_available().await {
        fail(e);
    }
    let repo = match target.repo {
        Some(repo) => repo,
        None => match executor::detect_repo().await {
            Ok(repo) => repo,
            Err(e) => fail(e),
        },
    };
    if let Err(e) = cli::validate_repo_format(&repo) {
        fail(e);
    }
    tracing::info!(%repo, pr = target.number, flat = args.flat, "starting");

    let mut state = AppState::new(AppConfig {
        repo: repo.clone(),
        pr_number: target.number,
        poll_interval: POLL_INTERVAL_SECS,
        opts: ModelOpts { flat: args.flat },
    });

    // Setup terminal with panic hook
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        if let Err(e) = terminal::disable_raw_mode() {
            eprintln!("Failed to disable raw mode during panic: {e}");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, SetTitle("")) {
            eprintln!("Failed to leave alternate screen during panic: {e}");
        }
        original_hook(panic_info);
    }));

    terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        SetTitle(format!("{repo} #{}", target.number))
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let client: Arc<dyn HostClient> = Arc::new(GhClient::new(repo));

    let events = EventHandler::new(Duration::from_millis(100));
    let tx = events.sender();

    // Manual refresh wakes the poller early
    let (refresh_tx, refresh_rx) = watch::channel(());
    let poller = Poller::new(
        client.clone(),
        target.number,
        POLL_INTERVAL_SECS,
        tx.clone(),
        refresh_rx,
    );
    let poller_handle = tokio::spawn(poller.run());

    let result = run_app(
        &mut terminal,
        &mut state,
        events,
        &tx,
        &refresh_tx,
        poller_handle,
        client,
    )
    .await;

    // Restore terminal
    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen, SetTitle(""))?;
    terminal.show_cursor()?;

    if let Some(fatal) = &state.fatal_error {
        eprintln!("Error: {fatal}");
    }
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    mut events: EventHandler,
    tx: &mpsc::UnboundedSender<AppEvent>,
    refresh_tx: &watch::Sender<()>,
    poller_handle: JoinHandle<()>,
    client: Arc<dyn HostClient>,
) -> Result<()> {
    loop {
        let size = terminal.size()?;
        let areas = tui::render::pane_areas(
            Rect::new(0, 0, size.width, size.height),
            state.config.opts.flat,
        );
        let viewport = areas.logs_viewport();
        if viewport.0 != state.logs_viewport.0 {
            state.rendered_logs.clear();
        }
        state.logs_viewport = viewport;
        logs_pane::prepare(state);

        terminal.draw(|f| tui::render::render(f, state))?;

        let Some(event) = events.next().await else {
            break;
        };
        for command in state.apply(event) {
            dispatch(command, &client, tx, refresh_tx, &poller_handle);
        }

        if state.should_quit {
            break;
        }
    }

    poller_handle.abort();
    events.stop();
    Ok(())
}

fn dispatch(
    command: Command,
    client: &Arc<dyn HostClient>,
    tx: &mpsc::UnboundedSender<AppEvent>,
    refresh_tx: &watch::Sender<()>,
    poller_handle: &JoinHandle<()>,
) {
    tracing::debug!(?command, "dispatch");
    match command {
        Command::Refresh => {
            if refresh_tx.send(()).is_err() {
                tracing::warn!("refresh requested but the poller has stopped");
            }
        }
        Command::StopPolling => poller_handle.abort(),
        Command::FetchRunSteps { run_id } => {
            let (client, tx2) = (client.clone(), tx.clone());
            spawn_monitored(tx.clone(), "fetch_run_steps", async move {
                poller::fetch_run_steps(&*client, run_id, &tx2).await;
            });
        }
        Command::FetchJobLogs { job_id } => {
            let (client, tx2) = (client.clone(), tx.clone());
            spawn_monitored(tx.clone(), "fetch_job_logs", async move {
                poller::fetch_job_logs(&*client, job_id, &tx2).await;
            });
        }
        Command::FetchCheckOutput { job_id } => {
            let (client, tx2) = (client.clone(), tx.clone());
            spawn_monitored(tx.clone(), "fetch_check_output", async move {
                poller::fetch_check_output(&*client, job_id, &tx2).await;
            });
        }
        Command::RerunJob { job_id, kind } => {
            let (client, tx2) = (client.clone(), tx.clone());
            spawn_monitored(tx.clone(), "rerun_job", async move {
                poller::rerun_job(&*client, job_id, kind, &tx2).await;
            });
        }
        Command::RerunRun { run_id, native } => {
            let (client, tx2) = (client.clone(), tx.clone());
            spawn_monitored(tx.clone(), "rerun_run", async move {
                poller::rerun_run(&*client, run_id, native, &tx2).await;
            });
        }
        Command::OpenUrl(url) => {
            if let Err(e) = client.open_in_browser(&url) {
                tracing::warn!(%url, error = %e, "failed to open browser");
                if tx.send(AppEvent::Error(e.to_string())).is_err() {
                    tracing::warn!("channel closed while reporting browser error");
                }
            }
        }
    }
}
