mod app;
mod bridge;
mod cli;
mod cluster;
mod guard;
mod input;
mod kinds;
mod model;
mod poll;
mod session;
mod ui;
mod worker;

use anyhow::{Context, Result};
use app::{App, AppCommand};
use bridge::TuiTerminal;
use clap::Parser;
use cli::CliArgs;
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use guard::DeletionStore;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use session::SharedSession;
use std::io;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(&args.log_filter)?;

    let cell = session::bootstrap(args.namespace.clone()).await?;
    let deletions = DeletionStore::for_process()?;
    debug!("deletion backups go to {}", deletions.dir().display());

    let mut app = App::new(
        bridge::oc_binary(&args.oc_bin),
        cell.session.server.clone(),
        cell.session.username.clone(),
        cell.session.namespace.clone(),
    );
    let shared: SharedSession = Arc::new(RwLock::new(cell));

    let code = run(&mut app, shared, deletions, args.refresh_ms.max(250)).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn init_tracing(level_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level_filter)
        .or_else(|_| EnvFilter::try_new("info"))
        .context("failed to initialize tracing filter")?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::sink)
        .try_init();

    Ok(())
}

async fn run(
    app: &mut App,
    shared: SharedSession,
    deletions: DeletionStore,
    refresh_ms: u64,
) -> Result<i32> {
    let mut terminal = init_terminal()?;
    let run_result = run_loop(&mut terminal, app, shared, deletions, refresh_ms).await;
    let restore_result = restore_terminal(&mut terminal);

    // The terminal is fully reset before the process exits, fatal or not.
    match (run_result, restore_result) {
        (Err(run_error), Err(restore_error)) => Err(anyhow::anyhow!(
            "{run_error:#}\nterminal restore error: {restore_error:#}"
        )),
        (Err(error), _) => Err(error),
        (_, Err(error)) => Err(error),
        (Ok(code), Ok(())) => Ok(code),
    }
}

fn init_terminal() -> Result<TuiTerminal> {
    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;
    terminal.clear().context("failed to clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut TuiTerminal) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to show cursor")?;
    Ok(())
}

async fn run_loop(
    terminal: &mut TuiTerminal,
    app: &mut App,
    shared: SharedSession,
    deletions: DeletionStore,
    refresh_ms: u64,
) -> Result<i32> {
    let (job_tx, job_rx) = mpsc::unbounded_channel::<worker::Job>();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<worker::WorkerEvent>();
    let worker_task = worker::spawn(shared.clone(), deletions, job_rx, event_tx);

    let mut reader = EventStream::new();
    let mut ticker = interval(Duration::from_millis(refresh_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let exit_code = loop {
        terminal
            .draw(|frame| ui::render(frame, app))
            .context("failed to render terminal frame")?;

        if !app.running() {
            break 0;
        }

        tokio::select! {
            maybe_event = reader.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        if let Some(action) = input::map_key(app.mode(), key) {
                            debug!("action={action:?}");
                            let command = app.apply_action(action);
                            if let Some(code) =
                                execute_command(terminal, app, &job_tx, command).await?
                            {
                                break code;
                            }
                        }
                    }
                    Some(Ok(Event::Resize(_, _))) => {}
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        app.set_status(format!("terminal event error: {error}"));
                    }
                    None => {
                        app.set_status("terminal event stream closed");
                        break 0;
                    }
                }
            }
            _ = ticker.tick() => {
                if let Some(job) = app.on_tick() {
                    let _ = job_tx.send(job);
                }
            }
            maybe_event = event_rx.recv() => {
                let Some(event) = maybe_event else {
                    break 0;
                };
                // A completed login replaced the session cell; mirror the new
                // identity into the header before the event is applied.
                if matches!(
                    &event,
                    worker::WorkerEvent::LoginComplete { result: Ok(()) }
                        | worker::WorkerEvent::TrustComplete { result: Ok(()) }
                ) {
                    let cell = session::snapshot(&shared);
                    debug!(
                        "session rebuilt: {:?} against {}",
                        cell.session.phase, cell.session.server
                    );
                    app.set_identity(cell.session.server.clone(), cell.session.username.clone());
                }
                let command = app.handle_event(event);
                if let Some(code) = execute_command(terminal, app, &job_tx, command).await? {
                    break code;
                }
            }
        }
    };

    worker_task.abort();
    Ok(exit_code)
}

/// Run one command chain to completion. Interactive subprocesses hand the
/// terminal over right here on the interaction task, which is why their
/// follow-up (redraw, exit-code notice, refetch) loops back into the app.
async fn execute_command(
    terminal: &mut TuiTerminal,
    app: &mut App,
    job_tx: &mpsc::UnboundedSender<worker::Job>,
    command: AppCommand,
) -> Result<Option<i32>> {
    let mut command = command;
    loop {
        match command {
            AppCommand::None => return Ok(None),
            AppCommand::Fatal { code } => return Ok(Some(code)),
            AppCommand::Dispatch(jobs) => {
                for job in jobs {
                    let _ = job_tx.send(job);
                }
                return Ok(None);
            }
            AppCommand::RunInteractive { argv } => {
                terminal
                    .draw(|frame| ui::render(frame, app))
                    .context("failed to render terminal frame")?;
                let result = bridge::run_interactive(terminal, &argv).await;
                command = app.after_interactive(result);
            }
            AppCommand::PageFile { path } => {
                match bridge::page_file(terminal, &path).await {
                    Ok(()) => command = AppCommand::None,
                    Err(error) => {
                        app.open_report("Error", format!("{error:#}"));
                        command = AppCommand::None;
                    }
                }
            }
        }
    }
}
