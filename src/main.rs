mod backend;
mod config;
mod logging;
mod ui;

use backend::Backend;
use backend::library::DataStore;
use backend::mangadex::MangaDex;
use backend::models::Manga;
use backend::source::SourceRegistry;
use config::Config;
use ui::detail::{RefreshEvent, fetch_manga};
use ui::ui::{App, View, ui};

use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use log::{info, warn};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::{error::Error, io, path::PathBuf, sync::Arc};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(name = "manga-reader-tui", version, about = "Terminal manga reader")]
struct Cli {
    /// Config file. Defaults to the platform config dir.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory for the library file and log.
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// Source to browse and to open `--manga` from.
    #[arg(long)]
    source: Option<String>,
    /// Open the detail screen of this manga id on start.
    #[arg(long)]
    manga: Option<String>,
}

enum BackgroundTask {
    PopularLoaded { manga: Vec<Manga> },
    Refresh { manga_key: String, event: RefreshEvent },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mut config = Config::load_or_create(&config_path)?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }
    if let Some(source) = cli.source {
        config.default_source = source;
    }

    let data_dir = config.data_dir();
    let log_path = logging::init(&data_dir, &config.log_level)?;
    info!(
        "starting with config {} (log at {})",
        config_path.display(),
        log_path.display()
    );

    let store = DataStore::open_in(&data_dir)?;
    let mut sources = SourceRegistry::new();
    sources.register(Arc::new(MangaDex::new(&config.user_agent, &config.language)?));
    let backend = Backend::new(store, sources);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let term_backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(term_backend)?;

    let mut app = App::new(backend.clone(), config.chapter_preview);

    // Create channel for background tasks
    let (task_tx, mut task_rx) = mpsc::unbounded_channel::<BackgroundTask>();

    app.set_loading("Opening library...");
    terminal.draw(|f| ui(f, &mut app))?;
    app.reload_library();

    app.popular_loading = true;
    spawn_popular_loader(&backend, &config.default_source, task_tx.clone());

    if let Some(id) = cli.manga {
        let manga = app
            .library
            .iter()
            .find(|m| m.id == id && m.source_id == config.default_source)
            .cloned()
            .unwrap_or_else(|| Manga::new(config.default_source.clone(), id));
        open_manga(&mut app, manga, &task_tx);
    }

    app.set_ready();

    let res = run_app(&mut terminal, &mut app, &mut task_rx, task_tx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("event loop failed: {err}");
        eprintln!("{err}");
    }
    info!("bye");
    Ok(())
}

fn spawn_popular_loader(
    backend: &Backend,
    source_id: &str,
    tx: mpsc::UnboundedSender<BackgroundTask>,
) {
    let Some(source) = backend.sources.resolve(source_id) else {
        warn!(
            "default source {} is not installed (have {:?})",
            source_id,
            backend.sources.ids()
        );
        let _ = tx.send(BackgroundTask::PopularLoaded { manga: Vec::new() });
        return;
    };

    tokio::spawn(async move {
        let manga = match source.get_popular_manga(0).await {
            Ok(manga) => manga,
            Err(e) => {
                warn!("failed to load popular manga from {}: {}", source.id(), e);
                Vec::new()
            }
        };
        let _ = tx.send(BackgroundTask::PopularLoaded { manga });
    });
}

/// Runs the detail refresh for `manga` in the background. Not cancelled when the screen closes.
fn spawn_refresh(manga: Manga, backend: Backend, tx: mpsc::UnboundedSender<BackgroundTask>) {
    let manga_key = manga.key();
    tokio::spawn(async move {
        fetch_manga(manga, backend, move |event| {
            let _ = tx.send(BackgroundTask::Refresh {
                manga_key: manga_key.clone(),
                event,
            });
        })
        .await;
    });
}

fn open_manga(app: &mut App, manga: Manga, task_tx: &mpsc::UnboundedSender<BackgroundTask>) {
    info!("opening {}", manga.key());
    if app.open_manga(manga.clone()) {
        spawn_refresh(manga, app.backend.clone(), task_tx.clone());
    }
}

fn refresh_current(app: &App, task_tx: &mpsc::UnboundedSender<BackgroundTask>) {
    if let Some(detail) = &app.detail {
        spawn_refresh(detail.manga.clone(), app.backend.clone(), task_tx.clone());
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    task_rx: &mut mpsc::UnboundedReceiver<BackgroundTask>,
    task_tx: mpsc::UnboundedSender<BackgroundTask>,
) -> io::Result<()> {
    let mut event_stream = EventStream::new();

    loop {
        terminal.draw(|f| ui(f, app))?;

        tokio::select! {
            // Keeps the spinners moving
            _ = tokio::time::sleep(tokio::time::Duration::from_millis(100)) => {}

            Some(Ok(event)) = event_stream.next() => {
                if let Event::Key(key) = event {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if key.code == KeyCode::Char('q') {
                        app.record_progress();
                        return Ok(());
                    }
                    if app.alert_showing() {
                        if matches!(key.code, KeyCode::Enter | KeyCode::Esc) {
                            app.dismiss_alert();
                        }
                        continue;
                    }
                    match app.view {
                        View::Browse => handle_browse_input(app, key.code, &task_tx),
                        View::Detail => handle_detail_input(app, key.code, &task_tx),
                        View::Chapters => handle_chapters_input(app, key.code, &task_tx),
                        View::Reader => handle_reader_input(app, key.code),
                    }
                }
            }

            Some(task) = task_rx.recv() => {
                match task {
                    BackgroundTask::PopularLoaded { manga } => {
                        app.set_popular(manga);
                    }
                    BackgroundTask::Refresh { manga_key, event } => {
                        app.apply_refresh(&manga_key, event);
                    }
                }
            }
        }
    }
}

fn handle_browse_input(
    app: &mut App,
    key: KeyCode,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Tab | KeyCode::Left | KeyCode::Right => app.toggle_section(),
        KeyCode::Up => app.move_browse_selection(-1),
        KeyCode::Down => app.move_browse_selection(1),
        KeyCode::Enter => {
            if let Some(manga) = app.selected_browse_manga() {
                open_manga(app, manga, task_tx);
            }
        }
        _ => {}
    }
}

fn handle_detail_input(
    app: &mut App,
    key: KeyCode,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Esc => {
            if app.go_back() {
                refresh_current(app, task_tx);
            }
        }
        KeyCode::Up => app.move_chapter_selection(-1),
        KeyCode::Down => app.move_chapter_selection(1),
        KeyCode::Enter => app.open_selected_chapter(),
        KeyCode::Char('r') => app.read_next(),
        KeyCode::Char('m') => app.toggle_selected_read(),
        KeyCode::Char('a') => app.toggle_library(),
        KeyCode::Char('d') => app.toggle_description(),
        KeyCode::Char('s') => app.show_all_chapters(),
        _ => {}
    }
}

fn handle_chapters_input(
    app: &mut App,
    key: KeyCode,
    task_tx: &mpsc::UnboundedSender<BackgroundTask>,
) {
    match key {
        KeyCode::Esc => {
            if app.go_back() {
                refresh_current(app, task_tx);
            }
        }
        KeyCode::Up => app.move_chapter_selection(-1),
        KeyCode::Down => app.move_chapter_selection(1),
        KeyCode::Enter => app.open_selected_chapter(),
        KeyCode::Char('m') => app.toggle_selected_read(),
        _ => {}
    }
}

fn handle_reader_input(app: &mut App, key: KeyCode) {
    match key {
        KeyCode::Esc => {
            app.go_back();
        }
        KeyCode::Left => {
            app.prev_page();
        }
        KeyCode::Right => {
            app.next_page();
        }
        KeyCode::Char('n') => {
            app.step_chapter(-1);
        }
        KeyCode::Char('p') => {
            app.step_chapter(1);
        }
        _ => {}
    }
}
