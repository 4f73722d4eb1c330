use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use crate::backend::Backend;
use crate::backend::models::{Chapter, Manga};

use super::detail::{MangaView, RefreshEvent};

const DESCRIPTION_LINES: usize = 4;

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum View {
    #[default]
    Browse,
    Detail,
    Chapters,
    Reader,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub enum Section {
    #[default]
    Library,
    Popular,
}

#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Loading,
    Ready,
}

pub struct App {
    pub backend: Backend,
    pub state: AppState,
    pub loading_message: String,
    pub view: View,
    pub section: Section,
    pub library: Vec<Manga>,
    pub popular: Vec<Manga>,
    pub popular_loading: bool,
    pub library_state: ListState,
    pub popular_state: ListState,
    pub detail: Option<MangaView>,
    pub chapter_list_state: ListState,
    pub reader_page: usize,
    /// Screen the reader returns to.
    reader_origin: View,
    pub chapter_preview: usize,
}

impl App {
    pub fn new(backend: Backend, chapter_preview: usize) -> Self {
        Self {
            backend,
            state: AppState::Loading,
            loading_message: "Initializing...".to_string(),
            view: View::Browse,
            section: Section::Library,
            library: Vec::new(),
            popular: Vec::new(),
            popular_loading: false,
            library_state: ListState::default(),
            popular_state: ListState::default(),
            detail: None,
            chapter_list_state: ListState::default(),
            reader_page: 0,
            reader_origin: View::Detail,
            chapter_preview: chapter_preview.max(1),
        }
    }

    pub fn set_loading(&mut self, message: &str) {
        self.state = AppState::Loading;
        self.loading_message = message.to_string();
    }

    pub fn set_ready(&mut self) {
        self.state = AppState::Ready;
    }

    pub fn reload_library(&mut self) {
        self.library = self.backend.store.library();
        clamp_selection(&mut self.library_state, self.library.len());
    }

    pub fn set_popular(&mut self, popular: Vec<Manga>) {
        self.popular = popular;
        self.popular_loading = false;
        clamp_selection(&mut self.popular_state, self.popular.len());
    }

    pub fn toggle_section(&mut self) {
        self.section = match self.section {
            Section::Library => Section::Popular,
            Section::Popular => Section::Library,
        };
    }

    fn browse_list(&mut self) -> (&[Manga], &mut ListState) {
        match self.section {
            Section::Library => (self.library.as_slice(), &mut self.library_state),
            Section::Popular => (self.popular.as_slice(), &mut self.popular_state),
        }
    }

    pub fn move_browse_selection(&mut self, delta: isize) {
        let (list, state) = self.browse_list();
        let len = list.len();
        step_selection(state, len, delta);
    }

    pub fn selected_browse_manga(&mut self) -> Option<Manga> {
        let (list, state) = self.browse_list();
        state.selected().and_then(|i| list.get(i)).cloned()
    }

    /// Shows the detail screen for `manga`. Returns `true` when a refresh should be started.
    pub fn open_manga(&mut self, manga: Manga) -> bool {
        let mut detail = MangaView::new(manga);
        let needs_refresh = detail.on_appear(&self.backend.store);
        self.detail = Some(detail);
        self.chapter_list_state.select(Some(0));
        self.view = View::Detail;
        needs_refresh
    }

    /// Applies a refresh event if it belongs to the manga on screen.
    pub fn apply_refresh(&mut self, manga_key: &str, event: RefreshEvent) {
        match self.detail.as_mut() {
            Some(detail) if detail.manga.key() == manga_key => {
                detail.apply(event, &self.backend.store);
            }
            _ => log::debug!("dropping refresh event for {}", manga_key),
        }
    }

    fn visible_chapters(&self) -> &[Chapter] {
        match (&self.detail, self.view) {
            (Some(detail), View::Detail) => detail.preview(self.chapter_preview),
            (Some(detail), _) => detail.chapters.as_slice(),
            (None, _) => &[],
        }
    }

    pub fn selected_chapter(&self) -> Option<Chapter> {
        let chapters = self.visible_chapters();
        self.chapter_list_state
            .selected()
            .and_then(|i| chapters.get(i))
            .cloned()
    }

    pub fn move_chapter_selection(&mut self, delta: isize) {
        let len = self.visible_chapters().len();
        step_selection(&mut self.chapter_list_state, len, delta);
    }

    pub fn show_all_chapters(&mut self) {
        if self.detail.is_some() {
            self.view = View::Chapters;
        }
    }

    pub fn toggle_selected_read(&mut self) {
        let Some(chapter) = self.selected_chapter() else {
            return;
        };
        if let Some(detail) = self.detail.as_mut() {
            detail.toggle_read(&chapter, &self.backend.store);
        }
    }

    pub fn toggle_library(&mut self) {
        if let Some(detail) = self.detail.as_mut() {
            detail.toggle_library(&self.backend.store);
        }
    }

    pub fn toggle_description(&mut self) {
        if let Some(detail) = self.detail.as_mut() {
            detail.toggle_description();
        }
    }

    pub fn dismiss_alert(&mut self) {
        if let Some(detail) = self.detail.as_mut() {
            detail.dismiss_alert();
        }
    }

    pub fn alert_showing(&self) -> bool {
        self.detail.as_ref().is_some_and(|d| d.showing_alert)
    }

    /// Opens the reader on the continue-reading chapter.
    pub fn read_next(&mut self) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        if !detail.read() {
            return;
        }
        if let Some(chapter) = detail.selected_chapter.clone() {
            self.open_reader(chapter);
        }
    }

    pub fn open_selected_chapter(&mut self) {
        if let Some(chapter) = self.selected_chapter() {
            self.open_reader(chapter);
        }
    }

    /// Opens `chapter`, resuming at its recorded progress.
    pub fn open_reader(&mut self, chapter: Chapter) {
        let Some(detail) = self.detail.as_mut() else {
            return;
        };
        let progress = detail.read_history.get(&chapter.id).copied().unwrap_or(0);
        let last_page = chapter.pages.saturating_sub(1);
        self.reader_page = (progress.max(1) as usize - 1).min(last_page);
        detail.open_chapter(chapter);
        if self.view != View::Reader {
            self.reader_origin = self.view;
        }
        self.view = View::Reader;
        self.record_progress();
    }

    fn reader_chapter(&self) -> Option<&Chapter> {
        self.detail.as_ref()?.selected_chapter.as_ref()
    }

    /// Stores the open reader page as the chapter's progress. Page turns only move
    /// `reader_page`; this runs on opening, leaving and quitting the reader.
    pub fn record_progress(&self) {
        let Some(chapter) = self.reader_chapter() else {
            return;
        };
        let page = self.reader_page as i32 + 1;
        if let Err(e) = self.backend.store.set_history_progress(chapter, page) {
            log::error!("failed to record progress of chapter {}: {}", chapter.id, e);
        }
    }

    pub fn next_page(&mut self) -> bool {
        let Some(chapter) = self.reader_chapter() else {
            return false;
        };
        if self.reader_page + 1 >= chapter.pages {
            return false;
        }
        self.reader_page += 1;
        true
    }

    pub fn prev_page(&mut self) -> bool {
        if self.reader_page == 0 {
            return false;
        }
        self.reader_page -= 1;
        true
    }

    /// Moves the reader `delta` entries along the chapter list. Lists run newest first,
    /// so the following chapter is at `-1`.
    pub fn step_chapter(&mut self, delta: isize) -> bool {
        let Some(detail) = self.detail.as_ref() else {
            return false;
        };
        let Some(current) = detail.selected_chapter.as_ref() else {
            return false;
        };
        let Some(idx) = detail.chapters.iter().position(|c| c.id == current.id) else {
            return false;
        };
        let Some(target) = idx
            .checked_add_signed(delta)
            .and_then(|i| detail.chapters.get(i))
            .cloned()
        else {
            return false;
        };
        self.record_progress();
        self.open_reader(target);
        true
    }

    /// Leaves the current screen. Returns `true` when the detail screen came back
    /// into view without its chapters and should be refreshed again.
    pub fn go_back(&mut self) -> bool {
        match self.view {
            View::Reader => {
                self.record_progress();
                if let Some(detail) = self.detail.as_mut() {
                    detail.dismiss_reader(&self.backend.store);
                }
                self.view = self.reader_origin;
                false
            }
            View::Chapters => {
                self.view = View::Detail;
                let len = self.visible_chapters().len();
                clamp_selection(&mut self.chapter_list_state, len);
                self.detail
                    .as_mut()
                    .is_some_and(|d| d.on_appear(&self.backend.store))
            }
            View::Detail => {
                self.detail = None;
                self.view = View::Browse;
                self.reload_library();
                false
            }
            View::Browse => false,
        }
    }
}

fn clamp_selection(state: &mut ListState, len: usize) {
    if len == 0 {
        state.select(None);
    } else {
        let selected = state.selected().unwrap_or(0).min(len - 1);
        state.select(Some(selected));
    }
}

fn step_selection(state: &mut ListState, len: usize, delta: isize) {
    if len == 0 {
        state.select(None);
        return;
    }
    let current = state.selected().unwrap_or(0);
    let next = current.saturating_add_signed(delta).min(len - 1);
    state.select(Some(next));
}

pub fn ui(f: &mut Frame, app: &mut App) {
    match (app.state, app.view) {
        (AppState::Loading, _) => draw_loading_screen(f, app),
        (AppState::Ready, View::Browse) => draw_browse(f, app),
        (AppState::Ready, View::Detail) => draw_detail(f, app),
        (AppState::Ready, View::Chapters) => draw_chapter_list(f, app),
        (AppState::Ready, View::Reader) => draw_reader(f, app),
    }

    if app.alert_showing() {
        draw_missing_source_alert(f);
    }
}

fn spinner() -> &'static str {
    let spinner_frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    spinner_frames[(millis / 100) as usize % spinner_frames.len()]
}

fn loading_line(label: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!(" {} ", spinner()),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(label.to_string(), Style::default().fg(Color::DarkGray)),
    ])
}

fn draw_loading_screen(f: &mut Frame, app: &App) {
    let area = f.area();

    let block = Block::default()
        .borders(Borders::ALL)
        .title("Manga Reader")
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    f.render_widget(block, area);

    let center_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .split(inner);

    let loading_paragraph = Paragraph::new(loading_line("Loading...")).alignment(Alignment::Center);
    f.render_widget(loading_paragraph, center_layout[1]);

    let message = Paragraph::new(&*app.loading_message)
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(message, center_layout[2]);
}

fn focused_style() -> Style {
    Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD)
}

fn draw_browse(f: &mut Frame, app: &mut App) {
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // tabs
            Constraint::Min(5),    // list
            Constraint::Length(3), // footer
        ])
        .split(f.area());

    let selected = match app.section {
        Section::Library => 0,
        Section::Popular => 1,
    };
    let tabs = Tabs::new(vec!["Library", "Popular"])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Manga Reader")
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(focused_style());
    f.render_widget(tabs, root[0]);

    let (title, mangas, state, empty) = match app.section {
        Section::Library => (
            "Library",
            &app.library,
            &mut app.library_state,
            "Your library is empty",
        ),
        Section::Popular => (
            "Popular",
            &app.popular,
            &mut app.popular_state,
            if app.popular_loading {
                "Loading..."
            } else {
                "No manga available"
            },
        ),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(focused_style());

    if mangas.is_empty() {
        let p = Paragraph::new(empty)
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(p, root[1]);
    } else {
        let width = root[1].width.saturating_sub(6) as usize;
        let items: Vec<ListItem> = mangas
            .iter()
            .map(|m| {
                let author = m.author.as_deref().unwrap_or("");
                ListItem::new(Line::from(vec![
                    Span::styled(
                        truncate_text(m.display_title(), width.saturating_sub(author.len() + 3)),
                        Style::default().fg(Color::White),
                    ),
                    Span::styled(format!("  {}", author), Style::default().fg(Color::DarkGray)),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        f.render_stateful_widget(list, root[1], state);
    }

    draw_footer(
        f,
        root[2],
        &[("Tab", "switch list"), ("↑/↓", "move"), ("Enter", "open"), ("q", "quit")],
    );
}

fn draw_detail(f: &mut Frame, app: &mut App) {
    let Some(detail) = app.detail.as_ref() else {
        return;
    };
    let area = f.area();
    let content_width = area.width.saturating_sub(4) as usize;

    let description_lines: Vec<Line> = match detail.description() {
        Some(text) => {
            let max_lines = if detail.description_expanded {
                usize::MAX
            } else {
                DESCRIPTION_LINES
            };
            wrap_text(text, content_width, max_lines)
                .into_iter()
                .map(|l| Line::styled(l, Style::default().fg(Color::Gray)))
                .collect()
        }
        None => vec![loading_line("Loading...")],
    };
    let description_height = (description_lines.len().max(1) as u16 + 2).min(area.height / 2);
    let has_tags = detail.manga.tags.as_ref().is_some_and(|t| !t.is_empty());

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(6), // header
            Constraint::Length(if has_tags { 1 } else { 0 }),
            Constraint::Length(description_height),
            Constraint::Min(4),    // chapters
            Constraint::Length(3), // footer
        ])
        .split(area);

    draw_detail_header(f, root[0], detail);

    if let Some(tags) = detail.manga.tags.as_ref().filter(|t| !t.is_empty()) {
        let spans: Vec<Span> = tags
            .iter()
            .flat_map(|tag| {
                [
                    Span::styled(
                        format!(" {} ", tag),
                        Style::default().fg(Color::Gray).bg(Color::DarkGray),
                    ),
                    Span::raw(" "),
                ]
            })
            .collect();
        f.render_widget(Paragraph::new(Line::from(spans)), root[1]);
    }

    let description = Paragraph::new(description_lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(Span::styled("Description", Style::default().add_modifier(Modifier::BOLD)))
            .title_top(
                Line::from(if detail.description_expanded {
                    " d: Show Less "
                } else {
                    " d: Show More "
                })
                .right_aligned(),
            ),
    );
    f.render_widget(description, root[2]);

    let chapters_block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled("Chapters", Style::default().add_modifier(Modifier::BOLD)))
        .title_top(Line::from(" s: Show All ").right_aligned())
        .border_style(focused_style());
    let preview = detail.preview(app.chapter_preview);
    draw_chapters(f, root[3], chapters_block, detail, preview, &mut app.chapter_list_state);

    draw_footer(
        f,
        root[4],
        &[
            ("r", "read"),
            ("a", "library"),
            ("m", "mark read"),
            ("Enter", "open"),
            ("Esc", "back"),
        ],
    );
}

fn draw_detail_header(f: &mut Frame, area: Rect, detail: &MangaView) {
    let manga = &detail.manga;
    let library_badge = if detail.in_library {
        Span::styled(" ✓ In Library ", Style::default().fg(Color::Black).bg(Color::Green))
    } else {
        Span::styled(" + Add ", Style::default().fg(Color::White).bg(Color::DarkGray))
    };

    let mut lines = vec![
        Line::from(Span::styled(
            manga.display_title().to_string(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            manga.author.clone().unwrap_or_default(),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    if let Some(status) = &manga.status {
        lines.push(Line::from(vec![
            Span::styled("★ ", Style::default().fg(Color::Yellow)),
            Span::styled(status.clone(), Style::default().fg(Color::Cyan)),
        ]));
    }
    lines.push(Line::from(vec![
        Span::styled(" ▶ Read ", Style::default().fg(Color::White).bg(Color::Blue)),
        Span::raw("  "),
        library_badge,
    ]));

    let header = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(header, area);
}

fn draw_chapters(
    f: &mut Frame,
    area: Rect,
    block: Block,
    detail: &MangaView,
    chapters: &[Chapter],
    state: &mut ListState,
) {
    if !detail.chapters_loaded {
        let p = Paragraph::new(loading_line("Loading chapters..."))
            .block(block)
            .alignment(Alignment::Center);
        f.render_widget(p, area);
        return;
    }
    if chapters.is_empty() {
        let p = Paragraph::new("No Chapters")
            .block(block)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray));
        f.render_widget(p, area);
        return;
    }

    let items: Vec<ListItem> = chapters
        .iter()
        .map(|chapter| {
            let title_style = if detail.is_read(chapter) {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default().fg(Color::White)
            };
            let mut spans = vec![Span::styled(chapter.display_title(), title_style)];
            if chapter.title.is_some() {
                spans.push(Span::styled(
                    format!("  {}", chapter.number_label()),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    f.render_stateful_widget(list, area, state);
}

fn draw_chapter_list(f: &mut Frame, app: &mut App) {
    let Some(detail) = app.detail.as_ref() else {
        return;
    };
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(4), Constraint::Length(3)])
        .split(f.area());

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(
            "{} · {} chapters",
            detail.manga.display_title(),
            detail.chapters.len()
        ))
        .border_style(focused_style());
    draw_chapters(f, root[0], block, detail, &detail.chapters, &mut app.chapter_list_state);

    draw_footer(
        f,
        root[1],
        &[("↑/↓", "move"), ("Enter", "open"), ("m", "mark read"), ("Esc", "back")],
    );
}

fn draw_reader(f: &mut Frame, app: &mut App) {
    let Some(chapter) = app.reader_chapter() else {
        return;
    };
    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(3)])
        .split(f.area());

    let mut lines = vec![
        Line::from(Span::styled(
            chapter.display_title(),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            chapter.number_label(),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("Page {} of {}", app.reader_page + 1, chapter.pages.max(1)),
            Style::default().fg(Color::Cyan),
        )),
    ];
    if let Some(volume) = &chapter.volume {
        lines.insert(2, Line::from(format!("Volume {}", volume)));
    }

    let reader = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Reader")
                .border_style(Style::default().fg(Color::Cyan)),
        );
    f.render_widget(reader, root[0]);

    draw_footer(
        f,
        root[1],
        &[("←/→", "page"), ("n/p", "chapter"), ("Esc", "close")],
    );
}

fn draw_missing_source_alert(f: &mut Frame) {
    let area = centered_rect(f.area(), 60, 9);
    f.render_widget(Clear, area);

    let text = vec![
        Line::from(
            "The original source seems to be missing for this Manga. \
             Please redownload it or remove this title from your library.",
        ),
        Line::from(""),
        Line::from(Span::styled("Enter: OK", focused_style())),
    ];
    let alert = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Missing Source")
                .border_style(Style::default().fg(Color::Red)),
        );
    f.render_widget(alert, area);
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    )
}

fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        format!(
            "{}...",
            text.chars()
                .take(max_len.saturating_sub(3))
                .collect::<String>()
        )
    }
}

/// Greedy word wrap. Output past `max_lines` is cut and the last line ends in "...".
fn wrap_text(text: &str, width: usize, max_lines: usize) -> Vec<String> {
    if width == 0 || max_lines == 0 {
        return vec![];
    }

    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            if current_line.is_empty() {
                current_line = word.to_string();
            } else if current_line.chars().count() + 1 + word.chars().count() <= width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut current_line));
                current_line = word.to_string();
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            let char_count = last.chars().count();
            if char_count + 3 <= width {
                last.push_str("...");
            } else if char_count > 3 {
                *last = last.chars().take(char_count - 3).collect::<String>() + "...";
            }
        }
    }

    lines
}

fn draw_footer(f: &mut Frame, area: Rect, keys: &[(&str, &str)]) {
    let spans: Vec<Span> = keys
        .iter()
        .flat_map(|(key, action)| {
            [
                Span::styled(key.to_string(), Style::default().fg(Color::Yellow)),
                Span::raw(format!(": {}  ", action)),
            ]
        })
        .collect();

    let p = Paragraph::new(Line::from(spans))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        )
        .alignment(Alignment::Center);
    f.render_widget(p, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::library::DataStore;
    use crate::backend::source::SourceRegistry;
    use crate::backend::source::fixtures::chapter;

    fn app(dir: &tempfile::TempDir) -> App {
        let store = DataStore::open_in(dir.path()).unwrap();
        App::new(Backend::new(store, SourceRegistry::new()), 2)
    }

    fn loaded_detail(app: &mut App, ids: &[&str]) {
        app.open_manga(Manga::new("stub", "m1"));
        let detail = app.detail.as_mut().unwrap();
        detail.chapters = ids
            .iter()
            .enumerate()
            .map(|(i, id)| chapter("stub", "m1", id, (ids.len() - i) as f32))
            .collect();
        detail.chapters_loaded = true;
    }

    #[test]
    fn wrap_text_cuts_with_ellipsis() {
        let lines = wrap_text("one two three four five six", 9, 2);
        assert_eq!(lines, vec!["one two".to_string(), "three...".to_string()]);
        assert_eq!(wrap_text("short", 20, 4), vec!["short".to_string()]);
        assert_eq!(wrap_text("a\nb", 20, 4).len(), 2);
    }

    #[test]
    fn selection_stays_in_preview() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        loaded_detail(&mut app, &["c3", "c2", "c1"]);

        app.move_chapter_selection(5);
        assert_eq!(app.selected_chapter().unwrap().id, "c2");

        app.show_all_chapters();
        app.move_chapter_selection(5);
        assert_eq!(app.selected_chapter().unwrap().id, "c1");
    }

    #[test]
    fn reader_records_progress_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        loaded_detail(&mut app, &["c2", "c1"]);

        app.open_selected_chapter();
        assert_eq!(app.view, View::Reader);
        assert!(app.next_page());
        assert!(app.next_page());
        assert!(!app.go_back());
        assert_eq!(app.view, View::Detail);
        assert_eq!(
            app.detail.as_ref().unwrap().read_history.get("c2"),
            Some(&3)
        );

        app.open_selected_chapter();
        assert_eq!(app.reader_page, 2);
    }

    #[test]
    fn page_turns_are_stored_when_leaving_reader() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        loaded_detail(&mut app, &["c2", "c1"]);
        let manga = Manga::new("stub", "m1");

        app.open_selected_chapter();
        assert!(app.next_page());
        assert!(app.next_page());
        assert_eq!(app.backend.store.get_read_history(&manga).get("c2"), Some(&1));

        assert!(app.step_chapter(1));
        let history = app.backend.store.get_read_history(&manga);
        assert_eq!(history.get("c2"), Some(&3));
        assert_eq!(history.get("c1"), Some(&1));
    }

    #[test]
    fn returning_from_chapters_during_refresh_starts_no_second_one() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        assert!(app.open_manga(Manga::new("stub", "m1")));

        app.show_all_chapters();
        assert!(!app.go_back());
        assert_eq!(app.view, View::Detail);

        app.apply_refresh("stub:m1", RefreshEvent::Finished);
        app.show_all_chapters();
        assert!(app.go_back());
    }

    #[test]
    fn reader_steps_to_following_chapter() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        loaded_detail(&mut app, &["c2", "c1"]);
        app.move_chapter_selection(1);
        app.open_selected_chapter();

        assert!(app.step_chapter(-1));
        assert_eq!(app.reader_chapter().unwrap().id, "c2");
        assert!(!app.step_chapter(-1));
    }

    #[test]
    fn stale_refresh_events_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        app.open_manga(Manga::new("stub", "m1"));

        app.apply_refresh("stub:other", RefreshEvent::ChaptersLoaded(Vec::new()));
        assert!(!app.detail.as_ref().unwrap().chapters_loaded);

        app.apply_refresh("stub:m1", RefreshEvent::ChaptersLoaded(Vec::new()));
        assert!(app.detail.as_ref().unwrap().chapters_loaded);
    }

    #[test]
    fn leaving_detail_reloads_library() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = app(&dir);
        loaded_detail(&mut app, &["c1"]);
        app.toggle_library();

        app.go_back();
        assert_eq!(app.view, View::Browse);
        assert!(app.detail.is_none());
        assert_eq!(app.library.len(), 1);
        assert_eq!(app.selected_browse_manga().unwrap().id, "m1");
    }
}
