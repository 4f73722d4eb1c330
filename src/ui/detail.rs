use crate::backend::Backend;
use crate::backend::library::DataStore;
use crate::backend::models::{Chapter, Manga, ReadHistory};

pub const NO_DESCRIPTION: &str = "No Description";

/// Progress reported by [`fetch_manga`], applied in order by [`MangaView::apply`].
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    /// The local record already has a description worth showing.
    DescriptionReady,
    /// The manga's source is not installed.
    SourceMissing,
    /// Fresh details merged into the local record.
    MangaUpdated(Manga),
    ChaptersLoaded(Vec<Chapter>),
    /// Last event of every refresh, including one that stopped early.
    Finished,
}

/// State of the manga detail screen.
pub struct MangaView {
    pub manga: Manga,
    pub chapters_loaded: bool,
    pub in_library: bool,
    pub chapters: Vec<Chapter>,
    pub read_history: ReadHistory,
    /// Chapter open in the reader.
    pub selected_chapter: Option<Chapter>,
    pub description_loaded: bool,
    pub description_expanded: bool,
    pub showing_alert: bool,
    pub missing_source_alerts: usize,
    /// A refresh was started and has not sent [`RefreshEvent::Finished`] yet.
    pub refreshing: bool,
}

impl MangaView {
    pub fn new(manga: Manga) -> Self {
        Self {
            manga,
            chapters_loaded: false,
            in_library: false,
            chapters: Vec::new(),
            read_history: ReadHistory::new(),
            selected_chapter: None,
            description_loaded: false,
            description_expanded: false,
            showing_alert: false,
            missing_source_alerts: 0,
            refreshing: false,
        }
    }

    /// Called whenever the screen becomes visible. Returns `true` when the
    /// caller should start [`fetch_manga`], at most once per running refresh.
    pub fn on_appear(&mut self, store: &DataStore) -> bool {
        self.in_library = store.library_contains(&self.manga);
        if !self.chapters_loaded {
            if self.refreshing {
                return false;
            }
            self.refreshing = true;
            return true;
        }
        self.update_read_history(store);
        false
    }

    pub fn apply(&mut self, event: RefreshEvent, store: &DataStore) {
        match event {
            RefreshEvent::DescriptionReady => {
                self.description_loaded = true;
            }
            RefreshEvent::SourceMissing => {
                if self.manga.description.is_none() {
                    self.manga.description = Some(NO_DESCRIPTION.to_string());
                }
                self.chapters.clear();
                self.description_loaded = true;
                self.chapters_loaded = true;
                self.showing_alert = true;
                self.missing_source_alerts += 1;
            }
            RefreshEvent::MangaUpdated(manga) => {
                self.manga = manga;
                self.description_loaded = true;
                if let Err(e) = store.update_manga(&self.manga) {
                    log::error!("failed to store details of {}: {}", self.manga.key(), e);
                }
                self.update_read_history(store);
            }
            RefreshEvent::ChaptersLoaded(chapters) => {
                self.chapters = chapters;
                self.chapters_loaded = true;
            }
            RefreshEvent::Finished => {
                self.refreshing = false;
            }
        }
    }

    pub fn update_read_history(&mut self, store: &DataStore) {
        self.read_history = store.get_read_history(&self.manga);
    }

    pub fn is_read(&self, chapter: &Chapter) -> bool {
        self.read_history.get(&chapter.id).copied().unwrap_or(0) > 0
    }

    /// Marks `chapter` read if it is unread and unread otherwise, then re-reads the history.
    pub fn toggle_read(&mut self, chapter: &Chapter, store: &DataStore) {
        let result = if self.is_read(chapter) {
            store.remove_history(chapter)
        } else {
            store.add_history(chapter)
        };
        if let Err(e) = result {
            log::error!("failed to update history of chapter {}: {}", chapter.id, e);
        }
        self.update_read_history(store);
    }

    /// The "continue reading" target: the chapter with the most progress.
    ///
    /// Equal progress resolves to the chapter listed first. History for
    /// chapters not in the list is ignored. Without candidates this is the
    /// first chapter.
    pub fn next_chapter(&self) -> Option<Chapter> {
        let mut best: Option<(&Chapter, i32)> = None;
        for chapter in &self.chapters {
            let Some(&progress) = self.read_history.get(&chapter.id) else {
                continue;
            };
            if best.is_none_or(|(_, top)| progress > top) {
                best = Some((chapter, progress));
            }
        }
        best.map(|(chapter, _)| chapter)
            .or_else(|| self.chapters.first())
            .cloned()
    }

    pub fn open_chapter(&mut self, chapter: Chapter) {
        self.selected_chapter = Some(chapter);
    }

    /// Opens the reader at [`MangaView::next_chapter`]. Returns `false` when there is nothing to read.
    pub fn read(&mut self) -> bool {
        match self.next_chapter() {
            Some(chapter) => {
                self.open_chapter(chapter);
                true
            }
            None => false,
        }
    }

    pub fn dismiss_reader(&mut self, store: &DataStore) {
        self.selected_chapter = None;
        self.update_read_history(store);
    }

    /// Adds to or removes from the library, then takes membership from the store.
    pub fn toggle_library(&mut self, store: &DataStore) {
        if self.in_library {
            if let Err(e) = store.delete(&self.manga) {
                log::error!("failed to remove {} from library: {}", self.manga.key(), e);
            }
        } else {
            match store.add_to_library(&self.manga) {
                Ok(Some(_)) if self.chapters_loaded && !self.chapters.is_empty() => {
                    if let Err(e) = store.set_chapters(&self.manga, &self.chapters) {
                        log::error!("failed to cache chapters of {}: {}", self.manga.key(), e);
                    }
                }
                Ok(_) => {}
                Err(e) => log::error!("failed to add {} to library: {}", self.manga.key(), e),
            }
        }
        self.in_library = store.library_contains(&self.manga);
    }

    pub fn toggle_description(&mut self) {
        self.description_expanded = !self.description_expanded;
    }

    /// `None` while the description is still loading.
    pub fn description(&self) -> Option<&str> {
        if !self.description_loaded {
            return None;
        }
        Some(self.manga.description.as_deref().unwrap_or(NO_DESCRIPTION))
    }

    pub fn preview(&self, count: usize) -> &[Chapter] {
        &self.chapters[..self.chapters.len().min(count)]
    }

    pub fn dismiss_alert(&mut self) {
        self.showing_alert = false;
    }
}

/// Loads details and chapters for `manga`, reporting each step through `emit`.
///
/// A failed detail fetch ends the refresh without a chapter list; the
/// screen keeps showing its loading state. [`RefreshEvent::Finished`] is
/// always sent last.
pub async fn fetch_manga(manga: Manga, backend: Backend, emit: impl Fn(RefreshEvent)) {
    load_manga(manga, &backend, &emit).await;
    emit(RefreshEvent::Finished);
}

async fn load_manga(manga: Manga, backend: &Backend, emit: &impl Fn(RefreshEvent)) {
    if manga.description.is_some() {
        emit(RefreshEvent::DescriptionReady);
    }

    let Some(source) = backend.sources.resolve(&manga.source_id) else {
        log::warn!("source {} is not installed", manga.source_id);
        emit(RefreshEvent::SourceMissing);
        return;
    };

    let newer = match source.get_manga_details(&manga).await {
        Ok(newer) => newer,
        Err(e) => {
            log::warn!("failed to fetch details of {}: {}", manga.key(), e);
            return;
        }
    };

    let manga = manga.copy_from(&newer);
    emit(RefreshEvent::MangaUpdated(manga.clone()));

    let prefer_remote = !backend.store.library_contains(&manga);
    let chapters = backend
        .store
        .get_chapters(&manga, prefer_remote, &backend.sources)
        .await;
    log::debug!("loaded {} chapters for {}", chapters.len(), manga.key());
    emit(RefreshEvent::ChaptersLoaded(chapters));
}
