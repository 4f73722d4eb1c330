use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::error::StoreError;
use super::models::{Chapter, Manga, ReadHistory};
use super::source::SourceRegistry;

pub const LIBRARY_FILE: &str = "library.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LibraryFile {
    #[serde(default)]
    library: Vec<Manga>,
    /// Chapter lists of library manga, keyed by `Manga::key`.
    #[serde(default)]
    chapters: HashMap<String, Vec<Chapter>>,
    /// Read history per manga key. Kept for manga outside the library too.
    #[serde(default)]
    history: HashMap<String, ReadHistory>,
}

/// Library membership, cached chapters and read history, persisted as one JSON file.
///
/// Cloning is cheap and every clone sees the same state. All calls are
/// synchronous except [`DataStore::get_chapters`], which may hit a source.
#[derive(Clone)]
pub struct DataStore {
    inner: Arc<Mutex<StoreInner>>,
}

struct StoreInner {
    path: PathBuf,
    data: LibraryFile,
}

impl DataStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let data = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?
        } else {
            LibraryFile::default()
        };

        log::info!(
            "opened library at {} ({} manga)",
            path.display(),
            data.library.len()
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner { path, data })),
        })
    }

    pub fn open_in(dir: &Path) -> Result<Self, StoreError> {
        Self::open(dir.join(LIBRARY_FILE))
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn library_contains(&self, manga: &Manga) -> bool {
        let key = manga.key();
        self.lock().data.library.iter().any(|m| m.key() == key)
    }

    pub fn library(&self) -> Vec<Manga> {
        self.lock().data.library.clone()
    }

    /// Adds `manga` and returns the stored record, or `None` if it was already there.
    pub fn add_to_library(&self, manga: &Manga) -> Result<Option<Manga>, StoreError> {
        let mut inner = self.lock();
        let key = manga.key();
        if inner.data.library.iter().any(|m| m.key() == key) {
            return Ok(None);
        }

        inner.commit(|data| data.library.push(manga.clone()))?;
        log::info!("added {} to library", key);
        Ok(Some(manga.clone()))
    }

    /// Removes `manga` and its cached chapters. Read history is kept.
    pub fn delete(&self, manga: &Manga) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = manga.key();
        inner.commit(|data| {
            data.library.retain(|m| m.key() != key);
            data.chapters.remove(&key);
        })?;
        log::info!("removed {} from library", key);
        Ok(())
    }

    /// Replaces the stored record of a library manga. No-op for manga outside the library.
    pub fn update_manga(&self, manga: &Manga) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let key = manga.key();
        let Some(index) = inner.data.library.iter().position(|m| m.key() == key) else {
            return Ok(());
        };
        if inner.data.library[index] == *manga {
            return Ok(());
        }
        inner.commit(|data| data.library[index] = manga.clone())
    }

    pub fn cached_chapters(&self, manga: &Manga) -> Vec<Chapter> {
        self.lock()
            .data
            .chapters
            .get(&manga.key())
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_chapters(&self, manga: &Manga, chapters: &[Chapter]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.commit(|data| {
            data.chapters.insert(manga.key(), chapters.to_vec());
        })
    }

    /// Chapter list for `manga`.
    ///
    /// With `prefer_remote`, or when nothing is cached, the list is fetched from
    /// the manga's source and cached if the manga is in the library. A failed
    /// fetch falls back to the cached list.
    pub async fn get_chapters(
        &self,
        manga: &Manga,
        prefer_remote: bool,
        sources: &SourceRegistry,
    ) -> Vec<Chapter> {
        let cached = self.cached_chapters(manga);
        if !prefer_remote && !cached.is_empty() {
            return cached;
        }

        let Some(source) = sources.resolve(&manga.source_id) else {
            log::warn!("no source {} for chapters of {}", manga.source_id, manga.id);
            return cached;
        };

        match source.get_chapter_list(manga).await {
            Ok(chapters) => {
                if self.library_contains(manga) {
                    self.cache_in_background(manga, &chapters).await;
                }
                chapters
            }
            Err(e) => {
                log::warn!("failed to fetch chapters for {}: {}", manga.key(), e);
                cached
            }
        }
    }

    /// Writes the chapter cache on the blocking pool.
    async fn cache_in_background(&self, manga: &Manga, chapters: &[Chapter]) {
        let store = self.clone();
        let key = manga.key();
        let manga = manga.clone();
        let chapters = chapters.to_vec();
        match tokio::task::spawn_blocking(move || store.set_chapters(&manga, &chapters)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("failed to cache chapters for {}: {}", key, e),
            Err(e) => log::error!("chapter cache task for {} failed: {}", key, e),
        }
    }

    pub fn get_read_history(&self, manga: &Manga) -> ReadHistory {
        self.lock()
            .data
            .history
            .get(&manga.key())
            .cloned()
            .unwrap_or_default()
    }

    /// Marks `chapter` as read. Existing progress is left alone.
    pub fn add_history(&self, chapter: &Chapter) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.progress(chapter).is_some_and(|p| p > 0) {
            return Ok(());
        }
        inner.commit(|data| {
            data.history
                .entry(chapter.manga_key())
                .or_default()
                .insert(chapter.id.clone(), 1);
        })
    }

    pub fn remove_history(&self, chapter: &Chapter) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.progress(chapter).is_none() {
            return Ok(());
        }
        let key = chapter.manga_key();
        inner.commit(|data| {
            if let Some(history) = data.history.get_mut(&key) {
                history.remove(&chapter.id);
                if history.is_empty() {
                    data.history.remove(&key);
                }
            }
        })
    }

    /// Stores reading progress for `chapter`. Unchanged progress is not written again.
    pub fn set_history_progress(&self, chapter: &Chapter, progress: i32) -> Result<(), StoreError> {
        if progress <= 0 {
            return self.remove_history(chapter);
        }
        let mut inner = self.lock();
        if inner.progress(chapter) == Some(progress) {
            return Ok(());
        }
        inner.commit(|data| {
            data.history
                .entry(chapter.manga_key())
                .or_default()
                .insert(chapter.id.clone(), progress);
        })
    }
}

impl StoreInner {
    fn progress(&self, chapter: &Chapter) -> Option<i32> {
        self.data
            .history
            .get(&chapter.manga_key())
            .and_then(|history| history.get(&chapter.id))
            .copied()
    }

    /// Applies `change` to a copy of the data and keeps it only once the file is written.
    fn commit(&mut self, change: impl FnOnce(&mut LibraryFile)) -> Result<(), StoreError> {
        let mut next = self.data.clone();
        change(&mut next);
        write_file(&self.path, &next)?;
        self.data = next;
        Ok(())
    }
}

fn write_file(path: &Path, data: &LibraryFile) -> Result<(), StoreError> {
    let content = serde_json::to_string_pretty(data).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, content).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}
