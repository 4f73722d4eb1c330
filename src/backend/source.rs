use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::error::SourceError;
use super::models::{Chapter, Manga};

/// A content provider manga and chapters are fetched from.
#[async_trait]
pub trait Source: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    async fn get_manga_details(&self, manga: &Manga) -> Result<Manga, SourceError>;

    async fn get_chapter_list(&self, manga: &Manga) -> Result<Vec<Chapter>, SourceError>;

    async fn get_popular_manga(&self, page: u32) -> Result<Vec<Manga>, SourceError>;
}

/// Installed sources, looked up by id.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn Source>) {
        log::debug!("registered source {} ({})", source.id(), source.name());
        self.sources.insert(source.id().to_string(), source);
    }

    pub fn resolve(&self, source_id: &str) -> Option<Arc<dyn Source>> {
        self.sources.get(source_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory source with canned responses.
    pub struct StubSource {
        pub id: String,
        pub details: Option<Manga>,
        pub chapters: Vec<Chapter>,
        pub chapter_calls: AtomicUsize,
    }

    impl StubSource {
        pub fn new(id: &str) -> Self {
            StubSource {
                id: id.to_string(),
                details: None,
                chapters: Vec::new(),
                chapter_calls: AtomicUsize::new(0),
            }
        }

        pub fn with_details(mut self, details: Manga) -> Self {
            self.details = Some(details);
            self
        }

        pub fn with_chapters(mut self, chapters: Vec<Chapter>) -> Self {
            self.chapters = chapters;
            self
        }

        pub fn chapter_calls(&self) -> usize {
            self.chapter_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Source for StubSource {
        fn id(&self) -> &str {
            &self.id
        }

        fn name(&self) -> &str {
            "Stub"
        }

        async fn get_manga_details(&self, manga: &Manga) -> Result<Manga, SourceError> {
            self.details
                .clone()
                .ok_or_else(|| SourceError::NotFound(format!("manga {}", manga.id)))
        }

        async fn get_chapter_list(&self, _manga: &Manga) -> Result<Vec<Chapter>, SourceError> {
            self.chapter_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.chapters.clone())
        }

        async fn get_popular_manga(&self, _page: u32) -> Result<Vec<Manga>, SourceError> {
            Ok(self.details.clone().into_iter().collect())
        }
    }

    pub fn chapter(source_id: &str, manga_id: &str, id: &str, num: f32) -> Chapter {
        Chapter {
            id: id.to_string(),
            source_id: source_id.to_string(),
            manga_id: manga_id.to_string(),
            title: None,
            chapter_num: Some(num),
            volume: None,
            pages: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::StubSource;
    use super::*;

    #[test]
    fn resolve_finds_registered_sources_only() {
        let mut registry = SourceRegistry::new();
        registry.register(Arc::new(StubSource::new("stub")));

        assert!(registry.resolve("stub").is_some());
        assert!(registry.resolve("missing").is_none());
        assert_eq!(registry.ids(), vec!["stub".to_string()]);
    }
}
