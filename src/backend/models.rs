use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Progress per chapter id. `0` means unread, anything above is read or partially read.
pub type ReadHistory = HashMap<String, i32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: String,
    pub source_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

impl Manga {
    pub fn new(source_id: impl Into<String>, id: impl Into<String>) -> Self {
        Manga {
            id: id.into(),
            source_id: source_id.into(),
            title: None,
            author: None,
            artist: None,
            status: None,
            description: None,
            cover_url: None,
            tags: None,
        }
    }

    /// Key used by the data store. Ids are only unique within a source.
    pub fn key(&self) -> String {
        format!("{}:{}", self.source_id, self.id)
    }

    /// Merges metadata from a newer fetch of the same manga.
    ///
    /// Identity is kept. Every descriptive field the newer record carries
    /// replaces ours; fields it leaves empty keep their current value.
    pub fn copy_from(&self, newer: &Manga) -> Manga {
        Manga {
            id: self.id.clone(),
            source_id: self.source_id.clone(),
            title: newer.title.clone().or_else(|| self.title.clone()),
            author: newer.author.clone().or_else(|| self.author.clone()),
            artist: newer.artist.clone().or_else(|| self.artist.clone()),
            status: newer.status.clone().or_else(|| self.status.clone()),
            description: newer.description.clone().or_else(|| self.description.clone()),
            cover_url: newer.cover_url.clone().or_else(|| self.cover_url.clone()),
            tags: newer.tags.clone().or_else(|| self.tags.clone()),
        }
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Unknown Title")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub source_id: String,
    pub manga_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub chapter_num: Option<f32>,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub pages: usize,
}

impl Chapter {
    pub fn manga_key(&self) -> String {
        format!("{}:{}", self.source_id, self.manga_id)
    }

    /// "Chapter 12.5" style label, independent of the title.
    pub fn number_label(&self) -> String {
        format!("Chapter {}", self.chapter_num.unwrap_or(0.0))
    }

    /// Title when the source gave one, the number label otherwise.
    pub fn display_title(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => self.number_label(),
        }
    }
}
