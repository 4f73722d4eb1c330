use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use super::error::SourceError;
use super::models::{Chapter, Manga};
use super::source::Source;

const BASE_URL: &str = "https://api.mangadex.org";
const SOURCE_ID: &str = "mangadex";
const PAGE_SIZE: u32 = 20;
/// Largest page the chapter feed endpoint serves.
const FEED_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
struct ChapterResponse {
    data: Vec<ChapterData>,
    #[serde(default)]
    total: usize,
}

#[derive(Debug, Deserialize)]
struct ChapterData {
    id: String,
    attributes: ChapterAttributes,
}

#[derive(Debug, Deserialize)]
struct ChapterAttributes {
    chapter: Option<String>,
    title: Option<String>,
    volume: Option<String>,
    pages: usize,
}

#[derive(Debug, Deserialize)]
struct MangaListResponse {
    data: Vec<MangaData>,
}

#[derive(Debug, Deserialize)]
struct MangaEntityResponse {
    data: MangaData,
}

#[derive(Debug, Deserialize)]
struct MangaData {
    id: String,
    attributes: MangaAttributes,
    #[serde(default)]
    relationships: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct MangaAttributes {
    title: HashMap<String, String>,
    status: Option<String>,
    description: Option<HashMap<String, String>>,
    #[serde(default)]
    tags: Vec<TagData>,
}

#[derive(Debug, Deserialize)]
struct TagData {
    attributes: TagAttributes,
}

#[derive(Debug, Deserialize)]
struct TagAttributes {
    name: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "type")]
    rel_type: String,
    attributes: Option<RelationshipAttributes>,
}

#[derive(Debug, Deserialize)]
struct RelationshipAttributes {
    name: Option<String>,
    #[serde(rename = "fileName")]
    file_name: Option<String>,
}

/// Picks the entry for `language`, then english, then the entry with the smallest key.
fn localized(map: &HashMap<String, String>, language: &str) -> Option<String> {
    map.get(language)
        .or_else(|| map.get("en"))
        .or_else(|| {
            map.iter()
                .min_by_key(|(key, _)| key.as_str())
                .map(|(_, value)| value)
        })
        .filter(|s| !s.trim().is_empty())
        .cloned()
}

fn parse_manga(m: MangaData, language: &str) -> Manga {
    let mut author = None;
    let mut artist = None;
    let mut cover_filename = None;

    for rel in &m.relationships {
        let Some(attrs) = &rel.attributes else {
            continue;
        };
        match rel.rel_type.as_str() {
            "author" => author = attrs.name.clone(),
            "artist" => artist = attrs.name.clone(),
            "cover_art" => cover_filename = attrs.file_name.clone(),
            _ => {}
        }
    }

    let cover_url = cover_filename
        .map(|file| format!("https://uploads.mangadex.org/covers/{}/{}", m.id, file));

    let description = m
        .attributes
        .description
        .as_ref()
        .and_then(|d| localized(d, language));

    let tags: Vec<String> = m
        .attributes
        .tags
        .iter()
        .filter_map(|t| localized(&t.attributes.name, language))
        .collect();

    Manga {
        title: localized(&m.attributes.title, language),
        author,
        artist,
        status: m.attributes.status,
        description,
        cover_url,
        tags: if tags.is_empty() { None } else { Some(tags) },
        id: m.id,
        source_id: SOURCE_ID.to_string(),
    }
}

/// Offset of the next feed page, or `None` once `total` chapters have been seen.
fn next_feed_offset(offset: usize, response: &ChapterResponse) -> Option<usize> {
    let next = offset + response.data.len();
    (!response.data.is_empty() && next < response.total).then_some(next)
}

fn parse_chapters(response: ChapterResponse, manga_id: &str) -> Vec<Chapter> {
    response
        .data
        .into_iter()
        .filter(|c| c.attributes.pages > 0)
        .map(|c| Chapter {
            id: c.id,
            source_id: SOURCE_ID.to_string(),
            manga_id: manga_id.to_string(),
            chapter_num: c.attributes.chapter.as_deref().and_then(|n| n.parse().ok()),
            title: c.attributes.title.filter(|t| !t.trim().is_empty()),
            volume: c.attributes.volume,
            pages: c.attributes.pages,
        })
        .collect()
}

pub struct MangaDex {
    client: reqwest::Client,
    language: String,
}

impl MangaDex {
    pub fn new(user_agent: &str, language: &str) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            language: language.to_string(),
        })
    }
}

#[async_trait]
impl Source for MangaDex {
    fn id(&self) -> &str {
        SOURCE_ID
    }

    fn name(&self) -> &str {
        "MangaDex"
    }

    async fn get_manga_details(&self, manga: &Manga) -> Result<Manga, SourceError> {
        let url = format!(
            "{}/manga/{}?includes[]=author&includes[]=artist&includes[]=cover_art",
            BASE_URL,
            urlencoding::encode(&manga.id)
        );

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound(format!("manga {}", manga.id)));
        }
        let response: MangaEntityResponse = response.error_for_status()?.json().await?;

        Ok(parse_manga(response.data, &self.language))
    }

    async fn get_chapter_list(&self, manga: &Manga) -> Result<Vec<Chapter>, SourceError> {
        let mut chapters = Vec::new();
        let mut offset = 0;

        loop {
            let url = format!(
                "{}/manga/{}/feed?translatedLanguage[]={}&order[chapter]=desc&limit={}&offset={}",
                BASE_URL,
                urlencoding::encode(&manga.id),
                urlencoding::encode(&self.language),
                FEED_LIMIT,
                offset
            );

            let response: ChapterResponse = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let next = next_feed_offset(offset, &response);
            chapters.extend(parse_chapters(response, &manga.id));
            match next {
                Some(next) => offset = next,
                None => break,
            }
        }

        log::debug!("fetched {} chapters for {}", chapters.len(), manga.id);
        Ok(chapters)
    }

    async fn get_popular_manga(&self, page: u32) -> Result<Vec<Manga>, SourceError> {
        let url = format!(
            "{}/manga?includes[]=author&includes[]=artist&includes[]=cover_art&order[followedCount]=desc&limit={}&offset={}",
            BASE_URL,
            PAGE_SIZE,
            page * PAGE_SIZE
        );

        let response: MangaListResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .data
            .into_iter()
            .map(|m| parse_manga(m, &self.language))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANGA_JSON: &str = r#"{
        "data": {
            "id": "a1c7c817",
            "attributes": {
                "title": { "en": "Tower of Stairs" },
                "status": "ongoing",
                "description": { "en": "", "ja": "説明" },
                "tags": [
                    { "attributes": { "name": { "en": "Action" } } },
                    { "attributes": { "name": { "en": "Drama" } } }
                ]
            },
            "relationships": [
                { "type": "author", "attributes": { "name": "Kaede" } },
                { "type": "cover_art", "attributes": { "fileName": "cover.jpg" } },
                { "type": "creator" }
            ]
        }
    }"#;

    const FEED_JSON: &str = r#"{
        "data": [
            { "id": "c2", "attributes": { "chapter": "2.5", "title": "", "volume": "1", "pages": 18 } },
            { "id": "c1", "attributes": { "chapter": "1", "title": "Start", "volume": null, "pages": 22 } },
            { "id": "ext", "attributes": { "chapter": "0", "title": "Official site", "volume": null, "pages": 0 } }
        ],
        "limit": 3,
        "offset": 0,
        "total": 4
    }"#;

    const FEED_LAST_PAGE_JSON: &str = r#"{
        "data": [
            { "id": "c0", "attributes": { "chapter": "0.5", "title": "Prologue", "volume": null, "pages": 9 } }
        ],
        "limit": 3,
        "offset": 3,
        "total": 4
    }"#;

    #[test]
    fn parses_manga_entity() {
        let response: MangaEntityResponse = serde_json::from_str(MANGA_JSON).unwrap();
        let manga = parse_manga(response.data, "en");

        assert_eq!(manga.id, "a1c7c817");
        assert_eq!(manga.source_id, "mangadex");
        assert_eq!(manga.title.as_deref(), Some("Tower of Stairs"));
        assert_eq!(manga.author.as_deref(), Some("Kaede"));
        assert_eq!(manga.artist, None);
        // Blank english description falls through to nothing, not the japanese one.
        assert_eq!(manga.description, None);
        assert_eq!(
            manga.cover_url.as_deref(),
            Some("https://uploads.mangadex.org/covers/a1c7c817/cover.jpg")
        );
        assert_eq!(
            manga.tags,
            Some(vec!["Action".to_string(), "Drama".to_string()])
        );
    }

    #[test]
    fn parses_feed_and_skips_external_chapters() {
        let response: ChapterResponse = serde_json::from_str(FEED_JSON).unwrap();
        let chapters = parse_chapters(response, "a1c7c817");

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].id, "c2");
        assert_eq!(chapters[0].chapter_num, Some(2.5));
        assert_eq!(chapters[0].title, None);
        assert_eq!(chapters[0].manga_id, "a1c7c817");
        assert_eq!(chapters[1].title.as_deref(), Some("Start"));
    }

    #[test]
    fn feed_pages_until_total_is_reached() {
        let first: ChapterResponse = serde_json::from_str(FEED_JSON).unwrap();
        assert_eq!(next_feed_offset(0, &first), Some(3));

        let last: ChapterResponse = serde_json::from_str(FEED_LAST_PAGE_JSON).unwrap();
        assert_eq!(next_feed_offset(3, &last), None);

        let mut chapters = parse_chapters(first, "a1c7c817");
        chapters.extend(parse_chapters(last, "a1c7c817"));
        let ids: Vec<&str> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1", "c0"]);
    }

    #[test]
    fn feed_stops_on_empty_page() {
        let empty: ChapterResponse =
            serde_json::from_str(r#"{ "data": [], "total": 250 }"#).unwrap();
        assert_eq!(next_feed_offset(100, &empty), None);
    }

    #[test]
    fn localized_falls_back_to_smallest_key() {
        let map: HashMap<String, String> = [
            ("ko", "탑"),
            ("ja-ro", "Kaidan no Tou"),
            ("ja", "階段の塔"),
            ("zh", "阶梯之塔"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        assert_eq!(localized(&map, "fr").as_deref(), Some("階段の塔"));
        assert_eq!(localized(&map, "ko").as_deref(), Some("탑"));
    }

    #[tokio::test]
    #[ignore = "talks to api.mangadex.org"]
    async fn test_get_popular_manga() {
        let source = MangaDex::new("manga-reader-tui/0.1.0", "en").unwrap();
        let result = source.get_popular_manga(0).await;
        match &result {
            Ok(_) => {}
            Err(e) => println!("Error: {:?}", e),
        }
        assert!(result.is_ok(), "Failed to fetch popular manga");

        let mangas = result.unwrap();
        assert!(!mangas.is_empty(), "No manga returned");

        let details = source.get_manga_details(&mangas[0]).await.unwrap();
        assert_eq!(details.id, mangas[0].id);
    }
}
