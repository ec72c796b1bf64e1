//! OpenLibrary metadata provider.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::catalog::MediaKind;
use crate::config::MetadataProviderConfig;

use super::{BookMetadata, IdentifierType, MetadataError, MetadataProvider};

const COVERS_URL: &str = "https://covers.openlibrary.org/b/id";

/// Documents requested per search.
const SEARCH_LIMIT: u32 = 50;

/// Results kept after the language filter.
const MAX_RESULTS: usize = 20;

/// Aliases OpenLibrary uses for common language codes.
const LANGUAGE_ALIASES: &[(&str, &[&str])] = &[
    ("en", &["eng", "en", "english"]),
    ("fr", &["fre", "fr", "french"]),
    ("de", &["ger", "de", "german"]),
    ("es", &["spa", "es", "spanish"]),
    ("it", &["ita", "it", "italian"]),
];

/// OpenLibrary search and works API client.
pub struct OpenLibraryClient {
    client: Client,
    config: MetadataProviderConfig,
    base_url: String,
}

impl OpenLibraryClient {
    pub fn new(config: MetadataProviderConfig) -> Result<Self, MetadataError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MetadataError::ConnectionFailed(e.to_string()))?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> MetadataError {
        if e.is_timeout() {
            MetadataError::Timeout(self.config.timeout_secs)
        } else if e.is_connect() {
            MetadataError::ConnectionFailed(e.to_string())
        } else {
            MetadataError::Protocol(e.to_string())
        }
    }

    async fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Value, MetadataError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let response = check_status(response).await?;
        response
            .json()
            .await
            .map_err(|e| MetadataError::Protocol(format!("invalid JSON: {}", e)))
    }

    fn normalize(&self, doc: &Value) -> Option<BookMetadata> {
        normalize_doc(&self.config.name, doc)
    }
}

async fn check_status(response: Response) -> Result<Response, MetadataError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = body.chars().take(200).collect::<String>();
    Err(match status {
        StatusCode::NOT_FOUND => MetadataError::NotFound(message),
        s if s.is_server_error() => MetadataError::Server {
            status: s.as_u16(),
            message,
        },
        s => MetadataError::Protocol(format!("HTTP {}: {}", s, message)),
    })
}

/// Whether a record language matches the requested code, comparing against
/// known aliases in both directions.
fn language_matches(record: &str, wanted: &str) -> bool {
    let record = record.to_lowercase();
    if record.is_empty() {
        return true;
    }
    let wanted = wanted.to_lowercase();
    let aliases: Vec<&str> = LANGUAGE_ALIASES
        .iter()
        .find(|(code, _)| *code == wanted)
        .map(|(_, aliases)| aliases.to_vec())
        .unwrap_or_else(|| vec![wanted.as_str()]);
    aliases
        .iter()
        .any(|alias| record.contains(alias) || alias.contains(record.as_str()))
}

fn first_string(value: Option<&Value>) -> Option<String> {
    let first = match value? {
        Value::Array(items) => items.iter().find_map(|v| v.as_str()).map(str::to_string),
        Value::String(s) => Some(s.clone()),
        _ => None,
    };
    first.filter(|s| !s.is_empty())
}

/// Text fields come as a string, a list of strings or `{"value": ...}`.
fn text(value: Option<&Value>) -> Option<String> {
    let text = match value? {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(map) => map.get("value")?.as_str()?.to_string(),
        _ => return None,
    };
    Some(text).filter(|t| !t.is_empty())
}

fn publication_date(doc: &Value) -> Option<String> {
    let year = match doc.get("first_publish_year") {
        Some(Value::Number(n)) => n.as_i64(),
        _ => first_string(doc.get("publish_date"))
            .and_then(|d| d.split('-').next().and_then(|y| y.trim().parse().ok())),
    }?;
    Some(format!("{:04}-01-01", year))
}

fn authors(doc: &Value) -> Vec<String> {
    let names: Vec<String> = if let Some(Value::Array(names)) = doc.get("author_name") {
        names.iter().filter_map(|n| n.as_str()).map(str::to_string).collect()
    } else if let Some(Value::Array(authors)) = doc.get("authors") {
        authors
            .iter()
            .filter_map(|a| match a {
                Value::Object(map) => map.get("name").and_then(|n| n.as_str()).map(str::to_string),
                Value::String(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    } else {
        Vec::new()
    };
    names.into_iter().filter(|n| !n.is_empty()).collect()
}

/// Map a search document or works record to [`BookMetadata`].
/// Records without a title are dropped.
fn normalize_doc(provider: &str, doc: &Value) -> Option<BookMetadata> {
    let title = doc.get("title")?.as_str().filter(|t| !t.is_empty())?;

    let provider_id = doc
        .get("key")
        .and_then(|k| k.as_str())
        .unwrap_or_default()
        .replace("/works/", "")
        .replace("/books/", "");

    let mut isbn = None;
    let mut isbn13 = None;
    if let Some(Value::Array(values)) = doc.get("isbn") {
        for value in values.iter().filter_map(|v| v.as_str()) {
            match value.len() {
                10 if isbn.is_none() => isbn = Some(value.to_string()),
                13 if isbn13.is_none() => isbn13 = Some(value.to_string()),
                _ => {}
            }
        }
    }

    let cover_id = doc
        .get("cover_i")
        .and_then(|c| c.as_i64())
        .or_else(|| doc.get("covers")?.as_array()?.first()?.as_i64())
        .filter(|id| *id > 0);

    let page_count = ["number_of_pages_median", "number_of_pages"]
        .iter()
        .find_map(|field| doc.get(*field)?.as_u64())
        .map(|n| n as u32);

    let genres = match doc.get("subject").or_else(|| doc.get("subjects")) {
        Some(Value::Array(subjects)) => subjects
            .iter()
            .filter_map(|s| s.as_str())
            .take(5)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    Some(BookMetadata {
        provider: provider.to_string(),
        provider_id,
        title: title.to_string(),
        authors: authors(doc),
        description: text(doc.get("first_sentence")).or_else(|| text(doc.get("description"))),
        publisher: first_string(doc.get("publisher")),
        publication_date: publication_date(doc),
        cover_url: cover_id.map(|id| format!("{}/{}-L.jpg", COVERS_URL, id)),
        language: first_string(doc.get("language")),
        genres,
        isbn,
        isbn13,
        page_count,
        ..Default::default()
    })
}

#[async_trait]
impl MetadataProvider for OpenLibraryClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn supports(&self, kind: MediaKind) -> bool {
        self.config.supports(kind)
    }

    async fn search(
        &self,
        query: &str,
        kind: MediaKind,
        language: Option<&str>,
    ) -> Result<Vec<BookMetadata>, MetadataError> {
        if !self.supports(kind) {
            return Ok(Vec::new());
        }

        let url = format!("{}/search.json", self.base_url);
        let body = self
            .get_json(
                &url,
                &[("q", query.to_string()), ("limit", SEARCH_LIMIT.to_string())],
            )
            .await?;

        let docs = body
            .get("docs")
            .and_then(|d| d.as_array())
            .ok_or_else(|| MetadataError::Protocol("missing docs array".to_string()))?;

        let results: Vec<BookMetadata> = docs
            .iter()
            .filter_map(|doc| self.normalize(doc))
            .filter(|m| match (language, m.language.as_deref()) {
                (Some(wanted), Some(record)) => language_matches(record, wanted),
                _ => true,
            })
            .take(MAX_RESULTS)
            .collect();

        debug!(
            provider = %self.config.name,
            query = %query,
            docs = docs.len(),
            results = results.len(),
            "Metadata search complete"
        );
        Ok(results)
    }

    async fn fetch_by_identifier(
        &self,
        identifier: &str,
        identifier_type: IdentifierType,
    ) -> Result<Option<BookMetadata>, MetadataError> {
        match identifier_type {
            IdentifierType::OpenlibraryId => {
                let url = format!("{}/works/{}.json", self.base_url, identifier);
                match self.get_json(&url, &[]).await {
                    Ok(body) => Ok(self.normalize(&body)),
                    Err(MetadataError::NotFound(_)) => Ok(None),
                    Err(e) => Err(e),
                }
            }
            IdentifierType::Isbn | IdentifierType::Isbn13 => {
                let query = format!("isbn:{}", identifier);
                let mut results = self.search(&query, MediaKind::Book, None).await?;
                Ok(if results.is_empty() {
                    None
                } else {
                    Some(results.swap_remove(0))
                })
            }
        }
    }

    async fn test_connection(&self) -> bool {
        let url = format!("{}/search.json", self.base_url);
        match self
            .client
            .get(&url)
            .query(&[("q", "test"), ("limit", "1")])
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(provider = %self.config.name, error = %e, "Metadata provider unreachable");
                false
            }
        }
    }
}
