use async_trait::async_trait;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_DICTIONARY_URL: &str = "https://freedictionaryapi.com/api/v1/entries";
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// A word lookup against some dictionary backend.
///
/// `None` covers every way a lookup can come back empty: the word is unknown,
/// the service is unreachable, or the response is unusable.
#[async_trait]
pub trait Dictionary: Send + Sync {
    async fn lookup(&self, word: &str, language_code: &str) -> Option<LookupResult>;

    /// First definition text, for compact listings.
    async fn short_definition(&self, word: &str, language_code: &str) -> Option<String> {
        self.lookup(word, language_code)
            .await
            .and_then(|info| info.definitions.into_iter().next())
            .map(|definition| definition.definition)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupResult {
    pub word: String,
    pub definitions: Vec<Definition>,
    pub examples: Vec<String>,
    pub synonyms: Vec<String>,
    pub translations: Vec<Translation>,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub part_of_speech: String,
    pub definition: String,
    pub language_code: Option<String>,
    pub language_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub language_code: Option<String>,
    pub language_name: Option<String>,
    pub word: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApiResponse {
    word: Option<String>,
    entries: Vec<ApiEntry>,
    source: Option<ApiSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ApiEntry {
    language: ApiLanguage,
    part_of_speech: String,
    synonyms: Vec<String>,
    senses: Vec<ApiSense>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiLanguage {
    code: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiSense {
    definition: String,
    examples: Vec<String>,
    synonyms: Vec<String>,
    translations: Vec<ApiTranslation>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiTranslation {
    language: ApiLanguage,
    word: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiSource {
    url: Option<String>,
}

impl LookupResult {
    /// Flattens an API response. Yields `None` when no sense carries a definition slot.
    pub fn from_response(response: ApiResponse, requested: &str) -> Option<Self> {
        let mut definitions = Vec::new();
        let mut examples = Vec::new();
        let mut synonyms = Vec::new();
        let mut seen_synonyms = HashSet::new();
        let mut translations = Vec::new();

        let mut push_synonym = |synonym: String| {
            if seen_synonyms.insert(synonym.clone()) {
                synonyms.push(synonym);
            }
        };

        for entry in response.entries {
            for synonym in entry.synonyms {
                push_synonym(synonym);
            }
            for sense in entry.senses {
                definitions.push(Definition {
                    part_of_speech: entry.part_of_speech.clone(),
                    definition: sense.definition,
                    language_code: entry.language.code.clone(),
                    language_name: entry.language.name.clone(),
                });
                examples.extend(sense.examples);
                for synonym in sense.synonyms {
                    push_synonym(synonym);
                }
                translations.extend(sense.translations.into_iter().map(|t| Translation {
                    language_code: t.language.code,
                    language_name: t.language.name,
                    word: t.word,
                }));
            }
        }

        if definitions.is_empty() {
            return None;
        }
        Some(Self {
            word: response.word.unwrap_or_else(|| requested.to_string()),
            definitions,
            examples,
            synonyms,
            translations,
            source_url: response.source.and_then(|source| source.url),
        })
    }
}

#[derive(Debug, Error)]
enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(StatusCode),
}

/// HTTP client for the Free Dictionary API.
#[derive(Debug, Clone)]
pub struct FreeDictionaryClient {
    http: Client,
    base_url: String,
}

impl FreeDictionaryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn entry_url(&self, word: &str, language_code: &str) -> String {
        format!(
            "{}/{}/{}?translations=true",
            self.base_url,
            utf8_percent_encode(language_code, NON_ALPHANUMERIC),
            utf8_percent_encode(word, NON_ALPHANUMERIC)
        )
    }

    async fn fetch(&self, word: &str, language_code: &str) -> Result<ApiResponse, LookupError> {
        let response = self.http.get(self.entry_url(word, language_code)).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(LookupError::Status(status));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Dictionary for FreeDictionaryClient {
    async fn lookup(&self, word: &str, language_code: &str) -> Option<LookupResult> {
        match self.fetch(word, language_code).await {
            Ok(response) => {
                let result = LookupResult::from_response(response, word);
                debug!(word, language_code, found = result.is_some(), "dictionary lookup");
                result
            }
            Err(err) => {
                warn!(word, language_code, error = %err, "dictionary lookup failed");
                None
            }
        }
    }
}
