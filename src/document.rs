use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// The whole notebook as persisted on disk.
///
/// Missing top-level keys load as empty collections. Keys this version does
/// not know are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Document {
    pub favorites: Vec<String>,
    pub pinned: Vec<String>,
    /// Most recent first.
    pub history: Vec<String>,
    pub general_notes: Vec<Note>,
    pub word_notes: BTreeMap<String, Vec<Note>>,
    pub word_tags: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub text: String,
    #[serde(default)]
    pub important: bool,
    #[serde(default)]
    pub created_at: String,
}

impl Note {
    fn new<Tz: TimeZone>(id: i64, text: &str, important: bool, now: &DateTime<Tz>) -> Self {
        Self {
            id,
            text: text.to_string(),
            important,
            created_at: now.naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }
}

pub fn normalize_tag(raw: &str) -> String {
    raw.split_whitespace()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn sort_notes(notes: &mut [Note]) {
    notes.sort_by(|a, b| b.important.cmp(&a.important).then_with(|| b.id.cmp(&a.id)));
}

impl Document {
    /// Returns whether the word is now a favourite.
    pub fn toggle_favorite(&mut self, word: &str) -> bool {
        toggle_member(&mut self.favorites, word)
    }

    pub fn toggle_pin(&mut self, word: &str) -> bool {
        toggle_member(&mut self.pinned, word)
    }

    pub fn is_favorite(&self, word: &str) -> bool {
        self.favorites.iter().any(|w| w == word)
    }

    pub fn is_pinned(&self, word: &str) -> bool {
        self.pinned.iter().any(|w| w == word)
    }

    /// Moves `word` to the front of the history, dropping any older occurrence.
    pub fn record_search(&mut self, word: &str) {
        self.history.retain(|w| w != word);
        self.history.insert(0, word.to_string());
    }

    pub fn delete_history_entry(&mut self, word: &str) {
        self.history.retain(|w| w != word);
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Blank text is ignored and yields `None`.
    pub fn add_general_note<Tz: TimeZone>(
        &mut self,
        text: &str,
        important: bool,
        now: &DateTime<Tz>,
    ) -> Option<i64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let id = mint_note_id(self.general_notes.iter().map(|note| note.id), now);
        self.general_notes.push(Note::new(id, text, important, now));
        Some(id)
    }

    pub fn delete_general_note(&mut self, id: i64) -> bool {
        let before = self.general_notes.len();
        self.general_notes.retain(|note| note.id != id);
        self.general_notes.len() != before
    }

    pub fn add_word_note<Tz: TimeZone>(
        &mut self,
        word: &str,
        text: &str,
        important: bool,
        now: &DateTime<Tz>,
    ) -> Option<i64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let notes = self.word_notes.entry(word.to_string()).or_default();
        let id = mint_note_id(notes.iter().map(|note| note.id), now);
        notes.push(Note::new(id, text, important, now));
        Some(id)
    }

    /// An emptied list drops the key entirely.
    pub fn delete_word_note(&mut self, word: &str, id: i64) -> bool {
        let Some(notes) = self.word_notes.get_mut(word) else {
            return false;
        };
        let before = notes.len();
        notes.retain(|note| note.id != id);
        let removed = notes.len() != before;
        if notes.is_empty() {
            self.word_notes.remove(word);
        }
        removed
    }

    pub fn sorted_word_notes(&self, word: &str) -> Vec<Note> {
        let mut notes = self.word_notes.get(word).cloned().unwrap_or_default();
        sort_notes(&mut notes);
        notes
    }

    pub fn sorted_general_notes(&self) -> Vec<Note> {
        let mut notes = self.general_notes.clone();
        sort_notes(&mut notes);
        notes
    }

    pub fn add_word_tag(&mut self, word: &str, tag: &str) -> bool {
        let tag = normalize_tag(tag);
        if tag.is_empty() {
            return false;
        }
        let tags = self.word_tags.entry(word.to_string()).or_default();
        if tags.contains(&tag) {
            return false;
        }
        tags.push(tag);
        true
    }

    pub fn tags_for(&self, word: &str) -> &[String] {
        self.word_tags.get(word).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn toggle_member(list: &mut Vec<String>, word: &str) -> bool {
    if let Some(pos) = list.iter().position(|w| w == word) {
        list.remove(pos);
        false
    } else {
        list.push(word.to_string());
        true
    }
}

/// Epoch seconds, bumped past any id already in the collection.
fn mint_note_id<I, Tz>(existing: I, now: &DateTime<Tz>) -> i64
where
    I: IntoIterator<Item = i64>,
    Tz: TimeZone,
{
    let candidate = now.timestamp();
    match existing.into_iter().max() {
        Some(max) if max >= candidate => max + 1,
        _ => candidate,
    }
}
