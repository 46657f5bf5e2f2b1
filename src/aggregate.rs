//! Composite views derived from the notebook document.

use crate::dictionary::{Dictionary, LookupResult};
use crate::document::{Document, Note};
use crate::error::NotebookResult;
use crate::languages::{language_from_tags, language_label, resolve_language};
use crate::store::Notebook;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

pub const RECENT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCandidate {
    pub word: &'static str,
    pub language: &'static str,
}

const fn candidate(word: &'static str, language: &'static str) -> DailyCandidate {
    DailyCandidate { word, language }
}

pub const GENERAL_DAILY_WORDS: &[DailyCandidate] = &[
    candidate("sattva", "sa"),
    candidate("tamas", "sa"),
    candidate("rajas", "sa"),
    candidate("śiva", "sa"),
    candidate("dharma", "sa"),
    candidate("karma", "sa"),
    candidate("bhakti", "sa"),
    candidate("śānti", "sa"),
    candidate("serene", "en"),
    candidate("benevolent", "en"),
    candidate("gratitude", "en"),
    candidate("सत्य", "hi"),
    candidate("शक्ति", "hi"),
    candidate("அன்பு", "ta"),
    candidate("அருள்", "ta"),
];

/// Shares no words with the general list.
pub const STUDY_DAILY_WORDS: &[DailyCandidate] = &[
    candidate("ahiṃsā", "sa"),
    candidate("satya", "sa"),
    candidate("mokṣa", "sa"),
    candidate("prāṇa", "sa"),
    candidate("yoga", "sa"),
    candidate("guru", "sa"),
    candidate("mantra", "sa"),
    candidate("ātman", "sa"),
    candidate("saṃsāra", "sa"),
    candidate("vidyā", "sa"),
];

pub fn day_index(date: NaiveDate, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let day_number = date.num_days_from_ce() as i64;
    Some(day_number.rem_euclid(len as i64) as usize)
}

pub fn pick_of_the_day(words: &[DailyCandidate], date: NaiveDate) -> Option<DailyCandidate> {
    day_index(date, words.len()).map(|index| words[index])
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyWord {
    pub word: String,
    pub language_code: String,
    pub language_label: String,
    pub short_definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyPicks {
    pub general: Option<DailyWord>,
    pub study: Option<DailyWord>,
}

async fn enrich_pick(dictionary: &dyn Dictionary, pick: DailyCandidate) -> DailyWord {
    DailyWord {
        word: pick.word.to_string(),
        language_code: pick.language.to_string(),
        language_label: language_label(pick.language).to_string(),
        short_definition: dictionary.short_definition(pick.word, pick.language).await,
    }
}

pub async fn words_of_the_day(dictionary: &dyn Dictionary, date: NaiveDate) -> DailyPicks {
    let general = match pick_of_the_day(GENERAL_DAILY_WORDS, date) {
        Some(pick) => Some(enrich_pick(dictionary, pick).await),
        None => None,
    };
    let study = match pick_of_the_day(STUDY_DAILY_WORDS, date) {
        Some(pick) => Some(enrich_pick(dictionary, pick).await),
        None => None,
    };
    DailyPicks { general, study }
}

pub fn known_words(doc: &Document) -> Vec<String> {
    let mut words: BTreeSet<&str> = BTreeSet::new();
    words.extend(doc.history.iter().map(String::as_str));
    words.extend(doc.favorites.iter().map(String::as_str));
    words.extend(doc.pinned.iter().map(String::as_str));
    words.extend(doc.word_notes.keys().map(String::as_str));
    words.extend(doc.word_tags.keys().map(String::as_str));
    words.into_iter().map(str::to_string).collect()
}

pub fn tag_vocabulary(doc: &Document) -> Vec<String> {
    doc.word_tags
        .values()
        .flatten()
        .map(String::as_str)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn words_with_tag(doc: &Document, tag: &str) -> Vec<String> {
    known_words(doc)
        .into_iter()
        .filter(|word| doc.tags_for(word).iter().any(|t| t == tag))
        .collect()
}

/// Language a stored word was most likely looked up in, read from its tags.
pub fn guessed_language(doc: &Document, word: &str) -> &'static str {
    language_from_tags(doc.tags_for(word))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordListing {
    pub word: String,
    pub language_code: String,
    pub tags: Vec<String>,
    pub short_definition: Option<String>,
    pub is_favorite: bool,
    pub is_pinned: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordsPage {
    pub tags: Vec<String>,
    pub selected_tag: Option<String>,
    pub words: Vec<WordListing>,
}

/// A mis-tagged word may come back without a definition.
pub async fn list_words(
    doc: &Document,
    dictionary: &dyn Dictionary,
    selected_tag: Option<&str>,
) -> WordsPage {
    let selected_tag = selected_tag.filter(|tag| !tag.is_empty());
    let words = match selected_tag {
        Some(tag) => words_with_tag(doc, tag),
        None => known_words(doc),
    };
    let mut listings = Vec::with_capacity(words.len());
    for word in words {
        let tags = doc.tags_for(&word).to_vec();
        let language_code = guessed_language(doc, &word);
        let short_definition = dictionary.short_definition(&word, language_code).await;
        listings.push(WordListing {
            is_favorite: doc.is_favorite(&word),
            is_pinned: doc.is_pinned(&word),
            language_code: language_code.to_string(),
            short_definition,
            tags,
            word,
        });
    }
    WordsPage {
        tags: tag_vocabulary(doc),
        selected_tag: selected_tag.map(str::to_string),
        words: listings,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordView {
    pub word: String,
    /// Language as requested, before `all` is downgraded.
    pub language: String,
    pub info: Option<LookupResult>,
    pub is_favorite: bool,
    pub is_pinned: bool,
    pub notes: Vec<Note>,
    pub tags: Vec<String>,
}

impl WordView {
    fn from_document(doc: &Document, word: &str, language: &str, info: Option<LookupResult>) -> Self {
        Self {
            word: word.to_string(),
            language: language.to_string(),
            info,
            is_favorite: doc.is_favorite(word),
            is_pinned: doc.is_pinned(word),
            notes: doc.sorted_word_notes(word),
            tags: doc.tags_for(word).to_vec(),
        }
    }
}

/// Looks a word up, records it in history and auto-tags it with the language name.
///
/// History and the tag are written even when the lookup finds nothing. A blank
/// word is a no-op and yields `None`.
pub async fn search_word(
    notebook: &Notebook,
    dictionary: &dyn Dictionary,
    word: &str,
    language: &str,
) -> NotebookResult<Option<WordView>> {
    let word = word.trim();
    if word.is_empty() {
        return Ok(None);
    }
    let language = match language.trim() {
        "" => crate::languages::DEFAULT_LANGUAGE,
        code => code,
    };
    let lookup_code = resolve_language(language);
    let info = dictionary.lookup(word, lookup_code).await;
    let auto_tag = language_label(lookup_code).to_lowercase();
    let doc = notebook.update(|doc| {
        doc.record_search(word);
        doc.add_word_tag(word, &auto_tag);
        doc.clone()
    })?;
    Ok(Some(WordView::from_document(&doc, word, language, info)))
}

pub fn word_view(doc: &Document, word: &str, language: &str) -> WordView {
    WordView::from_document(doc, word, language, None)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeView {
    pub history: Vec<String>,
    pub favorites: Vec<String>,
    pub pinned: Vec<String>,
    pub picks: DailyPicks,
}

pub async fn home_view(doc: &Document, dictionary: &dyn Dictionary, date: NaiveDate) -> HomeView {
    HomeView {
        history: doc
            .history
            .iter()
            .take(RECENT_HISTORY_LIMIT)
            .cloned()
            .collect(),
        favorites: doc.favorites.clone(),
        pinned: doc.pinned.clone(),
        picks: words_of_the_day(dictionary, date).await,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordNoteHit {
    pub word: String,
    pub note: Note,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagHit {
    pub word: String,
    pub tag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub words: Vec<String>,
    pub general_notes: Vec<Note>,
    pub word_notes: Vec<WordNoteHit>,
    pub tags: Vec<TagHit>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
            && self.general_notes.is_empty()
            && self.word_notes.is_empty()
            && self.tags.is_empty()
    }
}

/// Case-insensitive substring search over words, notes and tags.
///
/// A blank query returns `None` (nothing searched), which is distinct from
/// `Some` with every group empty (searched, nothing matched).
pub fn search_all(doc: &Document, query: &str) -> Option<SearchResults> {
    let query = query.trim();
    if query.is_empty() {
        return None;
    }
    let needle = query.to_lowercase();
    let needle = needle.as_str();

    let words = known_words(doc)
        .into_iter()
        .filter(|word| contains_folded(word, needle))
        .collect();
    let general_notes = doc
        .general_notes
        .iter()
        .filter(|note| contains_folded(&note.text, needle))
        .cloned()
        .collect();
    let word_notes = doc
        .word_notes
        .iter()
        .flat_map(|(word, notes)| {
            notes
                .iter()
                .filter(move |note| contains_folded(&note.text, needle))
                .map(move |note| WordNoteHit {
                    word: word.clone(),
                    note: note.clone(),
                })
        })
        .collect();
    let tags = doc
        .word_tags
        .iter()
        .flat_map(|(word, tags)| {
            tags.iter()
                .filter(move |tag| contains_folded(tag, needle))
                .map(move |tag| TagHit {
                    word: word.clone(),
                    tag: tag.clone(),
                })
        })
        .collect();

    Some(SearchResults {
        query: query.to_string(),
        words,
        general_notes,
        word_notes,
        tags,
    })
}

fn contains_folded(text: &str, needle: &str) -> bool {
    text.to_lowercase().contains(needle)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackupSummary {
    pub favorites: usize,
    pub pinned: usize,
    pub history: usize,
    pub general_notes: usize,
    pub word_notes: usize,
    pub noted_words: usize,
    pub tagged_words: usize,
}

impl BackupSummary {
    pub fn of(doc: &Document) -> Self {
        Self {
            favorites: doc.favorites.len(),
            pinned: doc.pinned.len(),
            history: doc.history.len(),
            general_notes: doc.general_notes.len(),
            word_notes: doc.word_notes.values().map(Vec::len).sum(),
            noted_words: doc.word_notes.len(),
            tagged_words: doc.word_tags.values().filter(|tags| !tags.is_empty()).count(),
        }
    }
}

/// Unknown top-level keys are included.
pub fn export_json(doc: &Document) -> serde_json::Result<String> {
    serde_json::to_string_pretty(doc)
}

pub fn export_text(doc: &Document) -> String {
    let mut out = String::new();
    out.push_str("Vocabulary notebook backup\n");

    write_word_section(&mut out, "Favourites", &doc.favorites);
    write_word_section(&mut out, "Pinned", &doc.pinned);
    write_word_section(&mut out, "History", &doc.history);

    section_heading(&mut out, "General notes");
    if doc.general_notes.is_empty() {
        out.push_str("(none)\n");
    }
    for note in &doc.general_notes {
        write_note_line(&mut out, "", note);
    }

    section_heading(&mut out, "Word notes");
    if doc.word_notes.is_empty() {
        out.push_str("(none)\n");
    }
    for (word, notes) in &doc.word_notes {
        let _ = writeln!(out, "{word}:");
        for note in notes {
            write_note_line(&mut out, "  ", note);
        }
    }

    section_heading(&mut out, "Word tags");
    let mut any_tags = false;
    for (word, tags) in doc.word_tags.iter().filter(|(_, tags)| !tags.is_empty()) {
        any_tags = true;
        let _ = writeln!(out, "{word}: {}", tags.join(", "));
    }
    if !any_tags {
        out.push_str("(none)\n");
    }
    out
}

fn section_heading(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n== {title} ==");
}

fn write_word_section(out: &mut String, title: &str, words: &[String]) {
    section_heading(out, title);
    if words.is_empty() {
        out.push_str("(none)\n");
    }
    for word in words {
        let _ = writeln!(out, "- {word}");
    }
}

fn write_note_line(out: &mut String, indent: &str, note: &Note) {
    let marker = if note.important { "[!] " } else { "" };
    let _ = writeln!(out, "{indent}- {marker}{} ({})", note.text, note.created_at);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::Definition;
    use crate::persistence::MemoryRepository;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    /// Answers lookups from a fixed table and records every query.
    #[derive(Default)]
    struct StaticDictionary {
        entries: HashMap<(String, String), String>,
        calls: Mutex<Vec<(String, String)>>,
    }

    impl StaticDictionary {
        fn with(mut self, word: &str, code: &str, definition: &str) -> Self {
            self.entries
                .insert((word.to_string(), code.to_string()), definition.to_string());
            self
        }
    }

    #[async_trait]
    impl Dictionary for StaticDictionary {
        async fn lookup(&self, word: &str, language_code: &str) -> Option<LookupResult> {
            self.calls
                .lock()
                .push((word.to_string(), language_code.to_string()));
            let definition = self
                .entries
                .get(&(word.to_string(), language_code.to_string()))?;
            Some(LookupResult {
                word: word.to_string(),
                definitions: vec![Definition {
                    part_of_speech: "noun".into(),
                    definition: definition.clone(),
                    language_code: Some(language_code.to_string()),
                    language_name: None,
                }],
                examples: Vec::new(),
                synonyms: Vec::new(),
                translations: Vec::new(),
                source_url: None,
            })
        }
    }

    fn stamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn sample() -> Document {
        let mut doc = Document::default();
        doc.record_search("serene");
        doc.record_search("karma");
        doc.toggle_favorite("gratitude");
        doc.toggle_pin("dharma");
        doc.add_general_note("Review Sanskrit verbs", true, &stamp());
        doc.add_word_note("tamas", "Opposite of sattva", false, &stamp());
        doc.add_word_tag("karma", "Sanskrit");
        doc.add_word_tag("amour", "french");
        doc
    }

    #[test]
    fn day_index_is_ordinal_mod_len() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let ordinal = date.num_days_from_ce() as usize;
        assert_eq!(day_index(date, 5), Some(ordinal % 5));
        assert_eq!(day_index(date, 0), None);
    }

    #[test]
    fn dates_five_days_apart_share_a_pick() {
        let words = &GENERAL_DAILY_WORDS[..5];
        let first = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let later = first + chrono::Duration::days(5);
        assert_eq!(pick_of_the_day(words, first), pick_of_the_day(words, later));
        assert_ne!(
            pick_of_the_day(words, first),
            pick_of_the_day(words, first + chrono::Duration::days(1))
        );
    }

    #[test]
    fn daily_lists_are_disjoint() {
        for study in STUDY_DAILY_WORDS {
            assert!(GENERAL_DAILY_WORDS.iter().all(|w| w.word != study.word));
            assert_eq!(study.language, "sa");
        }
    }

    #[tokio::test]
    async fn daily_picks_carry_label_and_definition() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let general = pick_of_the_day(GENERAL_DAILY_WORDS, date).unwrap();
        let dictionary = StaticDictionary::default().with(general.word, general.language, "a meaning");
        let picks = words_of_the_day(&dictionary, date).await;

        let general_pick = picks.general.unwrap();
        assert_eq!(general_pick.word, general.word);
        assert_eq!(general_pick.language_label, language_label(general.language));
        assert_eq!(general_pick.short_definition.as_deref(), Some("a meaning"));

        let study_pick = picks.study.unwrap();
        assert_eq!(study_pick.language_label, "Sanskrit");
        assert_eq!(study_pick.short_definition, None);
    }

    #[test]
    fn known_words_union_is_sorted() {
        let doc = sample();
        assert_eq!(
            known_words(&doc),
            vec!["amour", "dharma", "gratitude", "karma", "serene", "tamas"]
        );
    }

    #[test]
    fn word_drops_out_when_last_note_removed() {
        let mut doc = sample();
        let id = doc.word_notes["tamas"][0].id;
        doc.delete_word_note("tamas", id);
        assert!(!known_words(&doc).contains(&"tamas".to_string()));
    }

    #[test]
    fn tag_vocabulary_and_filter() {
        let mut doc = sample();
        doc.add_word_tag("serene", "english");
        doc.add_word_tag("karma", "english");
        assert_eq!(tag_vocabulary(&doc), vec!["english", "french", "sanskrit"]);
        assert_eq!(words_with_tag(&doc, "english"), vec!["karma", "serene"]);
        assert!(words_with_tag(&doc, "English").is_empty());
    }

    #[tokio::test]
    async fn listing_infers_language_from_tags() {
        let doc = sample();
        let dictionary = StaticDictionary::default()
            .with("karma", "sa", "action")
            .with("amour", "fr", "love");
        let page = list_words(&doc, &dictionary, None).await;
        assert_eq!(page.words.len(), 6);

        let karma = page.words.iter().find(|w| w.word == "karma").unwrap();
        assert_eq!(karma.language_code, "sa");
        assert_eq!(karma.short_definition.as_deref(), Some("action"));

        let tamas = page.words.iter().find(|w| w.word == "tamas").unwrap();
        assert_eq!(tamas.language_code, "en");
        assert_eq!(tamas.short_definition, None);

        let filtered = list_words(&doc, &dictionary, Some("french")).await;
        assert_eq!(filtered.selected_tag.as_deref(), Some("french"));
        assert_eq!(filtered.words.len(), 1);
        assert_eq!(filtered.words[0].short_definition.as_deref(), Some("love"));
    }

    #[tokio::test]
    async fn search_records_history_and_auto_tags_even_when_not_found() {
        let notebook = Notebook::new(MemoryRepository::default());
        let dictionary = StaticDictionary::default();
        let view = search_word(&notebook, &dictionary, " śānti ", "sa")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.word, "śānti");
        assert_eq!(view.info, None);
        assert_eq!(view.tags, vec!["sanskrit"]);

        search_word(&notebook, &dictionary, "śānti", "sa").await.unwrap();
        let doc = notebook.load().unwrap();
        assert_eq!(doc.history, vec!["śānti"]);
        assert_eq!(doc.tags_for("śānti"), ["sanskrit"]);
    }

    #[tokio::test]
    async fn all_languages_is_looked_up_in_default() {
        let notebook = Notebook::new(MemoryRepository::default());
        let dictionary = StaticDictionary::default().with("serene", "en", "calm");
        let view = search_word(&notebook, &dictionary, "serene", "all")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(view.language, "all");
        assert!(view.info.is_some());
        assert_eq!(view.tags, vec!["english"]);
        assert_eq!(
            dictionary.calls.lock().as_slice(),
            [("serene".to_string(), "en".to_string())]
        );
    }

    #[tokio::test]
    async fn blank_search_is_noop() {
        let notebook = Notebook::new(MemoryRepository::default());
        let dictionary = StaticDictionary::default();
        assert_eq!(search_word(&notebook, &dictionary, "  ", "en").await.unwrap(), None);
        assert!(dictionary.calls.lock().is_empty());
        assert_eq!(notebook.load().unwrap(), Document::default());
    }

    #[tokio::test]
    async fn home_truncates_history() {
        let mut doc = Document::default();
        for i in 0..25 {
            doc.record_search(&format!("w{i}"));
        }
        let view = home_view(&doc, &StaticDictionary::default(), stamp().date_naive()).await;
        assert_eq!(view.history.len(), RECENT_HISTORY_LIMIT);
        assert_eq!(view.history[0], "w24");
        assert!(view.picks.general.is_some());
    }

    #[test]
    fn search_all_distinguishes_blank_from_no_match() {
        let doc = sample();
        assert_eq!(search_all(&doc, ""), None);
        assert_eq!(search_all(&doc, "   "), None);
        let results = search_all(&doc, "xyz-no-match").unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn search_all_fills_each_group() {
        let doc = sample();
        let results = search_all(&doc, "SANSKRIT").unwrap();
        assert!(results.words.is_empty());
        assert_eq!(results.general_notes.len(), 1);
        assert!(results.word_notes.is_empty());
        assert_eq!(
            results.tags,
            vec![TagHit {
                word: "karma".into(),
                tag: "sanskrit".into()
            }]
        );

        let results = search_all(&doc, "tam").unwrap();
        assert_eq!(results.words, vec!["tamas"]);

        let results = search_all(&doc, "sattva").unwrap();
        assert_eq!(results.word_notes.len(), 1);
        assert_eq!(results.word_notes[0].word, "tamas");
    }

    #[test]
    fn text_export_keeps_section_order() {
        let mut doc = sample();
        doc.word_tags.insert("empty".into(), Vec::new());
        let text = export_text(&doc);
        let positions: Vec<_> = [
            "== Favourites ==",
            "== Pinned ==",
            "== History ==",
            "== General notes ==",
            "== Word notes ==",
            "== Word tags ==",
        ]
        .iter()
        .map(|heading| text.find(heading).expect(heading))
        .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(text.contains("- [!] Review Sanskrit verbs"));
        assert!(text.contains("tamas:\n  - Opposite of sattva"));
        assert!(text.contains("karma: sanskrit"));
        assert!(!text.contains("empty:"));
    }

    #[test]
    fn empty_export_marks_sections() {
        let text = export_text(&Document::default());
        assert_eq!(text.matches("(none)").count(), 6);
    }

    #[test]
    fn json_export_is_the_document() {
        let mut doc = sample();
        doc.extra
            .insert("settings".into(), serde_json::json!({ "theme": "dark" }));
        let json = export_json(&doc).unwrap();
        let parsed: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
        assert!(json.contains("\"settings\""));
    }

    #[test]
    fn guessed_language_follows_tags() {
        let doc = sample();
        assert_eq!(guessed_language(&doc, "karma"), "sa");
        assert_eq!(guessed_language(&doc, "amour"), "fr");
        assert_eq!(guessed_language(&doc, "serene"), "en");
    }

    #[test]
    fn backup_summary_counts() {
        let summary = BackupSummary::of(&sample());
        assert_eq!(summary.history, 2);
        assert_eq!(summary.word_notes, 1);
        assert_eq!(summary.tagged_words, 2);
    }
}
