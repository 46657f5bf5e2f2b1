use crate::document::Document;
use crate::error::NotebookResult;
use crate::persistence::DocumentRepository;
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::debug;

/// Persisted mutations over the notebook document.
///
/// Each call reloads the document, applies one change and saves it before
/// returning. Reads and writes share one lock: a first-run load creates the
/// file, so it must not interleave with an update.
pub struct Notebook {
    repo: Box<dyn DocumentRepository>,
    write_lock: Mutex<()>,
}

impl Notebook {
    pub fn new(repo: impl DocumentRepository + 'static) -> Self {
        Self {
            repo: Box::new(repo),
            write_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> NotebookResult<Document> {
        let _guard = self.write_lock.lock();
        self.repo.load()
    }

    /// Runs `change` as one read-modify-write transaction.
    pub fn update<T>(&self, change: impl FnOnce(&mut Document) -> T) -> NotebookResult<T> {
        let _guard = self.write_lock.lock();
        let mut document = self.repo.load()?;
        let outcome = change(&mut document);
        self.repo.save(&document)?;
        Ok(outcome)
    }

    pub fn toggle_favorite(&self, word: &str) -> NotebookResult<bool> {
        let now_favorite = self.update(|doc| doc.toggle_favorite(word))?;
        debug!(word, now_favorite, "toggled favorite");
        Ok(now_favorite)
    }

    pub fn toggle_pin(&self, word: &str) -> NotebookResult<bool> {
        let now_pinned = self.update(|doc| doc.toggle_pin(word))?;
        debug!(word, now_pinned, "toggled pin");
        Ok(now_pinned)
    }

    pub fn record_search(&self, word: &str) -> NotebookResult<()> {
        if word.trim().is_empty() {
            return Ok(());
        }
        self.update(|doc| doc.record_search(word))
    }

    pub fn add_general_note(&self, text: &str, important: bool) -> NotebookResult<Option<i64>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let now = now();
        self.update(|doc| doc.add_general_note(text, important, &now))
    }

    pub fn delete_general_note(&self, id: i64) -> NotebookResult<bool> {
        self.update(|doc| doc.delete_general_note(id))
    }

    pub fn add_word_note(
        &self,
        word: &str,
        text: &str,
        important: bool,
    ) -> NotebookResult<Option<i64>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let now = now();
        self.update(|doc| doc.add_word_note(word, text, important, &now))
    }

    pub fn delete_word_note(&self, word: &str, id: i64) -> NotebookResult<bool> {
        self.update(|doc| doc.delete_word_note(word, id))
    }

    pub fn add_word_tag(&self, word: &str, tag: &str) -> NotebookResult<bool> {
        if tag.trim().is_empty() {
            return Ok(false);
        }
        self.update(|doc| doc.add_word_tag(word, tag))
    }

    pub fn delete_history_entry(&self, word: &str) -> NotebookResult<()> {
        self.update(|doc| doc.delete_history_entry(word))
    }

    pub fn clear_history(&self) -> NotebookResult<()> {
        self.update(Document::clear_history)
    }
}

fn now() -> DateTime<Local> {
    Local::now()
}
