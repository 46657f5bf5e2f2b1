use crate::document::Document;
use crate::error::{NotebookError, NotebookResult};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Loads and saves the single notebook document.
pub trait DocumentRepository: Send + Sync {
    fn load(&self) -> NotebookResult<Document>;
    fn save(&self, document: &Document) -> NotebookResult<()>;
}

impl<R: DocumentRepository + ?Sized> DocumentRepository for Arc<R> {
    fn load(&self) -> NotebookResult<Document> {
        (**self).load()
    }

    fn save(&self, document: &Document) -> NotebookResult<()> {
        (**self).save(document)
    }
}

/// Stores the document as pretty-printed JSON in one file.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_error(&self, source: io::Error) -> NotebookError {
        NotebookError::Read {
            path: self.path.clone(),
            source,
        }
    }

    fn write_error(&self, source: io::Error) -> NotebookError {
        NotebookError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

impl DocumentRepository for JsonFileRepository {
    fn load(&self) -> NotebookResult<Document> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "creating empty notebook");
                let document = Document::default();
                self.save(&document)?;
                return Ok(document);
            }
            Err(err) => return Err(self.read_error(err)),
        };
        serde_json::from_slice(&bytes).map_err(|source| NotebookError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, document: &Document) -> NotebookResult<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|err| self.write_error(err))?;

        let temp = NamedTempFile::new_in(parent).map_err(|err| self.write_error(err))?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            serde_json::to_writer_pretty(&mut writer, document)?;
            writer.flush().map_err(|err| self.write_error(err))?;
        }
        temp.persist(&self.path)
            .map_err(|err| self.write_error(err.error))?;
        debug!(path = %self.path.display(), "notebook saved");
        Ok(())
    }
}

/// Keeps the document in process memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    document: Mutex<Document>,
}

impl MemoryRepository {
    pub fn new(document: Document) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }

    pub fn snapshot(&self) -> Document {
        self.document.lock().clone()
    }
}

impl DocumentRepository for MemoryRepository {
    fn load(&self) -> NotebookResult<Document> {
        Ok(self.document.lock().clone())
    }

    fn save(&self, document: &Document) -> NotebookResult<()> {
        *self.document.lock() = document.clone();
        Ok(())
    }
}
