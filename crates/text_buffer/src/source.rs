//! Where documents come from and go to.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub name: String,
    pub len: u64,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

/// Storage a document can be read from and written to.
pub trait DocumentSource {
    fn read(&self) -> io::Result<Box<dyn Read + '_>>;

    /// Truncates the document and returns a writer for its new content.
    fn write(&mut self) -> io::Result<Box<dyn Write + '_>>;

    /// Entries below this source, empty when it is not a directory.
    fn list(&self) -> io::Result<Vec<DocumentMetadata>>;

    fn metadata(&self) -> io::Result<DocumentMetadata>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct FsDocument {
    path: PathBuf,
}

impl FsDocument {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn metadata_of(path: &Path, meta: &fs::Metadata) -> DocumentMetadata {
    DocumentMetadata {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        len: meta.len(),
        is_dir: meta.is_dir(),
        modified: meta.modified().ok(),
    }
}

impl DocumentSource for FsDocument {
    fn read(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(BufReader::new(File::open(&self.path)?)))
    }

    fn write(&mut self) -> io::Result<Box<dyn Write + '_>> {
        Ok(Box::new(BufWriter::new(File::create(&self.path)?)))
    }

    fn list(&self) -> io::Result<Vec<DocumentMetadata>> {
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            entries.push(metadata_of(&entry.path(), &entry.metadata()?));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn metadata(&self) -> io::Result<DocumentMetadata> {
        Ok(metadata_of(&self.path, &fs::metadata(&self.path)?))
    }
}

/// A document held in memory, e.g. a new untitled one.
#[derive(Debug, Clone, Default)]
pub struct MemoryDocument {
    name: String,
    content: Vec<u8>,
}

impl MemoryDocument {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }
}

impl DocumentSource for MemoryDocument {
    fn read(&self) -> io::Result<Box<dyn Read + '_>> {
        Ok(Box::new(Cursor::new(self.content.as_slice())))
    }

    fn write(&mut self) -> io::Result<Box<dyn Write + '_>> {
        self.content.clear();
        Ok(Box::new(&mut self.content))
    }

    fn list(&self) -> io::Result<Vec<DocumentMetadata>> {
        Ok(Vec::new())
    }

    fn metadata(&self) -> io::Result<DocumentMetadata> {
        Ok(DocumentMetadata {
            name: self.name.clone(),
            len: self.content.len() as u64,
            is_dir: false,
            modified: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_document_round_trip() {
        let mut doc = MemoryDocument::new("scratch", "old content");
        {
            let mut writer = doc.write().unwrap();
            writer.write_all(b"new").unwrap();
        }
        let mut text = String::new();
        doc.read().unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "new");

        let meta = doc.metadata().unwrap();
        assert_eq!(meta.name, "scratch");
        assert_eq!(meta.len, 3);
        assert!(doc.list().unwrap().is_empty());
    }

    #[test]
    fn fs_document_lists_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "bb").unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = FsDocument::new(dir.path()).list().unwrap();
        let names: Vec<&str> = listing.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
        assert_eq!(listing[1].len, 2);
        assert!(listing[2].is_dir);

        let file = FsDocument::new(dir.path().join("a.txt"));
        assert!(file.list().unwrap().is_empty());
        assert!(!file.metadata().unwrap().is_dir);
    }
}
