use crate::error::Error;
use crate::parser::{self, Snippet};
use crate::registry::LanguageSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A document read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub text: String,
}

impl Document {
    pub fn read(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::DocumentRead {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            text,
        })
    }

    pub fn snippets<L: LanguageSet + ?Sized>(&self, languages: &L) -> Vec<Snippet> {
        parser::extract(&self.text, &self.path, languages)
    }
}

/// Every `*.md` file below `root`, sorted by path.
pub fn discover(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "md"))
        .collect();
    found.sort();
    found
}

/// Snippets gathered from several documents, plus the documents that could not be read.
#[derive(Debug, Default)]
pub struct Collection {
    pub snippets: Vec<Snippet>,
    pub errors: Vec<Error>,
}

/// Read each document in order and extract its snippets.
///
/// An unreadable document contributes nothing; its error is kept and the
/// remaining documents are still processed.
pub fn collect<L: LanguageSet + ?Sized>(paths: &[PathBuf], languages: &L) -> Collection {
    let mut collection = Collection::default();
    for path in paths {
        match Document::read(path) {
            Ok(doc) => collection.snippets.extend(doc.snippets(languages)),
            Err(err) => {
                tracing::warn!(error = %err, "skipping document");
                collection.errors.push(err);
            }
        }
    }
    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_collect_recovers_from_unreadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.md");
        let missing = dir.path().join("missing.md");
        let last = dir.path().join("c.md");
        fs::write(&first, "```sh {name=one}\necho 1\n```\n").unwrap();
        fs::write(&last, "```sh {name=two}\necho 2\n```\n").unwrap();

        let collection = collect(&[first.clone(), missing.clone(), last.clone()], &["sh"]);

        let names: Vec<&str> = collection.snippets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["one", "two"]);
        assert_eq!(collection.snippets[1].source, last);
        assert_eq!(collection.errors.len(), 1);
        match &collection.errors[0] {
            Error::DocumentRead { path, .. } => assert_eq!(path, &missing),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_discover_finds_markdown_recursively() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs").join("deep")).unwrap();
        fs::write(dir.path().join("README.md"), "").unwrap();
        fs::write(dir.path().join("docs").join("deep").join("guide.md"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let found = discover(dir.path());

        assert_eq!(
            found,
            vec![
                dir.path().join("README.md"),
                dir.path().join("docs").join("deep").join("guide.md"),
            ]
        );
    }

    #[test]
    fn test_read_missing_document() {
        let res = Document::read(Path::new("/definitely/not/here.md"));
        assert!(matches!(res, Err(Error::DocumentRead { .. })));
    }
}
