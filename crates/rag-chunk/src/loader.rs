//! Plain-text document loader.
//!
//! Only `.txt` and `.md` files are read. PDFs and other paged formats are not
//! parsed, so every document is a single page 0.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use rag_core::{Document, RagError, Result};

/// File extensions the loader reads. Paged formats such as PDF are not among them.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md"];

/// Load every supported file under `root` (or `root` itself if it is a file).
///
/// Files are visited in sorted path order. Each file becomes one page-0
/// document whose source is the absolute path. Invalid UTF-8 is replaced
/// rather than rejected.
pub fn load_documents(root: &Path) -> Result<Vec<Document>> {
    if !root.exists() {
        return Err(RagError::invalid_argument(format!(
            "path does not exist: {}",
            root.display()
        )));
    }

    let mut files = collect_files(root)?;
    files.sort();

    let mut docs = Vec::with_capacity(files.len());
    for path in files {
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let source = fs::canonicalize(&path)
            .unwrap_or_else(|_| path.clone())
            .to_string_lossy()
            .into_owned();

        docs.push(Document {
            source,
            page: 0,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    debug!(root = %root.display(), documents = docs.len(), "loaded documents");
    Ok(docs)
}

fn collect_files(path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if path.is_file() {
        if is_supported_file(path) {
            files.push(path.to_path_buf());
        }
    } else if path.is_dir() {
        for entry in fs::read_dir(path)? {
            let entry_path = entry?.path();
            if entry_path.is_dir() {
                files.extend(collect_files(&entry_path)?);
            } else if is_supported_file(&entry_path) {
                files.push(entry_path);
            }
        }
    }

    Ok(files)
}

fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_supported_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.md"), "# B").unwrap();
        fs::write(dir.path().join("a.txt"), "alpha").unwrap();
        fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();
        fs::write(dir.path().join("report.pdf"), "%PDF-1.4").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.TXT"), "gamma").unwrap();

        let docs = load_documents(dir.path()).unwrap();

        assert_eq!(docs.len(), 3);
        assert!(docs[0].source.ends_with("a.txt"));
        assert!(docs[1].source.ends_with("b.md"));
        assert!(docs[2].source.ends_with("c.TXT"));
        assert!(docs.iter().all(|d| d.page == 0));
        assert!(docs.iter().all(|d| Path::new(&d.source).is_absolute()));
    }

    #[test]
    fn test_lossy_utf8() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), [b'o', b'k', 0xff, b'!']).unwrap();

        let docs = load_documents(dir.path()).unwrap();
        assert_eq!(docs.len(), 1);
        assert!(docs[0].text.starts_with("ok"));
        assert!(docs[0].text.ends_with('!'));
    }

    #[test]
    fn test_missing_root() {
        let err = load_documents(Path::new("/definitely/not/here")).unwrap_err();
        assert!(err.is_input_error());
    }
}
