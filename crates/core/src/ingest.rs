use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::IngestError;
use crate::extractor::{load_document, LopdfExtractor, PdfExtractor};
use crate::indexer::build_index;
use crate::models::{Document, DocumentFingerprint, IngestionOptions};
use crate::store::IndexManifest;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn digest_file(path: &Path) -> Result<String, IngestError> {
    let bytes = fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<Document>,
    pub fingerprints: Vec<DocumentFingerprint>,
    pub skipped_files: Vec<SkippedPdf>,
}

/// Loads every PDF under `folder`, skipping unreadable files. Fails when no readable
/// document remains.
pub fn load_documents<E: PdfExtractor + ?Sized>(
    extractor: &E,
    folder: &Path,
) -> Result<LoadReport, IngestError> {
    if !folder.is_dir() {
        return Err(IngestError::MissingSource(folder.to_path_buf()));
    }

    let files = discover_pdf_files(folder);
    if files.is_empty() {
        return Err(IngestError::NoDocuments(folder.to_path_buf()));
    }

    let mut report = LoadReport::default();
    for path in files {
        let loaded = load_document(extractor, &path)
            .and_then(|document| Ok((build_fingerprint(&document)?, document)));

        match loaded {
            Ok((fingerprint, document)) => {
                report.fingerprints.push(fingerprint);
                report.documents.push(document);
            }
            Err(error) => {
                warn!(path = %path.display(), reason = %error, "skipped pdf");
                report.skipped_files.push(SkippedPdf {
                    path,
                    reason: error.to_string(),
                });
            }
        }
    }

    if report.documents.is_empty() {
        return Err(IngestError::NoDocuments(folder.to_path_buf()));
    }

    Ok(report)
}

fn build_fingerprint(document: &Document) -> Result<DocumentFingerprint, IngestError> {
    let file_name = document
        .path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| IngestError::MissingFileName(document.path.display().to_string()))?;

    Ok(DocumentFingerprint {
        source_path: document.path.to_string_lossy().to_string(),
        file_name: file_name.to_string(),
        checksum: digest_file(&document.path)?,
        page_count: document.pages.len(),
    })
}

#[derive(Debug)]
pub struct IngestionSummary {
    pub manifest: IndexManifest,
    pub pages: usize,
    pub chunks: usize,
    pub skipped_files: Vec<SkippedPdf>,
}

pub async fn ingest_folder(
    source: &Path,
    index_root: &Path,
    embedder: &dyn Embedder,
    options: &IngestionOptions,
) -> Result<IngestionSummary, IngestError> {
    ingest_folder_with(&LopdfExtractor, source, index_root, embedder, options).await
}

/// Load, chunk, then embed-and-persist, logging a checkpoint after each phase.
pub async fn ingest_folder_with<E: PdfExtractor + Sync + ?Sized>(
    extractor: &E,
    source: &Path,
    index_root: &Path,
    embedder: &dyn Embedder,
    options: &IngestionOptions,
) -> Result<IngestionSummary, IngestError> {
    let config = ChunkingConfig::try_from(options)?;

    info!(source = %source.display(), "loading documents");
    let report = load_documents(extractor, source)?;
    let pages = report
        .documents
        .iter()
        .map(|document| document.pages.len())
        .sum::<usize>();
    info!(
        documents = report.documents.len(),
        pages,
        skipped = report.skipped_files.len(),
        "documents loaded"
    );

    let chunks = chunk_documents(&report.documents, config)?;
    info!(
        chunks = chunks.len(),
        max_chars = config.max_chars,
        overlap_chars = config.overlap_chars,
        "chunks created"
    );

    let manifest = build_index(index_root, &chunks, report.fingerprints, embedder, options).await?;

    Ok(IngestionSummary {
        manifest,
        pages,
        chunks: chunks.len(),
        skipped_files: report.skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::extractor::PageText;
    use crate::store::PersistedIndex;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    /// Treats every file as a PDF whose single page is the file's text content.
    struct PlainTextExtractor;

    impl PdfExtractor for PlainTextExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
            let text = fs::read_to_string(path)?;
            if text.starts_with("%PDF") {
                return Err(IngestError::PdfParse("binary pdf".to_string()));
            }
            Ok(vec![PageText { number: 1, text }])
        }
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"ignored"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn checksum_is_reproducible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let file_path = dir.path().join("a.pdf");
        fs::write(&file_path, b"abc")?;

        let first = digest_file(&file_path)?;
        let second = digest_file(&file_path)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn loading_fails_without_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = load_documents(&LopdfExtractor, dir.path());
        match result {
            Err(error @ IngestError::NoDocuments(_)) => {
                assert!(error.to_string().starts_with("no documents found in"));
            }
            other => panic!("expected no documents error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn missing_source_directory_is_reported() {
        let dir = tempdir().unwrap();
        let result = load_documents(&LopdfExtractor, &dir.path().join("data"));
        assert!(matches!(result, Err(IngestError::MissingSource(_))));
    }

    #[test]
    fn unreadable_pdfs_are_skipped() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;
        fs::write(dir.path().join("guide.pdf"), "Sow mustard in October.")?;

        let report = load_documents(&PlainTextExtractor, dir.path())?;

        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.fingerprints[0].file_name, "guide.pdf");
        assert_eq!(report.fingerprints[0].page_count, 1);
        assert_eq!(report.skipped_files.len(), 1);
        assert_eq!(
            report.skipped_files[0]
                .path
                .file_name()
                .and_then(|name| name.to_str()),
            Some("unreadable.pdf")
        );
        Ok(())
    }

    #[test]
    fn all_unreadable_pdfs_means_no_documents() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("unreadable.pdf"), b"%PDF-1.4\n%broken")?;

        let result = load_documents(&LopdfExtractor, dir.path());
        assert!(matches!(result, Err(IngestError::NoDocuments(_))));
        Ok(())
    }

    #[tokio::test]
    async fn ingest_folder_builds_a_loadable_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let source = dir.path().join("data");
        fs::create_dir(&source)?;
        fs::write(
            source.join("guide.pdf"),
            "Rice grows best in monsoon with 100-150cm rainfall",
        )?;
        let index_root = dir.path().join("db");

        let summary = ingest_folder_with(
            &PlainTextExtractor,
            &source,
            &index_root,
            &CharacterNgramEmbedder::default(),
            &IngestionOptions::default(),
        )
        .await?;

        assert_eq!(summary.chunks, 1);
        assert_eq!(summary.manifest.documents.len(), 1);
        let index = PersistedIndex::open(&index_root)?;
        assert_eq!(index.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn ingest_without_pdfs_creates_no_index() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let source = dir.path().join("data");
        fs::create_dir(&source)?;
        let index_root = dir.path().join("db");

        let result = ingest_folder(
            &source,
            &index_root,
            &CharacterNgramEmbedder::default(),
            &IngestionOptions::default(),
        )
        .await;

        assert!(matches!(result, Err(IngestError::NoDocuments(_))));
        assert!(!index_root.exists());
        Ok(())
    }
}
