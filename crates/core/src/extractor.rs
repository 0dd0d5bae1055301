use crate::chunking::clean_page_text;
use crate::error::IngestError;
use crate::models::Document;
use lopdf::Document as PdfDocument;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number within the source PDF.
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document =
            PdfDocument::load(path).map_err(|error| IngestError::PdfParse(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_no, _page_id) in document.get_pages() {
            let text = document
                .extract_text(&[page_no])
                .map_err(|error| IngestError::PdfParse(error.to_string()))?;
            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        if pages.iter().all(|page| page.text.trim().is_empty()) {
            return Err(IngestError::PdfParse(format!(
                "pdf had no readable page text: {}",
                path.display()
            )));
        }

        Ok(pages)
    }
}

/// Extracts and cleans every page of one PDF. Pages left empty after cleanup are kept
/// so page numbering stays aligned with the source file.
pub fn load_document<E: PdfExtractor + ?Sized>(
    extractor: &E,
    path: &Path,
) -> Result<Document, IngestError> {
    let pages = extractor
        .extract_pages(path)?
        .into_iter()
        .map(|page| {
            Ok(PageText {
                number: page.number,
                text: clean_page_text(&page.text)?,
            })
        })
        .collect::<Result<Vec<_>, IngestError>>()?;

    Ok(Document {
        path: path.to_path_buf(),
        pages,
    })
}
