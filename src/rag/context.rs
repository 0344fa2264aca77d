use crate::models::enums::DocumentStatus;
use crate::models::Document;

use super::pager::{paginate, CHARS_PER_PAGE};

/// Render every ready document as a delimited, page-labeled block.
///
/// Pages are numbered with the same `CHARS_PER_PAGE` constant the display
/// layer uses, so a `Page: N` citation from the model addresses the same
/// slice of text the user sees on screen. Documents still processing or
/// in error are left out entirely.
pub fn build_document_context(documents: &[Document]) -> String {
    documents
        .iter()
        .filter(|doc| doc.status == DocumentStatus::Ready)
        .map(|doc| {
            let pages: Vec<String> = paginate(&doc.content, CHARS_PER_PAGE)
                .into_iter()
                .enumerate()
                .map(|(i, chunk)| format!("[Page {}]\n{}", i + 1, chunk))
                .collect();
            format!(
                "--- DOCUMENT START: {} ---\n{}\n--- DOCUMENT END: {} ---",
                doc.name,
                pages.join("\n\n"),
                doc.name
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
