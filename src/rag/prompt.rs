use crate::models::Document;

use super::context::build_document_context;

pub const RAG_SYSTEM_PROMPT: &str = r#"You are an intelligent RAG (Retrieval Augmented Generation) assistant.
You have access to a set of documents provided below.

INSTRUCTIONS:
1. Answer the user's question based PRIMARILY on the provided documents.
2. If the answer is found in the documents, cite the source using the strict format: [Source: filename.ext, Page: X].
   - If it spans multiple pages, use [Source: filename.ext, Page: X-Y].
   - If page number is uncertain, use [Source: filename.ext].
3. If the answer is not in the documents, you may use your general knowledge but clearly state that it's not from the uploaded files.
4. Be concise, professional, and helpful.
5. Format your response in Markdown."#;

/// Build the full system instruction: citation rules plus the paginated
/// content of every ready document.
pub fn build_system_instruction(documents: &[Document]) -> String {
    format!(
        "{RAG_SYSTEM_PROMPT}\n\nDOCUMENTS:\n{}",
        build_document_context(documents)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::enums::DocumentStatus;
    use chrono::Local;
    use uuid::Uuid;

    fn make_document(name: &str, content: &str) -> Document {
        Document {
            id: Uuid::new_v4(),
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            content: content.to_string(),
            size_bytes: content.len() as i64,
            status: DocumentStatus::Ready,
            uploaded_at: Local::now().naive_local(),
        }
    }

    #[test]
    fn system_prompt_specifies_citation_format() {
        assert!(RAG_SYSTEM_PROMPT.contains("[Source: filename.ext, Page: X]"));
        assert!(RAG_SYSTEM_PROMPT.contains("Page: X-Y"));
        assert!(RAG_SYSTEM_PROMPT.contains("Markdown"));
    }

    #[test]
    fn instruction_embeds_paginated_documents() {
        let docs = vec![make_document("guide.md", "contents here")];
        let instruction = build_system_instruction(&docs);
        assert!(instruction.contains("DOCUMENTS:"));
        assert!(instruction.contains("--- DOCUMENT START: guide.md ---"));
        assert!(instruction.contains("[Page 1]"));
    }

    #[test]
    fn instruction_without_documents_keeps_rules() {
        let instruction = build_system_instruction(&[]);
        assert!(instruction.contains("INSTRUCTIONS:"));
        assert!(instruction.ends_with("DOCUMENTS:\n"));
    }
}
