use regex::Regex;
use serde::{Deserialize, Serialize};

/// One source marker lifted out of a model response.
///
/// Derived on every pass over the text, never persisted. `index` is the
/// 1-based reference number unique within a single message; two markers
/// with the same `raw_label` share one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub index: usize,
    pub raw_label: String,
    pub document_name_hint: String,
    pub page_number_hint: Option<u32>,
}

/// Result of a citation pass: the response text with markers rewritten to
/// numbered reference tokens, plus the citations in first-appearance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedText {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// Extract `[Source: ...]` markers from model output.
///
/// Runs a single left-to-right pass: each marker is replaced with a
/// `[n]` reference token, and distinct payloads are numbered from 1 in
/// order of first appearance. Repeated payloads reuse their first index.
///
/// Called on every streamed delta with the full accumulated text. The
/// function is pure, so re-running it on the final text gives the same
/// numbering the intermediate calls showed; a marker split across two
/// stream chunks is simply not recognized until both halves arrive in the
/// accumulated text.
pub fn extract_citations(raw: &str) -> ProcessedText {
    let marker = Regex::new(r"\[Source: ([^\]]+)\]").unwrap();

    let mut citations: Vec<Citation> = Vec::new();
    let mut text = String::with_capacity(raw.len());
    let mut last_end = 0;

    for cap in marker.captures_iter(raw) {
        let Some(m) = cap.get(0) else { continue };
        let payload = cap.get(1).map(|g| g.as_str()).unwrap_or("");

        // Deduplicate by exact payload; first occurrence allocates the index
        let index = match citations.iter().find(|c| c.raw_label == payload) {
            Some(existing) => existing.index,
            None => {
                let index = citations.len() + 1;
                let (document_name_hint, page_number_hint) = parse_payload(payload);
                citations.push(Citation {
                    index,
                    raw_label: payload.to_string(),
                    document_name_hint,
                    page_number_hint,
                });
                index
            }
        };

        text.push_str(&raw[last_end..m.start()]);
        text.push_str(&format!("[{index}]"));
        last_end = m.end();
    }
    text.push_str(&raw[last_end..]);

    ProcessedText { text, citations }
}

/// Split a marker payload into a document name hint and an optional page.
///
/// `"report.pdf, Page: 3-4"` parses to `("report.pdf", Some(3))`: the part
/// before the first `Page:` is trimmed and loses one trailing comma, the
/// part after is trimmed and its first `-`-separated segment is read as an
/// integer. An unparsable page is `None`, never an error. A payload with
/// no `Page:` is the name verbatim.
pub fn parse_payload(payload: &str) -> (String, Option<u32>) {
    match payload.split_once("Page:") {
        Some((name_part, page_part)) => {
            let name = name_part.trim();
            let name = name.strip_suffix(',').unwrap_or(name);
            let page = page_part
                .trim()
                .split('-')
                .next()
                .and_then(|first| first.parse::<u32>().ok());
            (name.to_string(), page)
        }
        None => (payload.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- parse_payload ---

    #[test]
    fn payload_with_page_range_takes_first_page() {
        let (name, page) = parse_payload("report.pdf, Page: 3-4");
        assert_eq!(name, "report.pdf");
        assert_eq!(page, Some(3));
    }

    #[test]
    fn payload_with_single_page() {
        let (name, page) = parse_payload("notes.md, Page: 12");
        assert_eq!(name, "notes.md");
        assert_eq!(page, Some(12));
    }

    #[test]
    fn payload_without_page_is_name_verbatim() {
        let (name, page) = parse_payload("report.pdf");
        assert_eq!(name, "report.pdf");
        assert_eq!(page, None);
    }

    #[test]
    fn unparsable_page_is_none_not_error() {
        let (name, page) = parse_payload("report.pdf, Page: unknown");
        assert_eq!(name, "report.pdf");
        assert_eq!(page, None);
    }

    #[test]
    fn splits_at_first_page_occurrence() {
        let (name, page) = parse_payload("Page: 2, Page: 3");
        assert_eq!(name, "");
        assert_eq!(page, None); // " 2, Page: 3" does not parse as an integer
    }

    // --- extract_citations ---

    #[test]
    fn single_marker_is_numbered_and_rewritten() {
        let out = extract_citations("Revenue grew [Source: report.pdf, Page: 3].");
        assert_eq!(out.text, "Revenue grew [1].");
        assert_eq!(out.citations.len(), 1);
        assert_eq!(out.citations[0].index, 1);
        assert_eq!(out.citations[0].raw_label, "report.pdf, Page: 3");
        assert_eq!(out.citations[0].document_name_hint, "report.pdf");
        assert_eq!(out.citations[0].page_number_hint, Some(3));
    }

    #[test]
    fn repeated_payload_reuses_index() {
        let out = extract_citations(
            "A [Source: a.txt]. B [Source: b.txt, Page: 2]. A again [Source: a.txt].",
        );
        assert_eq!(out.text, "A [1]. B [2]. A again [1].");
        assert_eq!(out.citations.len(), 2);
        assert_eq!(out.citations[0].raw_label, "a.txt");
        assert_eq!(out.citations[1].raw_label, "b.txt, Page: 2");
    }

    #[test]
    fn distinct_payloads_number_in_first_appearance_order() {
        let out = extract_citations(
            "[Source: c.md] then [Source: a.md] then [Source: b.md]",
        );
        let labels: Vec<&str> = out.citations.iter().map(|c| c.raw_label.as_str()).collect();
        assert_eq!(labels, vec!["c.md", "a.md", "b.md"]);
        let indices: Vec<usize> = out.citations.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn streaming_prefix_never_renumbers() {
        let full = "First [Source: a.txt], second [Source: b.txt], first again [Source: a.txt].";
        let prefix = &full[..30]; // ends after the first full marker
        let early = extract_citations(prefix);
        let late = extract_citations(full);

        assert!(!early.citations.is_empty());
        for (e, l) in early.citations.iter().zip(late.citations.iter()) {
            assert_eq!(e.index, l.index);
            assert_eq!(e.raw_label, l.raw_label);
        }
    }

    #[test]
    fn extraction_is_idempotent_on_same_input() {
        let raw = "See [Source: brief.docx, Page: 1-2] and [Source: brief.docx, Page: 1-2].";
        assert_eq!(extract_citations(raw), extract_citations(raw));
    }

    #[test]
    fn partial_marker_mid_stream_passes_through() {
        let out = extract_citations("The answer is in [Sour");
        assert!(out.citations.is_empty());
        assert_eq!(out.text, "The answer is in [Sour");
    }

    #[test]
    fn other_bracketed_text_is_untouched() {
        let out = extract_citations("Values [1, 2, 3] and [see appendix] stay literal.");
        assert!(out.citations.is_empty());
        assert_eq!(out.text, "Values [1, 2, 3] and [see appendix] stay literal.");
    }

    #[test]
    fn marker_without_space_after_colon_is_literal() {
        let out = extract_citations("Broken [Source:x.txt] marker.");
        assert!(out.citations.is_empty());
        assert_eq!(out.text, "Broken [Source:x.txt] marker.");
    }

    #[test]
    fn multibyte_text_around_markers_is_preserved() {
        let out = extract_citations("Résumé : voir [Source: cv.pdf, Page: 1], fin.");
        assert_eq!(out.text, "Résumé : voir [1], fin.");
        assert_eq!(out.citations[0].document_name_hint, "cv.pdf");
    }
}
