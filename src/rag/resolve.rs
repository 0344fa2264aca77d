use crate::models::Document;

/// Map a citation's document name hint onto a stored document.
///
/// Lookup runs three tiers, case-sensitive, cheapest first:
///   1. exact name equality,
///   2. equality after trimming both sides,
///   3. substring containment in either direction.
/// Within tier 3, ties go to the longest document name and then to the
/// earliest entry in `documents` (callers pass documents in upload order).
///
/// A miss is logged and returns `None`; clicking an unresolved citation
/// is a no-op, never an error.
pub fn resolve_citation<'a>(documents: &'a [Document], hint: &str) -> Option<&'a Document> {
    if hint.trim().is_empty() {
        tracing::warn!("Citation with empty document name hint ignored");
        return None;
    }

    if let Some(doc) = documents.iter().find(|d| d.name == hint) {
        return Some(doc);
    }

    let trimmed = hint.trim();
    if let Some(doc) = documents.iter().find(|d| d.name.trim() == trimmed) {
        return Some(doc);
    }

    let mut best: Option<&'a Document> = None;
    for doc in documents {
        if doc.name.contains(hint) || hint.contains(doc.name.as_str()) {
            let better = match best {
                None => true,
                Some(current) => doc.name.chars().count() > current.name.chars().count(),
            };
            if better {
                best = Some(doc);
            }
        }
    }

    if best.is_none() {
        tracing::warn!(hint, "Citation did not resolve to any document");
    }
    best
}
