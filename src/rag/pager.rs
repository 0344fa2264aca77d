//! Fixed-size document pagination.
//!
//! Pages are counted in Unicode scalar values, not bytes, so multi-byte
//! text never splits inside a character.

/// Characters per page. Shared between prompt-context construction and
/// on-screen page display; citation page numbers only line up while both
/// sides paginate with the same constant.
pub const CHARS_PER_PAGE: usize = 2000;

/// Split `content` into consecutive pages of `page_size` characters.
///
/// Page `i` (1-indexed) holds characters `(i-1)*page_size .. i*page_size`;
/// the last page may be shorter. Empty content yields zero pages, so a
/// citation pointing into an empty document never resolves to a page.
pub fn paginate(content: &str, page_size: usize) -> Vec<String> {
    debug_assert!(page_size > 0);

    let mut pages = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in content.chars() {
        current.push(ch);
        count += 1;
        if count == page_size {
            pages.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        pages.push(current);
    }

    pages
}

/// Number of pages `paginate` would produce, without materializing them.
pub fn page_count(content: &str, page_size: usize) -> usize {
    debug_assert!(page_size > 0);
    content.chars().count().div_ceil(page_size)
}
