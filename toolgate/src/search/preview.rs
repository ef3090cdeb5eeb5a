//! Context previews around the first matched term

/// Bytes of context kept before the first match
const LEAD_BYTES: usize = 100;

/// Bytes of context kept after the first match
const TRAIL_BYTES: usize = 200;

/// Build a short preview around the first occurrence of any term.
///
/// Whitespace runs are collapsed and truncated edges are marked with
/// ellipses. When no term occurs in the body, the preview falls back to
/// the head of the document.
pub fn build_preview(body: &str, terms: &[String]) -> String {
    if body.is_empty() {
        return String::new();
    }

    let lower = body.to_lowercase();
    let match_pos = terms
        .iter()
        .filter_map(|term| lower.find(term.as_str()))
        .min();

    let (start, end) = match match_pos {
        Some(pos) => {
            let pos = pos.min(body.len());
            (pos.saturating_sub(LEAD_BYTES), (pos + TRAIL_BYTES).min(body.len()))
        }
        None => (0, (LEAD_BYTES + TRAIL_BYTES).min(body.len())),
    };

    let start = floor_char_boundary(body, start);
    let end = ceil_char_boundary(body, end);

    let window = body[start..end]
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut preview = String::new();
    if start > 0 {
        preview.push_str("...");
    }
    preview.push_str(&window);
    if end < body.len() {
        preview.push_str("...");
    }

    preview
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}
