//! Overlapping, boundary-aware text chunker.
//!
//! Splits a note into windows of at most `max_chars` characters. Inside each
//! window the cut point is moved back to the last paragraph break (`\n\n`)
//! or, failing that, to just after the last sentence-ending period, so
//! chunks end at natural boundaries whenever one exists. Consecutive chunks
//! overlap by up to `overlap` characters so a passage straddling a boundary
//! still appears whole in one of the two embeddings.
//!
//! Lengths are measured in Unicode scalar values, never bytes, so multi-byte
//! text is never split inside a character.

/// Split `text` into trimmed, non-empty chunks of at most `max_chars`
/// characters.
///
/// Text that already fits in one chunk is returned as a single trimmed
/// chunk. A `max_chars` of zero is treated as one. When `overlap` is not
/// smaller than the window, chunks simply do not overlap.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let chars: Vec<char> = text.chars().collect();

    if chars.len() <= max_chars {
        return vec![text.trim().to_string()];
    }

    window_spans(&chars, max_chars, overlap)
        .into_iter()
        .filter_map(|(start, end)| {
            let piece: String = chars[start..end].iter().collect();
            let trimmed = piece.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

/// Untrimmed `[start, end)` character ranges of every window. Each window
/// starts at or before the previous one's end and the last ends at the end
/// of the text.
fn window_spans(chars: &[char], max_chars: usize, overlap: usize) -> Vec<(usize, usize)> {
    let len = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;

    while start < len {
        let mut end = (start + max_chars).min(len);
        if end < len {
            end = natural_break(chars, start, end).unwrap_or(end);
        }
        spans.push((start, end));

        if end >= len {
            break;
        }

        start = match end.checked_sub(overlap) {
            Some(next) if next > start => next,
            _ => end,
        };
    }

    spans
}

/// Best cut point inside `chars[start..end]`: the start of the last
/// paragraph break, else just past the last period. Either must lie
/// strictly after `start`.
fn natural_break(chars: &[char], start: usize, end: usize) -> Option<usize> {
    let window = &chars[start..end];

    let paragraph = window
        .windows(2)
        .rposition(|pair| pair[0] == '\n' && pair[1] == '\n')
        .map(|i| start + i)
        .filter(|&pos| pos > start);
    if paragraph.is_some() {
        return paragraph;
    }

    window
        .iter()
        .rposition(|&c| c == '.')
        .map(|i| start + i)
        .filter(|&pos| pos > start)
        .map(|pos| pos + 1)
}
