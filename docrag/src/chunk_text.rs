use crate::config::Config;

/// Splits `text` into overlapping character windows of at most `cfg.chunk_size`.
///
/// A window ends on the strongest boundary found in its second half: a blank
/// line, then a line break, then a sentence end, then any whitespace.
pub fn chunk_text(text: &str, cfg: &Config) -> Vec<String> {
    let size = cfg.chunk_size;
    let mut overlap = cfg.chunk_overlap;

    if size == 0 {
        let trimmed = text.trim();
        return if trimmed.is_empty() { vec![] } else { vec![trimmed.to_string()] };
    }
    if overlap >= size {
        overlap = size / 4;
    }

    let chars: Vec<char> = text.chars().collect();
    let len_chars = chars.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len_chars {
        let hard_end = (start + size).min(len_chars);
        let end = if hard_end == len_chars {
            len_chars
        } else {
            find_break(&chars, start, hard_end)
        };

        let chunk_str: String = chars[start..end].iter().collect();
        let trimmed = chunk_str.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        if end == len_chars {
            break;
        }
        let next = end.saturating_sub(overlap);
        start = if next > start { next } else { end };
    }

    chunks
}

fn find_break(chars: &[char], start: usize, hard_end: usize) -> usize {
    let floor = start + (hard_end - start) / 2;
    let last_where = |pred: &dyn Fn(usize) -> bool| (floor..hard_end).rev().find(|&i| pred(i)).map(|i| i + 1);

    last_where(&|i: usize| i > 0 && chars[i] == '\n' && chars[i - 1] == '\n')
        .or_else(|| last_where(&|i: usize| chars[i] == '\n'))
        .or_else(|| {
            last_where(&|i: usize| {
                matches!(chars[i], '.' | '!' | '?') && chars.get(i + 1).is_some_and(|c| c.is_whitespace())
            })
        })
        .or_else(|| last_where(&|i: usize| chars[i].is_whitespace()))
        .unwrap_or(hard_end)
}
