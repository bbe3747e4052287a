use crate::model::document::TagOccurrence;
use crate::model::tag::{is_disallowed_char, Tag, TAG_MARKER};
use crate::parse::span::Span;

/// Find every inline `#tag` token in a document body.
///
/// A tag starts at a `#` that opens the text or follows whitespace. Fenced
/// code blocks and inline code spans are skipped. Offsets are byte offsets
/// into `body`.
pub fn scan_tags(body: &str) -> Vec<TagOccurrence> {
    let mut found = Vec::new();
    let mut fence: Option<(char, usize)> = None;
    let mut line_start = 0;

    for line in body.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some((ch, len)) = fence_marker(trimmed) {
            match fence {
                None => fence = Some((ch, len)),
                Some((open_ch, open_len)) if open_ch == ch && len >= open_len => fence = None,
                Some(_) => {}
            }
        } else if fence.is_none() {
            scan_line(line, line_start, &mut found);
        }
        line_start += line.len();
    }

    found
}

/// Returns the fence character and run length if the line opens or closes
/// a fenced code block.
fn fence_marker(trimmed: &str) -> Option<(char, usize)> {
    let ch = trimmed.chars().next()?;
    if ch != '`' && ch != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|&c| c == ch).count();
    if len >= 3 { Some((ch, len)) } else { None }
}

fn scan_line(line: &str, base: usize, found: &mut Vec<TagOccurrence>) {
    let mut code_ticks: Option<usize> = None;
    let mut prev: Option<char> = None;
    let mut iter = line.char_indices().peekable();

    while let Some((i, c)) = iter.next() {
        if c == '`' {
            let mut run = 1;
            while iter.peek().is_some_and(|&(_, n)| n == '`') {
                iter.next();
                run += 1;
            }
            code_ticks = match code_ticks {
                None if has_closing_ticks(&line[i + run..], run) => Some(run),
                Some(open) if open == run => None,
                other => other,
            };
            prev = Some('`');
            continue;
        }

        if code_ticks.is_none()
            && c == TAG_MARKER
            && prev.is_none_or(|p| p.is_whitespace())
            && let Some(end) = token_end(line, i + 1)
        {
            let text = &line[i..end];
            if is_inline_tag(&text[1..]) {
                found.push(TagOccurrence {
                    span: Span::new(base + i, base + end),
                    text: text.to_string(),
                });
            }
            while iter.peek().is_some_and(|&(j, _)| j < end) {
                iter.next();
            }
            prev = line[..end].chars().next_back();
            continue;
        }

        prev = Some(c);
    }
}

/// True if a run of exactly `run` backticks appears later in the line.
fn has_closing_ticks(rest: &str, run: usize) -> bool {
    let mut count = 0;
    for c in rest.chars() {
        if c == '`' {
            count += 1;
        } else {
            if count == run {
                return true;
            }
            count = 0;
        }
    }
    count == run
}

/// End offset of the tag body starting at `start`, trailing `/` excluded.
fn token_end(line: &str, start: usize) -> Option<usize> {
    let mut end = start;
    for (i, c) in line[start..].char_indices() {
        if is_disallowed_char(c) {
            break;
        }
        end = start + i + c.len_utf8();
    }
    while end > start && line.as_bytes()[end - 1] == b'/' {
        end -= 1;
    }
    if end > start { Some(end) } else { None }
}

/// Inline tags need at least one non-digit character and no empty segments.
fn is_inline_tag(name: &str) -> bool {
    !name.chars().all(|c| c.is_ascii_digit() || c == '/') && Tag::parse(name).is_ok()
}
