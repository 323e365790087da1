//! Outbound message chunking.
//!
//! Chat transports cap message length (Telegram at 4096, Discord at 2000).
//! Long responses are split at natural boundaries, keeping fenced code
//! blocks intact: a chunk that would cut a fence open is either extended to
//! the closing fence or closed and reopened with the same language header
//! in the next chunk.

/// Split `content` into chunks of at most `max_len` bytes.
///
/// A buffer of ~10% of `max_len` (at least 50 bytes) is reserved so there
/// is room to close a code fence, but a chunk may extend to `max_len` when
/// that lets it include a closing fence.
pub fn split_message(content: &str, max_len: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut content = content.to_string();

    let code_block_buffer = (max_len / 10).max(50).min(max_len / 2);

    while !content.is_empty() {
        if content.len() <= max_len {
            messages.push(content);
            break;
        }

        // Leave room for closing fences below the hard cap.
        let effective_limit =
            floor_char_boundary(&content, (max_len - code_block_buffer).max(max_len / 2));

        let mut msg_end = find_last_newline(&content[..effective_limit], 200)
            .or_else(|| find_last_space(&content[..effective_limit], 100))
            .unwrap_or(effective_limit);

        if let Some(unclosed_idx) = find_last_unclosed_code_block(&content[..msg_end]) {
            match find_next_closing_code_block(&content, msg_end) {
                Some(closing_idx) if closing_idx <= max_len => {
                    // Extend to include the closing fence.
                    msg_end = closing_idx;
                }
                _ => {
                    // The block is too long for one chunk or never closes.
                    let header_end = content[unclosed_idx..]
                        .find('\n')
                        .map(|i| unclosed_idx + i)
                        .unwrap_or(unclosed_idx + 3);
                    let header = content[unclosed_idx..header_end].trim().to_string();

                    if msg_end > header_end + 20 {
                        // Split inside the block: close the fence here and
                        // reopen it at the top of the next chunk.
                        let inner_limit = floor_char_boundary(&content, max_len - 5);
                        let better_end = find_last_newline(&content[..inner_limit], 200);
                        msg_end = match better_end {
                            Some(end) if end > header_end => end,
                            _ => inner_limit,
                        };
                        messages.push(format!(
                            "{}\n```",
                            content[..msg_end].trim_end_matches([' ', '\t', '\n', '\r'])
                        ));
                        content = format!("{header}\n{}", content[msg_end..].trim());
                        continue;
                    }

                    // Otherwise split just before the block starts.
                    let new_end = find_last_newline(&content[..unclosed_idx], 200)
                        .or_else(|| find_last_space(&content[..unclosed_idx], 100));
                    match new_end {
                        Some(end) => msg_end = end,
                        None if unclosed_idx > 20 => msg_end = unclosed_idx,
                        None => {
                            // Last resort: split inside anyway.
                            msg_end = floor_char_boundary(&content, max_len - 5);
                            messages.push(format!(
                                "{}\n```",
                                content[..msg_end].trim_end_matches([' ', '\t', '\n', '\r'])
                            ));
                            content = format!("{header}\n{}", content[msg_end..].trim());
                            continue;
                        }
                    }
                }
            }
        }

        if msg_end == 0 {
            msg_end = effective_limit;
        }

        messages.push(content[..msg_end].to_string());
        content = content[msg_end..].trim().to_string();
    }

    messages
}

/// Largest index `<= idx` that lands on a char boundary.
fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    if idx >= s.len() {
        return s.len();
    }
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Position of the last opening ``` without a matching close, if any.
fn find_last_unclosed_code_block(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut in_code_block = false;
    let mut last_open_idx = None;

    let mut i = 0;
    while i + 2 < bytes.len() {
        if bytes[i] == b'`' && bytes[i + 1] == b'`' && bytes[i + 2] == b'`' {
            if !in_code_block {
                last_open_idx = Some(i);
            }
            in_code_block = !in_code_block;
            i += 2;
        }
        i += 1;
    }

    in_code_block.then_some(last_open_idx).flatten()
}

/// Position just past the next closing ``` at or after `start_idx`.
fn find_next_closing_code_block(text: &str, start_idx: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = start_idx;
    while i + 2 < bytes.len() {
        if bytes[i] == b'`' && bytes[i + 1] == b'`' && bytes[i + 2] == b'`' {
            return Some(i + 3);
        }
        i += 1;
    }
    None
}

/// Last newline within the trailing `window` bytes of `s`.
fn find_last_newline(s: &str, window: usize) -> Option<usize> {
    let start = s.len().saturating_sub(window);
    s[start..].rfind('\n').map(|i| start + i).filter(|&i| i > 0)
}

/// Last space or tab within the trailing `window` bytes of `s`.
fn find_last_space(s: &str, window: usize) -> Option<usize> {
    let start = s.len().saturating_sub(window);
    s[start..]
        .rfind([' ', '\t'])
        .map(|i| start + i)
        .filter(|&i| i > 0)
}
