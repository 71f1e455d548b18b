//! Cheap nesting estimate, taken before a script is parsed.

/// Deepest nesting of brackets plus chained conditional operators in
/// `source`.
///
/// String, template and comment contents are skipped. Regex literals are
/// not recognized, so brackets and `?` inside them are counted; the estimate
/// errs high.
pub(super) fn nesting_depth(source: &str) -> usize {
    let bytes = source.as_bytes();
    // Conditional operators seen at each open bracket level, outermost first.
    let mut conditionals: Vec<usize> = vec![0];
    let mut chained = 0;
    let mut max = 0;

    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'' | b'`') => i = skip_quoted(bytes, i, quote),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line_comment(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'(' | b'[' | b'{' => conditionals.push(0),
            b')' | b']' | b'}' => {
                if conditionals.len() > 1 {
                    chained -= conditionals.pop().unwrap_or(0);
                } else if let Some(top) = conditionals.last_mut() {
                    chained -= std::mem::take(top);
                }
            }
            b';' | b',' => {
                if let Some(top) = conditionals.last_mut() {
                    chained -= std::mem::take(top);
                }
            }
            b'?' => match bytes.get(i + 1) {
                Some(b'?') => i += 1,
                Some(b'.') if !bytes.get(i + 2).is_some_and(u8::is_ascii_digit) => {}
                _ => {
                    if let Some(top) = conditionals.last_mut() {
                        *top += 1;
                        chained += 1;
                    }
                }
            },
            _ => {}
        }
        max = max.max(conditionals.len() - 1 + chained);
        i += 1;
    }
    max
}

/// Index of the closing quote, or the last byte when unterminated.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b if b == quote => return i,
            _ => {}
        }
        i += 1;
    }
    bytes.len() - 1
}

fn skip_line_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len() - 1, |offset| start + offset)
}

fn skip_block_comment(bytes: &[u8], start: usize) -> usize {
    bytes[start + 2..]
        .windows(2)
        .position(|w| w == b"*/")
        .map_or(bytes.len() - 1, |offset| start + 2 + offset + 1)
}
