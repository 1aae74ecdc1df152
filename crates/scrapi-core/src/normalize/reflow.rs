//! Reflow of inline `<script>` and `<style>` bodies.

use super::MAX_LINE_WIDTH;

/// Pretty-print or reflow a script body. `None` leaves it untouched.
///
/// JSON bodies (e.g. `__NEXT_DATA__`, `application/ld+json`) are pretty
/// printed with 2-space indentation; a single minified line of code is broken
/// after statements and block boundaries.
pub(crate) fn reflow_script(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Ok(pretty) = serde_json::to_string_pretty(&value) {
                return Some(pretty);
            }
        }
    }
    if is_single_long_line(trimmed) {
        return Some(break_blocks(trimmed));
    }
    None
}

/// Reflow a minified stylesheet body. `None` leaves it untouched.
pub(crate) fn reflow_style(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if is_single_long_line(trimmed) {
        return Some(break_blocks(trimmed));
    }
    None
}

fn is_single_long_line(s: &str) -> bool {
    !s.contains('\n') && s.chars().count() > MAX_LINE_WIDTH
}

/// Break code after `;`, `{` and `}` outside string literals and parentheses,
/// indenting by brace depth.
fn break_blocks(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len() + src.len() / 8);
    let mut line = String::new();
    let mut depth = 0usize;
    let mut parens = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            line.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => {
                quote = Some(c);
                line.push(c);
            }
            '(' => {
                parens += 1;
                line.push(c);
            }
            ')' => {
                parens = parens.saturating_sub(1);
                line.push(c);
            }
            '{' => {
                line.push(c);
                flush(&mut out, &mut line, depth);
                depth += 1;
            }
            '}' => {
                flush(&mut out, &mut line, depth);
                depth = depth.saturating_sub(1);
                line.push(c);
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some(';' | ',' | ')')) {
                    flush(&mut out, &mut line, depth);
                }
            }
            ';' => {
                line.push(c);
                if parens == 0 {
                    flush(&mut out, &mut line, depth);
                }
            }
            _ => line.push(c),
        }
    }
    flush(&mut out, &mut line, depth);

    out.trim_end().to_string()
}

fn flush(out: &mut String, line: &mut String, depth: usize) {
    let t = line.trim();
    if !t.is_empty() {
        out.push_str(&"  ".repeat(depth));
        out.push_str(t);
        out.push('\n');
    }
    line.clear();
}
