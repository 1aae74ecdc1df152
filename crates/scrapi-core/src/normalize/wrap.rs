//! Final pass: split over-long lines at readable break points.

/// Split every line longer than `max` characters.
///
/// The break is the rightmost acceptable point within the first `max`
/// characters and past one-third of `max`. Outside string literals commas,
/// semicolons, `&&`/`||`, whitespace and brackets qualify; inside a literal
/// only `;` does. Lines with no acceptable point are left as they are.
pub(crate) fn split_long_lines(text: &str, max: usize) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.split('\n') {
        if line.chars().count() <= max {
            out.push(line.to_string());
        } else {
            split_line(line, max, &mut out);
        }
    }
    out.join("\n")
}

fn split_line(line: &str, max: usize, out: &mut Vec<String>) {
    let indent: String = line
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();
    let continuation = format!("{indent}  ");

    let mut rest: Vec<char> = line.chars().collect();
    let mut quote: Option<char> = None;

    loop {
        if rest.len() <= max {
            out.push(rest.iter().collect());
            return;
        }
        let Some((cut, state)) = find_break(&rest, max, quote) else {
            out.push(rest.iter().collect());
            return;
        };

        let head: String = rest[..cut].iter().collect();
        let tail: String = rest[cut..].iter().collect();
        let next: Vec<char> = continuation
            .chars()
            .chain(tail.trim_start().chars())
            .collect();

        // No progress possible (indent wider than the break offset).
        if next.len() >= rest.len() {
            out.push(rest.iter().collect());
            return;
        }

        out.push(head.trim_end().to_string());
        rest = next;
        quote = state;
    }
}

/// Returns the cut offset (split after `cut - 1`) and the quote state there.
fn find_break(chars: &[char], max: usize, start_quote: Option<char>) -> Option<(usize, Option<char>)> {
    let min = max / 3;
    let mut quote = start_quote;
    let mut escaped = false;
    let mut best = None;
    let mut prev = '\0';

    for (i, &c) in chars.iter().enumerate().take(max) {
        let was_quoted = quote.is_some();
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if matches!(c, '"' | '\'' | '`') {
                    quote = Some(c);
                }
            }
        }

        if i + 1 > min {
            let inside = was_quoted && quote.is_some();
            let acceptable = if inside {
                c == ';'
            } else if !was_quoted && quote.is_none() {
                matches!(c, ',' | ';' | ' ' | '\t' | '(' | '[' | '{' | ')' | ']' | '}')
                    || (c == '&' && prev == '&')
                    || (c == '|' && prev == '|')
            } else {
                false
            };
            if acceptable {
                best = Some((i + 1, quote));
            }
        }
        prev = c;
    }

    best
}
