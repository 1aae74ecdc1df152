//! Markup passes of the normalizer.
//!
//! The document is first cut into markup runs and raw `<script>`/`<style>`
//! blocks so that tag-oriented rewrites never touch code, then each run is
//! rewritten and the whole document is re-indented by tag depth.

use super::reflow::{reflow_script, reflow_style};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Attribute lists longer than this are wrapped one attribute per line.
const MAX_ATTRIBUTE_CHARS: usize = 100;

/// Data URIs longer than this are replaced by a placeholder.
const MAX_DATA_URI_CHARS: usize = 200;

/// Tags that never open a nesting level.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements that get a navigational comment in front of them.
const LANDMARK_TAGS: &[&str] = &["head", "body", "nav", "header", "main", "footer", "aside"];

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("valid regex"))
}

fn any_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)</?[a-z][a-z0-9:-]*(\s[^<>]*)?/?>")
}

fn open_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<([a-zA-Z][a-zA-Z0-9:-]*)(\s[^<>]*?)(/?)>")
}

fn counted_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<(/?)([a-zA-Z][a-zA-Z0-9:-]*)([^<>]*?)(/?)>")
}

fn unterminated_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"<([a-zA-Z][a-zA-Z0-9:-]*)[^<>]*$")
}

fn data_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"(data-[\w-]+)=(?:"([^"]*)"|'([^']*)')"#)
}

fn text_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r">([^<>]+)<")
}

fn landmark_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)<(head|body|nav|header|main|footer|aside)\b")
}

fn data_uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"data:([\w.+-]+/[\w.+-]+);base64,[A-Za-z0-9+/=]+")
}

fn meta_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)<meta(\s[^<>\n]*?)(/?)>")
}

fn head_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)<head(\s[^<>]*)?>")
}

fn charset_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)<meta[^<>]*charset")
}

/// True when the text contains at least one well-formed tag.
pub(crate) fn looks_like_markup(text: &str) -> bool {
    any_tag_re().is_match(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RawKind {
    Script,
    Style,
}

impl RawKind {
    fn name(self) -> &'static str {
        match self {
            RawKind::Script => "script",
            RawKind::Style => "style",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment<'a> {
    Markup(&'a str),
    Raw {
        kind: RawKind,
        open: &'a str,
        content: &'a str,
        close: &'a str,
    },
}

/// Cut the document into markup runs and raw script/style blocks.
pub(crate) fn segment(text: &str) -> Vec<Segment<'_>> {
    // ASCII lowercasing keeps byte offsets identical to `text`.
    let lower = text.to_ascii_lowercase();
    let mut segments = Vec::new();
    let mut pos = 0;

    while pos < text.len() {
        let Some((start, kind)) = next_raw_open(&lower, pos) else {
            break;
        };
        let Some(open_end) = lower[start..].find('>').map(|i| start + i + 1) else {
            break;
        };
        if start > pos {
            segments.push(Segment::Markup(&text[pos..start]));
        }

        let close_pat = format!("</{}", kind.name());
        let (content_end, close_end) = match lower[open_end..].find(&close_pat) {
            Some(i) => {
                let close_start = open_end + i;
                let close_end = lower[close_start..]
                    .find('>')
                    .map(|j| close_start + j + 1)
                    .unwrap_or(text.len());
                (close_start, close_end)
            }
            None => (text.len(), text.len()),
        };

        segments.push(Segment::Raw {
            kind,
            open: &text[start..open_end],
            content: &text[open_end..content_end],
            close: &text[content_end..close_end],
        });
        pos = close_end;
    }

    if pos < text.len() {
        segments.push(Segment::Markup(&text[pos..]));
    }
    segments
}

fn next_raw_open(lower: &str, from: usize) -> Option<(usize, RawKind)> {
    let mut best: Option<(usize, RawKind)> = None;
    for kind in [RawKind::Script, RawKind::Style] {
        let pat = format!("<{}", kind.name());
        let mut search = from;
        while let Some(i) = lower[search..].find(&pat) {
            let at = search + i;
            let after = lower[at + pat.len()..].chars().next();
            if matches!(after, Some(c) if c.is_ascii_whitespace() || c == '>' || c == '/') {
                if best.map_or(true, |(b, _)| at < b) {
                    best = Some((at, kind));
                }
                break;
            }
            search = at + pat.len();
        }
    }
    best
}

/// Apply the per-segment passes and join the document back together.
pub(crate) fn render(segments: &[Segment<'_>]) -> String {
    let mut out = String::new();
    for seg in segments {
        match *seg {
            Segment::Markup(s) => push_joined(&mut out, &rewrite_markup(s)),
            Segment::Raw {
                kind,
                open,
                content,
                close,
            } => {
                push_joined(&mut out, &wrap_long_attributes(open));
                let reflowed = match kind {
                    RawKind::Script => reflow_script(content),
                    RawKind::Style => reflow_style(&truncate_data_uris(content)),
                };
                match reflowed {
                    Some(body) => {
                        out.push('\n');
                        out.push_str(&body);
                        out.push('\n');
                    }
                    None if kind == RawKind::Style => out.push_str(&truncate_data_uris(content)),
                    None => out.push_str(content),
                }
                out.push_str(close);
            }
        }
    }
    out
}

fn push_joined(out: &mut String, next: &str) {
    if out.ends_with('>') && next.starts_with('<') {
        out.push('\n');
    }
    out.push_str(next);
}

fn rewrite_markup(s: &str) -> String {
    let s = s.replace("><", ">\n<");
    let s = wrap_long_attributes(&s);
    let s = pretty_data_attributes(&s);
    let s = decode_entities_between_tags(&s);
    let s = insert_landmark_comments(&s);
    let s = truncate_data_uris(&s);
    wrap_meta_tags(&s)
}

/// Split an attribute list into whole attributes, honouring quotes.
pub(crate) fn tokenize_attributes(attrs: &str) -> Vec<&str> {
    let bytes = attrs.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && bytes[i] != b'=' {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'=' {
            i += 1;
            match bytes.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    i += 1;
                    while i < bytes.len() && bytes[i] != q {
                        i += 1;
                    }
                    i = (i + 1).min(bytes.len());
                }
                _ => {
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                }
            }
        }
        // All split points are ASCII, so `start..i` is on char boundaries.
        tokens.push(&attrs[start..i]);
    }
    tokens
}

fn wrapped_tag(name: &str, tokens: &[&str], self_closing: bool) -> String {
    let mut out = format!("<{name}");
    for tok in tokens {
        out.push_str("\n  ");
        out.push_str(tok);
    }
    out.push_str(if self_closing { " />" } else { ">" });
    out
}

fn wrap_long_attributes(s: &str) -> String {
    open_tag_re()
        .replace_all(s, |caps: &Captures| {
            let attrs = &caps[2];
            if attrs.trim().chars().count() <= MAX_ATTRIBUTE_CHARS {
                return caps[0].to_string();
            }
            let tokens = tokenize_attributes(attrs);
            if tokens.len() < 2 {
                return caps[0].to_string();
            }
            wrapped_tag(&caps[1], &tokens, !caps[3].is_empty())
        })
        .into_owned()
}

fn pretty_data_attributes(s: &str) -> String {
    data_attr_re()
        .replace_all(s, |caps: &Captures| {
            let raw = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let decoded = raw.replace("&quot;", "\"").replace("&#34;", "\"").replace("&amp;", "&");
            let trimmed = decoded.trim();
            if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
                return caps[0].to_string();
            }
            let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
                return caps[0].to_string();
            };
            match serde_json::to_string_pretty(&value) {
                Ok(pretty) if !pretty.contains('\'') => format!("{}='{}'", &caps[1], pretty),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Decode common entities in text that sits directly between two tags.
pub(crate) fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn decode_entities_between_tags(s: &str) -> String {
    text_run_re()
        .replace_all(s, |caps: &Captures| {
            if caps[1].contains('&') {
                format!(">{}<", decode_entities(&caps[1]))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

fn insert_landmark_comments(s: &str) -> String {
    landmark_re()
        .replace_all(s, |caps: &Captures| {
            let name = caps[1].to_ascii_lowercase();
            debug_assert!(LANDMARK_TAGS.contains(&name.as_str()));
            format!("<!-- {} -->\n<{}", name.to_ascii_uppercase(), &caps[1])
        })
        .into_owned()
}

fn truncate_data_uris(s: &str) -> String {
    data_uri_re()
        .replace_all(s, |caps: &Captures| {
            let whole = caps[0].chars().count();
            if whole <= MAX_DATA_URI_CHARS {
                caps[0].to_string()
            } else {
                format!("data:{};base64,[truncated {} chars]", &caps[1], whole)
            }
        })
        .into_owned()
}

fn wrap_meta_tags(s: &str) -> String {
    meta_tag_re()
        .replace_all(s, |caps: &Captures| {
            let tokens = tokenize_attributes(&caps[1]);
            if tokens.len() <= 2 {
                return caps[0].to_string();
            }
            wrapped_tag("meta", &tokens, !caps[2].is_empty())
        })
        .into_owned()
}

fn is_void(name: &str) -> bool {
    VOID_TAGS.contains(&name.to_ascii_lowercase().as_str())
}

/// Re-indent by tag depth, two spaces per level.
///
/// Tag lines are trimmed and placed at the current depth. Other lines (text,
/// script bodies, wrapped attributes) keep their own leading whitespace on
/// top of the depth indent. Closing tags decrease depth, floored at zero.
pub(crate) fn reindent(doc: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut depth = 0usize;
    let mut raw: Option<&'static str> = None;
    let mut pending: Option<String> = None;

    for line in doc.split('\n') {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            out.push(String::new());
            continue;
        }
        let lower = trimmed.to_ascii_lowercase();

        if let Some(name) = raw {
            let close = format!("</{name}");
            if let Some(at) = lower.find(&close) {
                raw = None;
                if at == 0 {
                    depth = depth.saturating_sub(1);
                    out.push(format!("{}{}", indent(depth), trimmed));
                } else {
                    out.push(format!("{}{}", indent(depth), line.trim_end()));
                    depth = depth.saturating_sub(1);
                }
            } else {
                out.push(format!("{}{}", indent(depth), line.trim_end()));
            }
            continue;
        }

        if let Some(name) = pending.clone() {
            out.push(format!("{}{}", indent(depth), line.trim_end()));
            if let Some(gt) = trimmed.find('>') {
                pending = None;
                let self_closed = trimmed[..gt].ends_with('/');
                if !self_closed && !is_void(&name) {
                    depth += 1;
                }
                let mut open_raw = (!self_closed).then(|| raw_kind_name(&name)).flatten();
                count_tags(&trimmed[gt + 1..], &mut depth, &mut open_raw);
                raw = open_raw;
            }
            continue;
        }

        if !trimmed.starts_with('<') {
            out.push(format!("{}{}", indent(depth), line.trim_end()));
            let mut open_raw = None;
            count_tags(trimmed, &mut depth, &mut open_raw);
            raw = open_raw;
            continue;
        }

        let mut rest = trimmed;
        if let Some(first) = counted_tag_re().captures(trimmed) {
            let m = first.get(0).map(|m| (m.start(), m.end()));
            if let (Some((0, end)), "/") = (m, &first[1]) {
                depth = depth.saturating_sub(1);
                rest = &trimmed[end..];
            }
        }
        out.push(format!("{}{}", indent(depth), trimmed));

        let mut open_raw = None;
        count_tags(rest, &mut depth, &mut open_raw);

        if let Some(caps) = unterminated_tag_re().captures(rest) {
            pending = Some(caps[1].to_ascii_lowercase());
        } else {
            raw = open_raw;
        }
    }

    out.join("\n")
}

/// Apply the depth changes of every complete tag in `text`.
///
/// `open_raw` ends up naming a script/style element left open by `text`.
fn count_tags(text: &str, depth: &mut usize, open_raw: &mut Option<&'static str>) {
    for caps in counted_tag_re().captures_iter(text) {
        let name = caps[2].to_ascii_lowercase();
        if &caps[1] == "/" {
            *depth = depth.saturating_sub(1);
            if *open_raw == raw_kind_name(&name) {
                *open_raw = None;
            }
        } else if caps[4].is_empty() && !is_void(&name) {
            *depth += 1;
            if let Some(kind) = raw_kind_name(&name) {
                *open_raw = Some(kind);
            }
        }
    }
}

fn raw_kind_name(name: &str) -> Option<&'static str> {
    match name {
        "script" => Some("script"),
        "style" => Some("style"),
        _ => None,
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Prepend a DOCTYPE unless one is present and make sure `<head>` declares a charset.
pub(crate) fn ensure_doctype_and_charset(doc: &str) -> String {
    let mut out = doc.to_string();

    if let Some(m) = head_tag_re().find(&out) {
        if !charset_re().is_match(&out) {
            let line_start = out[..m.start()].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let lead: String = out[line_start..m.start()]
                .chars()
                .take_while(|c| c.is_whitespace())
                .collect();
            let meta = format!("\n{lead}  <meta charset=\"UTF-8\">");
            out.insert_str(m.end(), &meta);
        }
    }

    let has_doctype = out
        .trim_start()
        .get(..9)
        .is_some_and(|p| p.eq_ignore_ascii_case("<!doctype"));
    if !has_doctype {
        out.insert_str(0, "<!DOCTYPE html>\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_separates_scripts_and_styles() {
        let html = r#"<div><script type="a">x<y</script><STYLE>.a{}</STYLE><p>t</p></div>"#;
        let segs = segment(html);
        assert_eq!(segs.len(), 4);
        assert_eq!(segs[0], Segment::Markup("<div>"));
        match &segs[1] {
            Segment::Raw { kind, open, content, close } => {
                assert_eq!(*kind, RawKind::Script);
                assert_eq!(*open, r#"<script type="a">"#);
                assert_eq!(*content, "x<y");
                assert_eq!(*close, "</script>");
            }
            other => panic!("unexpected segment {other:?}"),
        }
        assert!(matches!(segs[2], Segment::Raw { kind: RawKind::Style, .. }));
        assert_eq!(segs[3], Segment::Markup("<p>t</p></div>"));
    }

    #[test]
    fn test_segment_unclosed_script_runs_to_end() {
        let segs = segment("<p>a</p><script>var x = 1;");
        assert_eq!(segs.len(), 2);
        assert!(matches!(segs[1], Segment::Raw { content: "var x = 1;", close: "", .. }));
    }

    #[test]
    fn test_segment_ignores_lookalike_tags() {
        let segs = segment("<scripted>x</scripted>");
        assert_eq!(segs, vec![Segment::Markup("<scripted>x</scripted>")]);
    }

    #[test]
    fn test_tokenize_attributes_respects_quotes() {
        let toks = tokenize_attributes(r#" class="a b" data-x='{"k": "v w"}' hidden id=main "#);
        assert_eq!(toks, vec![r#"class="a b""#, r#"data-x='{"k": "v w"}'"#, "hidden", "id=main"]);
    }

    #[test]
    fn test_long_attribute_list_wrapped() {
        let tag = format!(
            r#"<a href="https://example.com/{}" class="link primary" target="_blank">go</a>"#,
            "p".repeat(80)
        );
        let out = wrap_long_attributes(&tag);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "<a");
        assert!(lines[1].starts_with("  href="));
        assert_eq!(lines[3], r#"  target="_blank">go</a>"#);
    }

    #[test]
    fn test_data_attribute_json_pretty_printed() {
        let out = pretty_data_attributes(r#"<div data-props="{&quot;id&quot;:7}">"#);
        assert_eq!(out, "<div data-props='{\n  \"id\": 7\n}'>");
        let untouched = r#"<div data-kind="plain">"#;
        assert_eq!(pretty_data_attributes(untouched), untouched);
    }

    #[test]
    fn test_entities_decoded_between_tags_only() {
        let out = decode_entities_between_tags(r#"<p title="a&amp;b">Tom &amp; Jerry&nbsp;&#39;s</p>"#);
        assert_eq!(out, r#"<p title="a&amp;b">Tom & Jerry 's</p>"#);
    }

    #[test]
    fn test_landmark_comments() {
        let out = insert_landmark_comments("<header class=x><nav></nav></header><main>");
        assert!(out.starts_with("<!-- HEADER -->\n<header class=x>"));
        assert!(out.contains("<!-- NAV -->\n<nav>"));
        assert!(out.contains("<!-- MAIN -->\n<main>"));
        assert!(!out.contains("</header>\n<!--"));
    }

    #[test]
    fn test_long_data_uri_truncated() {
        let uri = format!("data:image/png;base64,{}", "A".repeat(300));
        let out = truncate_data_uris(&format!(r#"<img src="{uri}">"#));
        assert!(out.contains("data:image/png;base64,[truncated"));
        let short = r#"<img src="data:image/gif;base64,R0lGOD">"#;
        assert_eq!(truncate_data_uris(short), short);
    }

    #[test]
    fn test_meta_with_many_attributes_wrapped() {
        let out = wrap_meta_tags(r#"<meta property="og:title" content="Hi" data-x="1">"#);
        assert_eq!(out, "<meta\n  property=\"og:title\"\n  content=\"Hi\"\n  data-x=\"1\">");
        let two = r#"<meta name="a" content="b">"#;
        assert_eq!(wrap_meta_tags(two), two);
    }

    #[test]
    fn test_reindent_by_depth() {
        let doc = "<html>\n<body>\n<div>\n<p>hi</p>\n<br>\n<img src=x />\n</div>\n</body>\n</html>";
        let out = reindent(doc);
        let expected = "<html>\n  <body>\n    <div>\n      <p>hi</p>\n      <br>\n      <img src=x />\n    </div>\n  </body>\n</html>";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_reindent_floors_at_zero() {
        let out = reindent("</div>\n</div>\n<p>x</p>");
        assert_eq!(out, "</div>\n</div>\n<p>x</p>");
    }

    #[test]
    fn test_reindent_keeps_script_body_layout() {
        let doc = "<div>\n<script>\n{\n  \"a\": 1\n}\n</script>\n</div>";
        let out = reindent(doc);
        let expected = "<div>\n  <script>\n    {\n      \"a\": 1\n    }\n  </script>\n</div>";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_reindent_multiline_tag() {
        let doc = "<div>\n<a\n  href=\"x\"\n  class=\"y\">go</a>\n</div>";
        let out = reindent(doc);
        let expected = "<div>\n  <a\n    href=\"x\"\n    class=\"y\">go</a>\n</div>";
        assert_eq!(out, expected);
    }

    #[test]
    fn test_reindent_counts_tags_after_text() {
        let out = reindent("<div>\n<p>\nhello</p>\n</div>");
        assert_eq!(out, "<div>\n  <p>\n    hello</p>\n</div>");
    }

    #[test]
    fn test_doctype_and_charset_added() {
        let out = ensure_doctype_and_charset("<html>\n  <head>\n    <title>x</title>\n  </head>\n</html>");
        assert!(out.starts_with("<!DOCTYPE html>\n<html>"));
        assert!(out.contains("<head>\n    <meta charset=\"UTF-8\">"));
    }

    #[test]
    fn test_doctype_added_to_fragments_but_never_twice() {
        assert_eq!(ensure_doctype_and_charset("<div>x</div>"), "<!DOCTYPE html>\n<div>x</div>");
        let lower = "  <!doctype html><div>x</div>";
        assert_eq!(ensure_doctype_and_charset(lower), lower);
        let doc = "<!doctype html>\n<html><head><meta charset=\"utf-8\"></head></html>";
        assert_eq!(ensure_doctype_and_charset(doc), doc);
    }
}
