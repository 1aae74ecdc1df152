//! Traffic filter: decides which observed responses are worth recording.
//!
//! The decision is made from request metadata alone, before any body is
//! read, so rejected responses never cost a CDP round trip. Policy is ordered
//! and the first matching rule wins:
//!
//! 1. rendering assets (images, stylesheets, scripts, fonts, media) are dropped;
//! 2. `OPTIONS` preflights are dropped;
//! 3. URLs on the deny list (analytics, tag managers, consent, chat widgets,
//!    static CDN paths) are dropped;
//! 4. everything else is kept, with a body policy derived from its content type.
//!
//! The deny list is data, not logic. The default table is embedded from
//! `deny_list.json` at compile time; tests and callers can supply their own.

use serde::Deserialize;
use std::sync::OnceLock;

/// Raw JSON of the default deny list, embedded so there is no runtime file I/O.
const DENY_LIST_JSON: &str = include_str!("deny_list.json");

/// CDP resource type of a request, named the way browsers report them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    TextTrack,
    Xhr,
    Fetch,
    Prefetch,
    EventSource,
    WebSocket,
    Manifest,
    SignedExchange,
    Ping,
    CspViolationReport,
    Preflight,
    Other,
}

impl ResourceKind {
    /// Parse a CDP `Network.ResourceType` string (case-insensitive).
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "document" => Self::Document,
            "stylesheet" => Self::Stylesheet,
            "image" => Self::Image,
            "media" => Self::Media,
            "font" => Self::Font,
            "script" => Self::Script,
            "texttrack" => Self::TextTrack,
            "xhr" => Self::Xhr,
            "fetch" => Self::Fetch,
            "prefetch" => Self::Prefetch,
            "eventsource" => Self::EventSource,
            "websocket" => Self::WebSocket,
            "manifest" => Self::Manifest,
            "signedexchange" => Self::SignedExchange,
            "ping" => Self::Ping,
            "cspviolationreport" => Self::CspViolationReport,
            "preflight" => Self::Preflight,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Stylesheet => "stylesheet",
            Self::Image => "image",
            Self::Media => "media",
            Self::Font => "font",
            Self::Script => "script",
            Self::TextTrack => "texttrack",
            Self::Xhr => "xhr",
            Self::Fetch => "fetch",
            Self::Prefetch => "prefetch",
            Self::EventSource => "eventsource",
            Self::WebSocket => "websocket",
            Self::Manifest => "manifest",
            Self::SignedExchange => "signedexchange",
            Self::Ping => "ping",
            Self::CspViolationReport => "cspviolationreport",
            Self::Preflight => "preflight",
            Self::Other => "other",
        }
    }

    /// Assets that only matter for rendering, never for data.
    pub fn is_render_asset(self) -> bool {
        matches!(
            self,
            Self::Image | Self::Stylesheet | Self::Script | Self::Font | Self::Media
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single URL matching rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UrlRule {
    Contains(String),
    Prefix(String),
    Suffix(String),
}

impl UrlRule {
    /// `url` must already be lowercased.
    fn matches(&self, url: &str) -> bool {
        match self {
            UrlRule::Contains(p) => url.contains(p.as_str()),
            UrlRule::Prefix(p) => url.starts_with(p.as_str()),
            UrlRule::Suffix(p) => url.ends_with(p.as_str()),
        }
    }

    fn lowercased(self) -> Self {
        match self {
            UrlRule::Contains(p) => UrlRule::Contains(p.to_lowercase()),
            UrlRule::Prefix(p) => UrlRule::Prefix(p.to_lowercase()),
            UrlRule::Suffix(p) => UrlRule::Suffix(p.to_lowercase()),
        }
    }
}

/// Set of URL rules for known non-substantive third-party traffic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DenyList {
    rules: Vec<UrlRule>,
}

impl DenyList {
    pub fn new(rules: Vec<UrlRule>) -> Self {
        Self {
            rules: rules.into_iter().map(UrlRule::lowercased).collect(),
        }
    }

    /// Parse a deny list from its JSON form (`{"rules": [{"prefix": "..."}]}`).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: DenyList = serde_json::from_str(json)?;
        Ok(Self::new(raw.rules))
    }

    /// The embedded default list, parsed once.
    pub fn builtin() -> &'static DenyList {
        static BUILTIN: OnceLock<DenyList> = OnceLock::new();
        BUILTIN.get_or_init(|| DenyList::from_json(DENY_LIST_JSON).unwrap_or_default())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_denied(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.rules.iter().any(|rule| rule.matches(&lower))
    }
}

/// What to do with a kept response's body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    /// Read and parse as JSON.
    Json,
    /// Read as text.
    Text,
    /// Record metadata only; never read the body.
    MetadataOnly,
}

/// Body policy for a response content type.
pub fn body_policy(content_type: &str) -> BodyPolicy {
    let ct = content_type.trim().to_ascii_lowercase();
    if ct.contains("application/json") {
        BodyPolicy::Json
    } else if ct.starts_with("text/") {
        BodyPolicy::Text
    } else {
        BodyPolicy::MetadataOnly
    }
}

/// Why a response was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    RenderAsset,
    Preflight,
    DenyListed,
}

/// Filter decision for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Keep(BodyPolicy),
    Drop(DropReason),
}

impl Decision {
    pub fn is_keep(self) -> bool {
        matches!(self, Decision::Keep(_))
    }
}

/// Request metadata the filter decides on.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub method: &'a str,
    pub resource_type: ResourceKind,
    pub url: &'a str,
    pub content_type: &'a str,
}

/// Stateless keep/drop predicate over network responses.
#[derive(Debug, Clone)]
pub struct TrafficFilter {
    deny_list: DenyList,
}

impl Default for TrafficFilter {
    fn default() -> Self {
        Self {
            deny_list: DenyList::builtin().clone(),
        }
    }
}

impl TrafficFilter {
    pub fn with_deny_list(deny_list: DenyList) -> Self {
        Self { deny_list }
    }

    pub fn decide(&self, candidate: &Candidate<'_>) -> Decision {
        if candidate.resource_type.is_render_asset() {
            return Decision::Drop(DropReason::RenderAsset);
        }
        if candidate.method.eq_ignore_ascii_case("OPTIONS") {
            return Decision::Drop(DropReason::Preflight);
        }
        if self.deny_list.is_denied(candidate.url) {
            return Decision::Drop(DropReason::DenyListed);
        }
        Decision::Keep(body_policy(candidate.content_type))
    }

    pub fn keep(&self, candidate: &Candidate<'_>) -> bool {
        self.decide(candidate).is_keep()
    }
}
