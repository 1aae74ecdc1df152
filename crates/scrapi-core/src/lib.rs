//! scrapi core: turn a web page into a tested data-extraction function.
//!
//! [`capture`] records a page's network traffic into a [`Transcript`],
//! [`traffic`] decides which responses are kept, [`normalize`] reformats
//! their bodies, and [`synth`] drives a code-generation agent until a
//! candidate passes the [`executor`] against a declared output [`schema`].

pub mod agent;
pub mod audit;
pub mod capture;
pub mod executor;
pub mod normalize;
pub mod schema;
pub mod synth;
pub mod traffic;
pub mod types;

pub use types::{Attempt, Body, LoopResult, NetworkEvent, SchemaSpec, Transcript, Verdict};
