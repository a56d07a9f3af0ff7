//! Audible progress feedback for the bootstrap.
//!
//! A bounded, single-consumer announcement queue serializes spoken messages
//! so concurrent callers never overlap output. Delivery is best-effort by
//! design: a full queue drops the newest message, a quiet window discards
//! instead of deferring, and announcement failures are logged, never
//! propagated as phase failures.

pub mod config;
pub mod speaker;
pub mod voices;

pub use config::{is_quiet, local_hour, SpeakerConfig, DEFAULT_RATE_WPM, DEFAULT_VOICE};
pub use speaker::{Announcer, SayAnnouncer, Speaker, QUEUE_CAPACITY};
pub use voices::{is_voice_available, list_available_voices, parse_voice_listing, voice_in_listing};
