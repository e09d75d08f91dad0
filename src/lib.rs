//! textcal: natural-language text to validated calendar events.
//!
//! A model reads free text and proposes event fields; this crate builds the
//! prompt, calls the model with timeouts and retries, repairs and parses the
//! reply, and only hands out records that pass validation.
//!
//! See `DESIGN.md` for the module map.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod credentials;
pub mod extraction;
pub mod ics;
pub mod logging;
pub mod providers;
pub mod types;
