//! Relaygate: a Telegram relay bot with challenge-based admission.
//!
//! Unknown users must answer a small arithmetic challenge before their
//! messages reach the operator. Repeated wrong answers lock the user out for
//! a while and eventually ban them. Admitted messages are forwarded to a
//! single operator chat; the operator answers by replying, and the reply is
//! routed back to the user who sent the original.
//!
//! See `DESIGN.md` for the architecture notes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod logging;
pub mod storage;
pub mod types;

pub mod admission;
pub mod history;
pub mod relay;

pub mod telegram;
