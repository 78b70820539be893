#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod aggregate;
mod config;
mod error;
mod fetcher;
mod limiter;
mod pipeline;
mod progress;
mod resolver;
pub mod schema;
pub mod source;
mod utils;

#[cfg(test)]
mod testing;

/// Opaque record id handed from one stage to the next.
pub type Identifier = u64;

pub use crate::aggregate::{Aggregate, Representative, spell_link};
pub use crate::config::Settings;
pub use crate::error::*;
pub use crate::fetcher::{RecordFetcher, Version};
pub use crate::limiter::{Permit, RateLimiter};
pub use crate::pipeline::{ResolutionTask, Stage, StageSet, TaskOutcome};
pub use crate::progress::{Mode, Report, SlotHandle, SlotView, Tracker};
pub use crate::resolver::{LookupKey, QueryReport, Resolver};
pub use crate::utils::as_overhead;
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;
