//! Recording and playback of a search run.
//!
//! The [`StepExecutor`] turns each search step into time-stamped
//! [`Segment`]s on a [`Timeline`]; a [`TimelinePlayer`] scrubs through the
//! result and a [`BackgroundRunner`] prepares a ready-made replay off the
//! main thread.

mod background;
mod config;
mod executor;
mod player;
mod timeline;
mod to_geojson;

pub use background::{BackgroundRunner, PrecomputedReplay};
pub use config::ExecutorConfig;
pub use executor::{ExecutionObserver, ExecutorState, StartMode, StepExecutor};
pub use player::{MAX_PLAYBACK_SPEED, MIN_PLAYBACK_SPEED, PlayerState, TimelinePlayer};
pub use timeline::{ActiveSegment, PlaybackMode, Segment, SegmentKind, Timeline, TimelineStats};
pub use to_geojson::path_to_geojson;
