use geo::Point;
use log::warn;
use serde::{Deserialize, Serialize};

use super::ExecutorConfig;
use crate::{Error, OsmNodeId, RoadNode, model::geo_distance};

/// What a segment depicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Exploration,
    Route,
    Player,
}

impl SegmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SegmentKind::Exploration => "exploration",
            SegmentKind::Route => "route",
            SegmentKind::Player => "player",
        }
    }
}

/// Line drawn between two points over `[start_time, end_time]` milliseconds
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub from: Point<f64>,
    pub to: Point<f64>,
    pub start_time: f64,
    pub end_time: f64,
    pub kind: SegmentKind,
    pub from_id: Option<OsmNodeId>,
    pub to_id: Option<OsmNodeId>,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Fraction of the segment drawn at time `t`
    pub fn progress_at(&self, t: f64) -> f64 {
        if t >= self.end_time {
            1.0
        } else if t <= self.start_time {
            0.0
        } else {
            (t - self.start_time) / self.duration()
        }
    }

    /// Point reached at time `t` when drawing from `from` to `to`
    pub fn point_at(&self, t: f64) -> Point<f64> {
        let progress = self.progress_at(t);
        Point::new(
            self.from.x() + (self.to.x() - self.from.x()) * progress,
            self.from.y() + (self.to.y() - self.from.y()) * progress,
        )
    }
}

/// Segment visible at a playback time together with its draw progress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSegment<'a> {
    pub segment: &'a Segment,
    pub progress: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Playhead follows the append clock
    #[default]
    Live,
    /// Playhead was positioned explicitly
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineStats {
    pub segments: usize,
    pub exploration_segments: usize,
    pub route_segments: usize,
    pub player_segments: usize,
    pub rejected_segments: usize,
    pub total_duration: f64,
}

/// Append-only, time-ordered record of a run.
///
/// Appending advances an internal clock and never looks at the playhead, so
/// seeking during a live run cannot break timestamp ordering.
#[derive(Debug, Clone)]
pub struct Timeline {
    segments: Vec<Segment>,
    clock: f64,
    position: f64,
    mode: PlaybackMode,
    distance_time_multiplier: f64,
    zero_length_epsilon_m: f64,
    rejected: usize,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(&ExecutorConfig::default())
    }
}

impl Timeline {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            segments: Vec::new(),
            clock: 0.0,
            position: 0.0,
            mode: PlaybackMode::Live,
            distance_time_multiplier: config.distance_time_multiplier,
            zero_length_epsilon_m: config.zero_length_epsilon_m,
            rejected: 0,
        }
    }

    /// Appends a segment lasting `distance * multiplier * speed_multiplier`
    /// milliseconds and returns that duration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DegenerateSegment`] for segments shorter than the
    /// zero-length threshold, which usually means coordinates were rounded.
    pub fn add_segment(
        &mut self,
        from: Point<f64>,
        to: Point<f64>,
        kind: SegmentKind,
        speed_multiplier: f64,
    ) -> Result<f64, Error> {
        self.push(from, to, kind, speed_multiplier, None, None)
    }

    /// Same as [`Timeline::add_segment`], tagging the segment with node ids.
    pub fn add_node_segment(
        &mut self,
        from: &RoadNode,
        to: &RoadNode,
        kind: SegmentKind,
        speed_multiplier: f64,
    ) -> Result<f64, Error> {
        self.push(
            from.geometry,
            to.geometry,
            kind,
            speed_multiplier,
            Some(from.id),
            Some(to.id),
        )
    }

    fn push(
        &mut self,
        from: Point<f64>,
        to: Point<f64>,
        kind: SegmentKind,
        speed_multiplier: f64,
        from_id: Option<OsmNodeId>,
        to_id: Option<OsmNodeId>,
    ) -> Result<f64, Error> {
        let distance = geo_distance(from, to);
        if distance < self.zero_length_epsilon_m {
            self.rejected += 1;
            warn!(
                "Zero-length {} segment at ({:.8}, {:.8}) between {from_id:?} and {to_id:?}, \
                 coordinate precision may be lost",
                kind.as_str(),
                from.x(),
                from.y()
            );
            return Err(Error::DegenerateSegment {
                lon: from.x(),
                lat: from.y(),
            });
        }

        let duration = distance * self.distance_time_multiplier * speed_multiplier.max(0.0);
        let start_time = self.clock;
        self.clock += duration;
        self.segments.push(Segment {
            from,
            to,
            start_time,
            end_time: self.clock,
            kind,
            from_id,
            to_id,
        });
        Ok(duration)
    }

    /// Segments already started at time `t` with their draw progress.
    pub fn active_segments_at(&self, t: f64) -> Vec<ActiveSegment<'_>> {
        let visible = self.segments.partition_point(|s| s.start_time <= t);
        self.segments[..visible]
            .iter()
            .map(|segment| ActiveSegment {
                segment,
                progress: segment.progress_at(t),
            })
            .collect()
    }

    /// Live mode follows the clock; replay mode reads the playhead.
    pub fn current_playback_time(&self) -> f64 {
        match self.mode {
            PlaybackMode::Live => self.clock,
            PlaybackMode::Replay => self.position * self.clock,
        }
    }

    /// Moves the playhead to a normalized position and enters replay mode.
    pub fn seek_to_position(&mut self, position: f64) {
        self.position = if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) };
        self.mode = PlaybackMode::Replay;
    }

    /// Moves the playhead to `t` milliseconds and enters replay mode.
    pub fn seek_to_time(&mut self, t: f64) {
        let position = if self.clock > 0.0 { t / self.clock } else { 0.0 };
        self.seek_to_position(position);
    }

    /// Returns the playhead to the append clock.
    pub fn go_live(&mut self) {
        self.mode = PlaybackMode::Live;
        self.position = 1.0;
    }

    /// Playhead position in `[0, 1]`
    pub fn position(&self) -> f64 {
        match self.mode {
            PlaybackMode::Live => 1.0,
            PlaybackMode::Replay => self.position,
        }
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    pub fn total_duration(&self) -> f64 {
        self.clock
    }

    pub fn current_timer(&self) -> f64 {
        self.clock
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn count(&self, kind: SegmentKind) -> usize {
        self.segments.iter().filter(|s| s.kind == kind).count()
    }

    /// Zero-length segments refused since the last clear
    pub fn rejected_segments(&self) -> usize {
        self.rejected
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.clock = 0.0;
        self.position = 0.0;
        self.mode = PlaybackMode::Live;
        self.rejected = 0;
    }

    pub fn stats(&self) -> TimelineStats {
        TimelineStats {
            segments: self.len(),
            exploration_segments: self.count(SegmentKind::Exploration),
            route_segments: self.count(SegmentKind::Route),
            player_segments: self.count(SegmentKind::Player),
            rejected_segments: self.rejected,
            total_duration: self.clock,
        }
    }
}
