use crate::types::PathPoint;
use glam::DVec3;

/// Planar distance under which a growing run is closed into a loop.
pub const LOOP_CLOSE_TOLERANCE: f64 = 1e-5;

/// Planar distance under which a segment's endpoints count as the same point.
pub const CLOSED_SEGMENT_TOLERANCE: f64 = 1e-4;

/// A contiguous run of positioned points, either a closed loop or a run
/// bounded by rapids and path ends.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub points: Vec<PathPoint>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First and last point coincide in the plane.
    pub fn is_closed(&self) -> bool {
        is_closed_loop(&self.points)
    }
}

/// XY distance between two positions.
pub(crate) fn planar_distance(a: DVec3, b: DVec3) -> f64 {
    a.truncate().distance(b.truncate())
}

pub(crate) fn is_closed_loop(points: &[PathPoint]) -> bool {
    match (
        points.first().and_then(|p| p.position),
        points.last().and_then(|p| p.position),
    ) {
        (Some(first), Some(last)) => planar_distance(first, last) < CLOSED_SEGMENT_TOLERANCE,
        _ => false,
    }
}

/// Split a point sequence into closed loops and rapid-separated runs.
///
/// A rapid point ends the current segment and opens the next one. Points
/// without a position are dropped.
pub fn segment_path(points: &[PathPoint]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut buffer: Vec<PathPoint> = Vec::new();
    let mut start: Option<DVec3> = None;

    for point in points {
        let Some(position) = point.position else {
            continue;
        };
        if point.rapid && !buffer.is_empty() {
            segments.push(Segment {
                points: std::mem::take(&mut buffer),
            });
        }
        if buffer.is_empty() {
            start = Some(position);
        }
        buffer.push(point.clone());

        let closes = buffer.len() > 2
            && start.is_some_and(|s| planar_distance(s, position) < LOOP_CLOSE_TOLERANCE);
        if closes {
            segments.push(Segment {
                points: std::mem::take(&mut buffer),
            });
        }
    }

    if !buffer.is_empty() {
        segments.push(Segment { points: buffer });
    }
    segments
}
