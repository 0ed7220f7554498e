use crate::error::{PathError, PathResult};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Feed rate used when neither the path nor the tool provides one.
pub const DEFAULT_FEEDRATE: f64 = 1000.0;

/// A cutting tool as seen by the path passes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tool {
    pub name: String,
    /// Cutting diameter in path units.
    pub diameter: f64,
    /// Default feed rate for cutting moves.
    pub feedrate: f64,
}

impl Tool {
    pub fn new(name: impl Into<String>, diameter: f64, feedrate: f64) -> Self {
        Self {
            name: name.into(),
            diameter,
            feedrate,
        }
    }

    pub fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// A single waypoint of a toolpath.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathPoint {
    /// Absent for entries that carry no coordinates; those never take part in geometry.
    pub position: Option<DVec3>,
    #[serde(default)]
    pub rapid: bool,
    #[serde(default)]
    pub inside_model: bool,
    /// True when the cutter reaches its final depth at this point.
    #[serde(default = "default_true")]
    pub in_contact: bool,
    #[serde(default)]
    pub dist_from_model: Option<f64>,
    #[serde(default)]
    pub order: Option<f64>,
    /// Per-point feed override.
    #[serde(default)]
    pub feedrate: Option<f64>,
    /// Index of the source point this point was derived from. Set by depth
    /// stepping; points inserted by a pass (ramps, traverses) have none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_index: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl PathPoint {
    /// A cutting point at `position`.
    pub fn new(position: DVec3) -> Self {
        Self {
            position: Some(position),
            rapid: false,
            inside_model: false,
            in_contact: true,
            dist_from_model: None,
            order: None,
            feedrate: None,
            source_index: None,
        }
    }

    pub fn rapid(position: DVec3) -> Self {
        Self {
            rapid: true,
            ..Self::new(position)
        }
    }

    /// Rapid move above `position` at `height`, used to lift out of or drop back into a cut.
    pub fn traverse_above(position: DVec3, height: f64, inside_model: bool) -> Self {
        Self {
            position: Some(DVec3::new(position.x, position.y, height)),
            rapid: true,
            inside_model,
            in_contact: false,
            dist_from_model: None,
            order: None,
            feedrate: None,
            source_index: None,
        }
    }

    pub fn with_dist_from_model(mut self, dist: f64) -> Self {
        self.dist_from_model = Some(dist);
        self
    }

    pub fn with_order(mut self, order: f64) -> Self {
        self.order = Some(order);
        self
    }

    pub fn with_inside_model(mut self, inside: bool) -> Self {
        self.inside_model = inside;
        self
    }

    /// Copy of this point moved to `z`, all metadata kept.
    pub fn at_depth(&self, z: f64, in_contact: bool) -> Self {
        Self {
            position: self.position.map(|p| DVec3::new(p.x, p.y, z)),
            in_contact,
            ..self.clone()
        }
    }

    fn is_finite(&self) -> bool {
        self.position.map_or(true, |p| p.is_finite())
            && [self.dist_from_model, self.order, self.feedrate]
                .iter()
                .flatten()
                .all(|v| v.is_finite())
    }
}

/// An ordered sequence of path points plus path-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Toolpath {
    pub points: Vec<PathPoint>,
    #[serde(default = "default_feedrate")]
    pub default_feedrate: f64,
    /// Only interpreted by writers.
    #[serde(default)]
    pub laser_mode: bool,
}

fn default_feedrate() -> f64 {
    DEFAULT_FEEDRATE
}

impl Default for Toolpath {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Toolpath {
    pub fn new(points: Vec<PathPoint>) -> Self {
        Self {
            points,
            default_feedrate: DEFAULT_FEEDRATE,
            laser_mode: false,
        }
    }

    /// Build a cutting path from bare coordinates.
    pub fn from_positions<I: IntoIterator<Item = DVec3>>(positions: I) -> Self {
        Self::new(positions.into_iter().map(PathPoint::new).collect())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn positions(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.points.iter().filter_map(|p| p.position)
    }

    /// Append all points of `other`, keeping this path's settings.
    pub fn combine_path(&mut self, other: &Toolpath) {
        self.points.extend(other.points.iter().cloned());
    }

    /// Total 3-D length over all positioned points.
    pub fn path_length(&self) -> f64 {
        let positions: Vec<DVec3> = self.positions().collect();
        positions.windows(2).map(|w| w[0].distance(w[1])).sum()
    }

    /// Axis-aligned bounds of all positioned points.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        self.positions().fold(None, |acc, p| match acc {
            None => Some((p, p)),
            Some((min, max)) => Some((min.min(p), max.max(p))),
        })
    }

    /// Reject coordinates or metadata that are NaN or infinite.
    pub fn validate(&self) -> PathResult<()> {
        if !self.default_feedrate.is_finite() {
            return Err(PathError::NonFinite {
                index: None,
                field: "default_feedrate",
            });
        }
        match self.points.iter().position(|p| !p.is_finite()) {
            Some(index) => Err(PathError::NonFinite {
                index: Some(index),
                field: "point",
            }),
            None => Ok(()),
        }
    }

    /// Distance and time summary; rapids run at `rapid_feedrate`.
    pub fn estimate(&self, rapid_feedrate: f64) -> Estimate {
        let mut estimate = Estimate::default();
        let mut last: Option<DVec3> = None;
        for point in &self.points {
            let Some(position) = point.position else {
                continue;
            };
            if let Some(previous) = last {
                let dist = previous.distance(position);
                if point.rapid {
                    estimate.rapid_distance += dist;
                    if rapid_feedrate > 0.0 {
                        estimate.total_time_min += dist / rapid_feedrate;
                    }
                } else {
                    let feed = point.feedrate.unwrap_or(self.default_feedrate);
                    estimate.cutting_distance += dist;
                    if feed > 0.0 {
                        estimate.total_time_min += dist / feed;
                        estimate.cutting_time_min += dist / feed;
                    }
                }
            }
            last = Some(position);
        }
        estimate.total_distance = estimate.cutting_distance + estimate.rapid_distance;
        estimate
    }
}

/// Machining estimate of a completed path. Times are in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub total_distance: f64,
    pub cutting_distance: f64,
    pub rapid_distance: f64,
    pub total_time_min: f64,
    pub cutting_time_min: f64,
}

impl Estimate {
    /// `h:mm:ss (h:mm:ss)`: total time, cutting time in parentheses.
    pub fn time_label(&self) -> String {
        format!(
            "{} ({})",
            format_minutes(self.total_time_min),
            format_minutes(self.cutting_time_min)
        )
    }

    /// `total (c cutting)`.
    pub fn distance_label(&self) -> String {
        format!(
            "{:.1} (c {:.0})",
            self.total_distance, self.cutting_distance
        )
    }
}

impl fmt::Display for Estimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "time {}, distance {}", self.time_label(), self.distance_label())
    }
}

fn format_minutes(minutes: f64) -> String {
    let seconds = (minutes * 60.0).max(0.0).round() as u64;
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}
