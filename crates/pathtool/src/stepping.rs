use crate::error::{PathError, PathResult};
use crate::ramp::{apply_ramp_down, RampParams};
use crate::segment::segment_path;
use crate::types::{PathPoint, Toolpath};
use std::collections::HashMap;
use tracing::debug;

/// Segments need more points than this before a ramp is applied.
const MIN_RAMP_SEGMENT_LEN: usize = 3;

/// Parameters of a multi-pass depth stepping run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthStepParams {
    pub start_depth: f64,
    pub end_depth: f64,
    /// Maximum depth removed per pass. Must be positive.
    pub max_depth_step: f64,
    /// Descent per unit of planar travel; zero disables ramping.
    pub rampdown: f64,
    pub traverse_height: f64,
}

impl DepthStepParams {
    pub fn validate(&self) -> PathResult<()> {
        for (name, value) in [
            ("start_depth", self.start_depth),
            ("end_depth", self.end_depth),
            ("traverse_height", self.traverse_height),
        ] {
            if !value.is_finite() {
                return Err(PathError::invalid(name, value, "must be finite"));
            }
        }
        if !(self.max_depth_step.is_finite() && self.max_depth_step > 0.0) {
            return Err(PathError::invalid(
                "max_depth_step",
                self.max_depth_step,
                "must be positive",
            ));
        }
        if !(self.rampdown.is_finite() && self.rampdown >= 0.0) {
            return Err(PathError::invalid(
                "rampdown",
                self.rampdown,
                "must not be negative",
            ));
        }
        Ok(())
    }
}

/// One traversal of the path at a single depth limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Pass {
    /// `None` for the unprocessed source path.
    pub depth_limit: Option<f64>,
    /// No point was clamped and the limit reached the end depth.
    pub finished: bool,
    pub path: Toolpath,
}

impl Pass {
    /// Wrap a path that was not produced by depth stepping.
    pub fn unstepped(path: Toolpath) -> Self {
        Self {
            depth_limit: None,
            finished: true,
            path,
        }
    }
}

/// Ordered outputs of successive passes, first pass first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassHistory {
    passes: Vec<Pass>,
}

impl PassHistory {
    pub fn new(passes: Vec<Pass>) -> Self {
        Self { passes }
    }

    pub fn single(path: Toolpath) -> Self {
        Self::new(vec![Pass::unstepped(path)])
    }

    pub fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Toolpath> {
        self.passes.iter().map(|pass| &pass.path)
    }

    pub fn depth_limits(&self) -> Vec<f64> {
        self.passes.iter().filter_map(|pass| pass.depth_limit).collect()
    }

    /// The pass at `index` with its predecessor. `None` for the first pass
    /// and for indices past the end.
    pub fn corresponding(&self, index: usize) -> Option<(&Pass, &Pass)> {
        let previous = self.passes.get(index.checked_sub(1)?)?;
        let current = self.passes.get(index)?;
        Some((previous, current))
    }

    /// For every point of the pass at `index`, the position of its counterpart
    /// in the previous pass.
    ///
    /// Stepped passes are matched by source index, and points a pass inserted
    /// (ramps, traverses) have no counterpart. Both passes must derive from the
    /// same source points. Passes without source indices are matched by
    /// position and must be equally long.
    pub fn counterparts(&self, index: usize) -> PathResult<Vec<Option<usize>>> {
        let (previous, current) = self
            .corresponding(index)
            .ok_or(PathError::NoPredecessor {
                pass: index,
                passes: self.len(),
            })?;
        let before = &previous.path.points;
        let points = &current.path.points;

        let indexed = |points: &[PathPoint]| {
            points.iter().filter(|p| p.source_index.is_some()).count()
        };
        let (expected, found) = (indexed(before), indexed(points));
        if expected == 0 && found == 0 {
            if before.len() != points.len() {
                return Err(PathError::PassLengthMismatch {
                    pass: index,
                    expected: before.len(),
                    found: points.len(),
                });
            }
            return Ok((0..points.len()).map(Some).collect());
        }
        if expected != found {
            return Err(PathError::PassLengthMismatch {
                pass: index,
                expected,
                found,
            });
        }

        let lookup: HashMap<usize, usize> = before
            .iter()
            .enumerate()
            .filter_map(|(pos, p)| p.source_index.map(|source| (source, pos)))
            .collect();
        points
            .iter()
            .map(|point| match point.source_index {
                None => Ok(None),
                Some(source) => match lookup.get(&source) {
                    Some(&pos) => Ok(Some(pos)),
                    None => Err(PathError::UnmatchedSourcePoint {
                        pass: index,
                        source_index: source,
                    }),
                },
            })
            .collect()
    }

    /// All passes concatenated in order.
    pub fn complete_path(&self, default_feedrate: f64, laser_mode: bool) -> Toolpath {
        let mut complete = Toolpath::new(Vec::new());
        complete.default_feedrate = default_feedrate;
        complete.laser_mode = laser_mode;
        for path in self.paths() {
            complete.combine_path(path);
        }
        complete
    }
}

/// Clamp every point of a segment to `depth_limit`.
///
/// Returns the clamped points and whether any point had to be raised.
/// Clamped points lose contact; all others are in contact.
pub fn apply_stepping(segment: &[PathPoint], depth_limit: f64) -> (Vec<PathPoint>, bool) {
    let mut clamped_any = false;
    let output = segment
        .iter()
        .map(|point| match point.position {
            Some(position) if position.z < depth_limit => {
                clamped_any = true;
                point.at_depth(depth_limit, false)
            }
            _ => PathPoint {
                in_contact: true,
                ..point.clone()
            },
        })
        .collect();
    (output, clamped_any)
}

/// Cut `path` in successive passes of at most `max_depth_step` until
/// `end_depth` is reached.
pub fn apply_depth_step(path: &Toolpath, params: &DepthStepParams) -> PathResult<PassHistory> {
    params.validate()?;

    let end = params.end_depth;
    let mut depth_limit = (params.start_depth - params.max_depth_step).max(end);
    let mut previous_cut_depth = params.start_depth;
    let indexed: Vec<PathPoint> = path
        .points
        .iter()
        .enumerate()
        .map(|(index, point)| PathPoint {
            source_index: Some(index),
            ..point.clone()
        })
        .collect();
    let segments = segment_path(&indexed);
    let mut passes = Vec::new();

    loop {
        let mut clamped = false;
        let mut points = Vec::with_capacity(path.len());
        let ramp = RampParams {
            previous_cut_depth,
            depth_limit,
            rampdown: params.rampdown,
            traverse_height: params.traverse_height,
        };

        for segment in &segments {
            let (mut output, segment_clamped) = apply_stepping(&segment.points, depth_limit);
            clamped |= segment_clamped;
            if params.rampdown != 0.0 && output.len() > MIN_RAMP_SEGMENT_LEN {
                output = apply_ramp_down(&output, &ramp);
            }
            points.extend(output);
        }

        let at_end = depth_limit <= end;
        let finished = !clamped && at_end;
        debug!(
            pass = passes.len(),
            depth_limit,
            points = points.len(),
            finished,
            "depth pass"
        );
        let mut pass_path = Toolpath::new(points);
        pass_path.default_feedrate = path.default_feedrate;
        pass_path.laser_mode = path.laser_mode;
        passes.push(Pass {
            depth_limit: Some(depth_limit),
            finished,
            path: pass_path,
        });

        // A pass at the end depth is final even when points below it stay clamped.
        if finished || at_end {
            break;
        }
        previous_cut_depth = depth_limit;
        depth_limit = (depth_limit - params.max_depth_step).max(end);
    }

    Ok(PassHistory::new(passes))
}
