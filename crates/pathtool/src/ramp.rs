use crate::segment::{is_closed_loop, planar_distance};
use crate::types::PathPoint;
use glam::DVec3;

/// Ramp parameters shared by one depth pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampParams {
    /// Depth reached by the previous pass.
    pub previous_cut_depth: f64,
    /// Floor of the current pass.
    pub depth_limit: f64,
    /// Allowed descent per unit of planar travel.
    pub rampdown: f64,
    /// Safe height for the rapids bracketing a spiral ramp.
    pub traverse_height: f64,
}

/// Replace vertical plunges in a depth-limited segment with ramps.
///
/// Closed loops get a spiral back-ramp along their own geometry; open runs
/// have every point limited to the descent the ramp rate allows since the
/// previous point. Points raised by the ramp lose contact so a later pass
/// finishes them.
pub fn apply_ramp_down(segment: &[PathPoint], params: &RampParams) -> Vec<PathPoint> {
    if params.rampdown <= 0.0 || segment.is_empty() {
        return segment.to_vec();
    }
    if is_closed_loop(segment) {
        ramp_closed_loop(segment, params)
    } else {
        ramp_open_run(segment, params)
    }
}

fn ramp_closed_loop(segment: &[PathPoint], params: &RampParams) -> Vec<PathPoint> {
    let positions: Vec<DVec3> = segment.iter().filter_map(|p| p.position).collect();
    let count = positions.len();
    if count != segment.len() || count < 2 {
        return segment.to_vec();
    }
    let step = |pos: usize| planar_distance(positions[pos], positions[(pos + 1) % count]);
    let perimeter: f64 = (0..count).map(step).sum();
    if perimeter <= f64::EPSILON {
        return segment.to_vec();
    }

    // Spiral up backwards from the deepest point until the previous level is reached.
    let mut depth = positions.iter().map(|p| p.z).fold(f64::INFINITY, f64::min);
    let mut ramp = Vec::new();
    let mut pos = count - 1;
    while depth < params.previous_cut_depth {
        let point = &segment[pos];
        let mut z = positions[pos].z.max(params.depth_limit);
        let mut in_contact = point.in_contact;
        depth += step(pos) * params.rampdown;
        if z < depth {
            z = depth;
            in_contact = false;
        }
        ramp.push(PathPoint {
            source_index: None,
            ..point.at_depth(z, in_contact)
        });
        pos = (pos + count - 1) % count;
    }
    // The deepest ramp point takes over from the loop start, which is dropped below.
    if let Some(start) = ramp.first_mut() {
        start.source_index = segment[0].source_index;
    }

    let (Some(entry), Some(exit)) = (ramp.last(), segment.last()) else {
        return segment.to_vec();
    };
    let mut output = Vec::with_capacity(ramp.len() + count + 1);
    output.push(traverse(entry, params.traverse_height));
    output.extend(ramp.iter().rev().cloned());
    output.extend(segment[1..].iter().cloned());
    output.push(traverse(exit, params.traverse_height));
    output
}

fn ramp_open_run(segment: &[PathPoint], params: &RampParams) -> Vec<PathPoint> {
    let mut output: Vec<PathPoint> = Vec::with_capacity(segment.len());
    let mut last: Option<DVec3> = None;

    for point in segment {
        let Some(position) = point.position else {
            output.push(point.clone());
            continue;
        };
        let mut z = position.z.max(params.depth_limit);
        let mut in_contact = point.in_contact;

        if let Some(previous) = last {
            if !point.rapid && z < params.previous_cut_depth {
                let allowed = planar_distance(position, previous) * params.rampdown;
                let from = previous.z.min(params.previous_cut_depth);
                if from - z > allowed {
                    z = from - allowed;
                    in_contact = false;
                }
            }
        }

        let ramped = point.at_depth(z, in_contact);
        last = ramped.position;
        output.push(ramped);
    }
    output
}

fn traverse(point: &PathPoint, height: f64) -> PathPoint {
    let position = point.position.unwrap_or_default();
    PathPoint::traverse_above(position, height, point.inside_model)
}
