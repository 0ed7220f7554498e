//! Trochoidal relief milling.
//!
//! Direct engagement moves are swapped for small circles swept along the
//! move, so the cutter never takes a full-width bite. Relief circles shrink
//! to the local stock clearance, stay at tool radius while plunging, and
//! never leave the remaining stock.

use crate::error::{PathError, PathResult};
use crate::stock::StockBoundary;
use crate::types::{PathPoint, Toolpath};
use glam::DVec3;
use std::f64::consts::TAU;
use tracing::debug;

/// Angular resolution of relief circles.
pub const STEPS_PER_REV: usize = 20;

/// Configuration of a trochoidal run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrochoidalParams {
    /// Diameter of the relief circles.
    pub diameter: f64,
    /// Advance per revolution along the move.
    pub stepover: f64,
    /// Points ranked above this order are left alone.
    pub order_threshold: f64,
    /// Only orders that are a multiple of this stride are milled; others are dropped.
    pub skip: f64,
    /// Points closer to the model than this are left alone.
    pub outer_dist: f64,
    /// Descent per unit of planar travel while plunging; zero keeps `stepover`.
    pub rampdown: f64,
    pub plunge_feedrate: f64,
    /// Cutter diameter; without it plunges are not limited to the tool radius.
    pub tool_diameter: Option<f64>,
    pub steps_per_rev: usize,
}

impl Default for TrochoidalParams {
    fn default() -> Self {
        Self {
            diameter: 3.0,
            stepover: 1.0,
            order_threshold: 0.0,
            skip: 1.0,
            outer_dist: 1.0,
            rampdown: 0.1,
            plunge_feedrate: 500.0,
            tool_diameter: None,
            steps_per_rev: STEPS_PER_REV,
        }
    }
}

impl TrochoidalParams {
    pub fn validate(&self) -> PathResult<()> {
        if !(self.diameter.is_finite() && self.diameter >= 0.0) {
            return Err(PathError::invalid(
                "trochoidal_diameter",
                self.diameter,
                "must not be negative",
            ));
        }
        if !(self.stepover.is_finite() && self.stepover > 0.0) {
            return Err(PathError::invalid(
                "trochoidal_stepover",
                self.stepover,
                "must be positive",
            ));
        }
        if !(self.skip.is_finite() && self.skip >= 1.0) {
            return Err(PathError::invalid(
                "trochoidal_skip",
                self.skip,
                "must be at least 1",
            ));
        }
        if !(self.rampdown.is_finite() && self.rampdown >= 0.0) {
            return Err(PathError::invalid(
                "rampdown",
                self.rampdown,
                "must not be negative",
            ));
        }
        if !(self.plunge_feedrate.is_finite() && self.plunge_feedrate > 0.0) {
            return Err(PathError::invalid(
                "plunge_feedrate",
                self.plunge_feedrate,
                "must be positive",
            ));
        }
        if let Some(diameter) = self.tool_diameter {
            if !(diameter.is_finite() && diameter > 0.0) {
                return Err(PathError::invalid(
                    "tool_diameter",
                    diameter,
                    "must be positive",
                ));
            }
        }
        if self.steps_per_rev == 0 {
            return Err(PathError::invalid("steps_per_rev", 0.0, "must be positive"));
        }
        for (name, value) in [
            ("trochoidal_order", self.order_threshold),
            ("trochoidal_outer_dist", self.outer_dist),
        ] {
            if !value.is_finite() {
                return Err(PathError::invalid(name, value, "must be finite"));
            }
        }
        Ok(())
    }

    fn radius(&self) -> f64 {
        self.diameter / 2.0
    }
}

/// Replace engagement moves of `path` with trochoidal relief motion.
///
/// Every candidate point is checked against all earlier input points, so the
/// cost is quadratic in the path length.
pub fn calc_trochoidal_milling(
    path: &Toolpath,
    params: &TrochoidalParams,
    stock: Option<&dyn StockBoundary>,
) -> PathResult<Toolpath> {
    params.validate()?;

    let mut mill = ReliefMill {
        params,
        stock,
        angle: 0.0,
        output: Vec::with_capacity(path.len()),
    };
    let mut last: Option<(&PathPoint, DVec3)> = None;

    for (index, point) in path.points.iter().enumerate() {
        let Some(position) = point.position else {
            mill.output.push(point.clone());
            continue;
        };
        let prior = &path.points[..index];
        let plunging = last.is_some_and(|(_, from)| from.z > position.z);
        let order = point.order.unwrap_or(0.0);

        let untouched = point.rapid
            || order > params.order_threshold
            || point.dist_from_model.map_or(true, |d| d < params.outer_dist)
            || (plunging && mill.already_cut(position, prior));

        match (last, point.dist_from_model) {
            _ if untouched => mill.output.push(point.clone()),
            // Off-stride passes are dropped.
            _ if order % params.skip != 0.0 => {}
            (Some((from_point, from)), Some(clearance)) => {
                let relief = Move {
                    from,
                    from_clearance: from_point.dist_from_model,
                    to: position,
                    clearance,
                    plunging,
                };
                mill.relieve(point, &relief, prior);
            }
            _ => mill.output.push(point.clone()),
        }
        last = Some((point, position));
    }

    debug!(
        input = path.len(),
        output = mill.output.len(),
        "trochoidal milling"
    );
    let mut result = Toolpath::new(mill.output);
    result.default_feedrate = path.default_feedrate;
    result.laser_mode = path.laser_mode;
    Ok(result)
}

/// One move being replaced, with the stock clearance at both ends.
struct Move {
    from: DVec3,
    from_clearance: Option<f64>,
    to: DVec3,
    clearance: f64,
    plunging: bool,
}

struct ReliefMill<'a> {
    params: &'a TrochoidalParams,
    stock: Option<&'a dyn StockBoundary>,
    /// Sweep angle, carried across moves so circles join up.
    angle: f64,
    output: Vec<PathPoint>,
}

impl ReliefMill<'_> {
    /// A plunge lands inside the clearance already milled around an earlier point.
    fn already_cut(&self, position: DVec3, prior: &[PathPoint]) -> bool {
        let radius = self.params.radius();
        prior.iter().any(|cp| match (cp.position, cp.dist_from_model) {
            (Some(c), Some(clearance)) => position.distance(c) < radius.min(clearance),
            _ => false,
        })
    }

    /// Inside the stock and clear of the zones earlier points already milled.
    fn accepts(&self, candidate: DVec3, prior: &[PathPoint]) -> bool {
        if self.stock.is_some_and(|stock| !stock.contains(candidate)) {
            return false;
        }
        let radius = self.params.radius();
        let margin = 0.5 * self.params.stepover;
        !prior.iter().any(|cp| match (cp.position, cp.dist_from_model) {
            (Some(c), Some(clearance)) => candidate.distance(c) < radius.min(clearance) - margin,
            _ => false,
        })
    }

    fn relieve(&mut self, point: &PathPoint, relief: &Move, prior: &[PathPoint]) {
        let params = self.params;
        let radius = params.radius();
        let tool_radius = params.tool_diameter.map(|d| d / 2.0);
        let full_radius = radius.min(relief.clearance);
        let dist = relief.from.distance(relief.to);

        let mut dist_per_rev = params.stepover;
        if relief.plunging && params.rampdown > 0.0 {
            let bore = tool_radius.map_or(full_radius, |r| full_radius.min(r));
            let helix = params.rampdown * bore * TAU;
            if helix > f64::EPSILON {
                dist_per_rev = helix;
            }
        }

        // Plunging wider than the cutter: bore at tool radius first, then widen.
        let bore_out = match (relief.plunging, params.tool_diameter) {
            (true, Some(diameter)) => full_radius > diameter,
            _ => false,
        };

        let steps = (params.steps_per_rev as f64 * dist / dist_per_rev).floor() as usize + 1;
        let sweep = dist / dist_per_rev / steps as f64 * TAU;
        let feedrate = relief.plunging.then_some(params.plunge_feedrate);

        for i in 0..steps {
            let t = i as f64 / steps as f64;
            self.angle -= sweep;
            let mut dradius = match relief.from_clearance {
                Some(from) => radius.min(from + (relief.clearance - from) * t),
                None => full_radius,
            };
            // A plunge never spirals wider than the cutter itself.
            if let (true, Some(r)) = (relief.plunging, tool_radius) {
                dradius = dradius.min(r);
            }
            let centre = relief.from.lerp(relief.to, t);
            let candidate = self.on_circle(centre, dradius);
            if self.accepts(candidate, prior) {
                self.output.push(relieved(point, candidate, feedrate));
            }
        }

        if let (true, Some(start)) = (bore_out, tool_radius) {
            self.expand_bore(point, relief.to, start, full_radius, prior);
        }
    }

    /// Spiral out from `start` to `full` radius around a bored plunge point.
    fn expand_bore(
        &mut self,
        point: &PathPoint,
        centre: DVec3,
        start: f64,
        full: f64,
        prior: &[PathPoint],
    ) {
        let stepover = self.params.stepover;
        let span = full - start + stepover;
        let steps = (self.params.steps_per_rev as f64 * span / stepover).floor() as usize;
        if steps == 0 {
            return;
        }
        let sweep = span / stepover / steps as f64 * TAU;
        let mut dradius = start;
        for _ in 0..steps {
            self.angle -= sweep;
            dradius = (dradius + span / steps as f64).min(full);
            let candidate = self.on_circle(centre, dradius);
            if self.accepts(candidate, prior) {
                self.output.push(relieved(point, candidate, None));
            }
        }
    }

    fn on_circle(&self, centre: DVec3, radius: f64) -> DVec3 {
        DVec3::new(
            centre.x + radius * self.angle.sin(),
            centre.y + radius * self.angle.cos(),
            centre.z,
        )
    }
}

fn relieved(point: &PathPoint, position: DVec3, feedrate: Option<f64>) -> PathPoint {
    PathPoint {
        position: Some(position),
        feedrate,
        ..point.clone()
    }
}
