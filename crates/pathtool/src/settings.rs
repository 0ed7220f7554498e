use crate::error::{PathError, PathResult};
use crate::stepping::DepthStepParams;
use crate::trochoidal::{TrochoidalParams, STEPS_PER_REV};
use crate::types::{Tool, Toolpath, DEFAULT_FEEDRATE};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Height above the start depth used for traverses when none is configured.
pub const TRAVERSE_CLEARANCE: f64 = 5.0;

/// Feed assumed for rapids when estimating machining time.
pub const DEFAULT_RAPID_FEEDRATE: f64 = 3000.0;

const MAX_DEPTH_STEP_RANGE: RangeInclusive<f64> = 0.1..=100.0;
const RAMPDOWN_RANGE: RangeInclusive<f64> = 0.0..=10.0;
const PRECISION_RANGE: RangeInclusive<f64> = 0.001..=1.0;
const TROCHOIDAL_DIAMETER_RANGE: RangeInclusive<f64> = 0.0..=100.0;
const TROCHOIDAL_STEPOVER_RANGE: RangeInclusive<f64> = 0.1..=5.0;
const FEEDRATE_RANGE: RangeInclusive<f64> = 1.0..=5000.0;

/// Operator parameters of a path job, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathToolSettings {
    pub start_depth: f64,
    pub end_depth: f64,
    pub max_depth_step: f64,
    /// Descent per mm of planar travel.
    pub rampdown: f64,
    pub traverse_height: f64,
    pub laser_mode: bool,
    /// Direction tolerance of the colinear cleaner.
    pub precision: f64,
    pub trochoidal_diameter: f64,
    pub trochoidal_stepover: f64,
    pub trochoidal_order: f64,
    pub trochoidal_skip: f64,
    pub trochoidal_outer_dist: f64,
    pub default_feedrate: f64,
    pub plunge_feedrate: f64,
    pub rapid_feedrate: f64,
    pub output_filename: PathBuf,
}

impl Default for PathToolSettings {
    fn default() -> Self {
        Self {
            start_depth: 0.0,
            end_depth: 0.0,
            max_depth_step: 10.0,
            rampdown: 0.1,
            traverse_height: TRAVERSE_CLEARANCE,
            laser_mode: false,
            precision: 0.005,
            trochoidal_diameter: 3.0,
            trochoidal_stepover: 1.0,
            trochoidal_order: 0.0,
            trochoidal_skip: 1.0,
            trochoidal_outer_dist: 1.0,
            default_feedrate: DEFAULT_FEEDRATE,
            plunge_feedrate: DEFAULT_FEEDRATE / 2.0,
            rapid_feedrate: DEFAULT_RAPID_FEEDRATE,
            output_filename: PathBuf::from("gcode/output.ngc"),
        }
    }
}

impl PathToolSettings {
    /// Defaults fitted to a path: depths span its z range, feeds follow the tool.
    pub fn from_path(path: &Toolpath, tool: Option<&Tool>) -> Self {
        let mut settings = Self::default();
        if let Some((min, max)) = path.bounds() {
            settings.start_depth = max.z;
            settings.end_depth = min.z;
            settings.traverse_height = max.z + TRAVERSE_CLEARANCE;
        }
        if let Some(tool) = tool {
            settings.default_feedrate = tool.feedrate;
            settings.plunge_feedrate = tool.feedrate / 2.0;
        }
        settings.laser_mode = path.laser_mode;
        settings
    }

    /// Load settings from `path`. Missing files yield the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read(path).with_context(|| format!("read settings {}", path.display()))?;
        let settings: PathToolSettings =
            serde_json::from_slice(&data).context("deserialize settings")?;
        Ok(settings)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create settings directory {}", parent.display()))?;
        }

        let data = serde_json::to_vec_pretty(self).context("serialize settings")?;
        fs::write(path, data).with_context(|| format!("write settings {}", path.display()))
    }

    /// `~/.pathtool/settings.json`
    pub fn default_settings_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
        Ok(home.join(".pathtool").join("settings.json"))
    }

    /// Check every parameter against its accepted range.
    pub fn validate(&self) -> PathResult<()> {
        for (name, value) in [
            ("start_depth", self.start_depth),
            ("end_depth", self.end_depth),
            ("traverse_height", self.traverse_height),
            ("trochoidal_order", self.trochoidal_order),
            ("trochoidal_outer_dist", self.trochoidal_outer_dist),
        ] {
            if !value.is_finite() {
                return Err(PathError::invalid(name, value, "must be finite"));
            }
        }
        check_range("max_depth_step", self.max_depth_step, MAX_DEPTH_STEP_RANGE)?;
        check_range("rampdown", self.rampdown, RAMPDOWN_RANGE)?;
        check_range("precision", self.precision, PRECISION_RANGE)?;
        check_range(
            "trochoidal_diameter",
            self.trochoidal_diameter,
            TROCHOIDAL_DIAMETER_RANGE,
        )?;
        check_range(
            "trochoidal_stepover",
            self.trochoidal_stepover,
            TROCHOIDAL_STEPOVER_RANGE,
        )?;
        if !(self.trochoidal_skip.is_finite() && self.trochoidal_skip >= 1.0) {
            return Err(PathError::invalid(
                "trochoidal_skip",
                self.trochoidal_skip,
                "must be at least 1",
            ));
        }
        check_range("default_feedrate", self.default_feedrate, FEEDRATE_RANGE)?;
        check_range("plunge_feedrate", self.plunge_feedrate, FEEDRATE_RANGE)?;
        if !(self.rapid_feedrate.is_finite() && self.rapid_feedrate > 0.0) {
            return Err(PathError::invalid(
                "rapid_feedrate",
                self.rapid_feedrate,
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn depth_step_params(&self) -> DepthStepParams {
        DepthStepParams {
            start_depth: self.start_depth,
            end_depth: self.end_depth,
            max_depth_step: self.max_depth_step,
            rampdown: self.rampdown,
            traverse_height: self.traverse_height,
        }
    }

    pub fn trochoidal_params(&self, tool: Option<&Tool>) -> TrochoidalParams {
        TrochoidalParams {
            diameter: self.trochoidal_diameter,
            stepover: self.trochoidal_stepover,
            order_threshold: self.trochoidal_order,
            skip: self.trochoidal_skip,
            outer_dist: self.trochoidal_outer_dist,
            rampdown: self.rampdown,
            plunge_feedrate: self.plunge_feedrate,
            tool_diameter: tool.map(|t| t.diameter),
            steps_per_rev: STEPS_PER_REV,
        }
    }
}

fn check_range(name: &'static str, value: f64, range: RangeInclusive<f64>) -> PathResult<()> {
    if range.contains(&value) {
        return Ok(());
    }
    let reason = if value.is_finite() {
        "out of range"
    } else {
        "must be finite"
    };
    Err(PathError::invalid(name, value, reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_defaults_are_valid() {
        assert!(PathToolSettings::default().validate().is_ok());
    }

    #[test]
    fn test_defaults_follow_path_and_tool() {
        let path = Toolpath::from_positions([
            DVec3::new(0.0, 0.0, 2.0),
            DVec3::new(10.0, 0.0, -12.0),
        ]);
        let tool = Tool::new("3mm Endmill", 3.0, 800.0);
        let settings = PathToolSettings::from_path(&path, Some(&tool));
        assert_eq!(settings.start_depth, 2.0);
        assert_eq!(settings.end_depth, -12.0);
        assert_eq!(settings.traverse_height, 7.0);
        assert_eq!(settings.default_feedrate, 800.0);
        assert_eq!(settings.plunge_feedrate, 400.0);
    }

    #[test]
    fn test_out_of_range_rejected() {
        let settings = PathToolSettings {
            max_depth_step: 0.0,
            ..PathToolSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(PathError::InvalidParameter {
                name: "max_depth_step",
                ..
            })
        ));

        let settings = PathToolSettings {
            precision: f64::NAN,
            ..PathToolSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings: PathToolSettings =
            serde_json::from_str(r#"{"max_depth_step": 2.5}"#).expect("parse");
        assert_eq!(settings.max_depth_step, 2.5);
        assert_eq!(settings.precision, 0.005);
        assert_eq!(settings.output_filename, PathBuf::from("gcode/output.ngc"));
    }

    #[test]
    fn test_trochoidal_params_take_tool_diameter() {
        let tool = Tool::new("6mm Endmill", 6.0, 1000.0);
        let params = PathToolSettings::default().trochoidal_params(Some(&tool));
        assert_eq!(params.tool_diameter, Some(6.0));
        assert_eq!(params.plunge_feedrate, 500.0);
        assert!(params.validate().is_ok());
    }
}
