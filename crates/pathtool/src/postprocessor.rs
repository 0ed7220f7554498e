use crate::types::Toolpath;
use anyhow::{Context, Result};
use std::fmt;
use std::fs;
use std::path::Path;

/// Generated program, one block per line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GCode {
    pub lines: Vec<String>,
}

impl fmt::Display for GCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Persists a finished toolpath in some machine format.
pub trait PathWriter {
    fn write(&self, path: &Toolpath, destination: &Path) -> Result<()>;
}

/// Writes Grbl flavoured G-code.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrblWriter;

impl PathWriter for GrblWriter {
    fn write(&self, path: &Toolpath, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output directory {}", parent.display()))?;
        }
        let gcode = post_process_grbl(path);
        fs::write(destination, gcode.to_string())
            .with_context(|| format!("write G-code {}", destination.display()))
    }
}

/// Convert a toolpath to Grbl-compatible G-code.
pub fn post_process_grbl(path: &Toolpath) -> GCode {
    let mut lines = vec![
        "G90".to_string(), // absolute positioning
        "G21".to_string(), // millimeters
        "G17".to_string(),
    ];
    // M4 gives dynamic laser power in Grbl.
    lines.push(if path.laser_mode { "M4 S0" } else { "M3" }.to_string());

    let mut current_feed: Option<f64> = None;
    for point in &path.points {
        let Some(p) = point.position else {
            continue;
        };
        if point.rapid {
            lines.push(format!("G0 X{:.4} Y{:.4} Z{:.4}", p.x, p.y, p.z));
            continue;
        }
        let feed = point.feedrate.unwrap_or(path.default_feedrate);
        let mut line = format!("G1 X{:.4} Y{:.4} Z{:.4}", p.x, p.y, p.z);
        if current_feed != Some(feed) {
            line.push_str(&format!(" F{feed:.1}"));
            current_feed = Some(feed);
        }
        lines.push(line);
    }

    lines.push("M5".to_string());
    lines.push("M2".to_string());
    GCode { lines }
}
