//! A path job: one source toolpath, its operator settings and the passes
//! derived from it.
//!
//! Every action computes a new pass history from the current state and only
//! replaces the stored one on success, so a failed action leaves the last
//! good result in place.

use crate::clean;
use crate::error::{PathError, PathResult};
use crate::postprocessor::PathWriter;
use crate::prune;
use crate::settings::PathToolSettings;
use crate::stepping::{self, Pass, PassHistory};
use crate::stock::StockBoundary;
use crate::tool_library::ToolLibrary;
use crate::trochoidal;
use crate::types::{Estimate, Tool, Toolpath};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Receives the complete path whenever the job's output changes.
pub trait PathView {
    fn update(&mut self, path: &Toolpath, tool: Option<&Tool>);
}

pub struct PathJob {
    settings: PathToolSettings,
    tool: Option<Tool>,
    source: Toolpath,
    history: PassHistory,
    stock: Option<Box<dyn StockBoundary>>,
    view: Option<Box<dyn PathView>>,
}

impl PathJob {
    /// Start a job on `path` with settings fitted to it.
    pub fn new(path: Toolpath, tool: Option<Tool>) -> PathResult<Self> {
        path.validate()?;
        let settings = PathToolSettings::from_path(&path, tool.as_ref());
        Ok(Self {
            settings,
            tool,
            history: PassHistory::single(path.clone()),
            source: path,
            stock: None,
            view: None,
        })
    }

    /// Start a job on `path` with the tool called `tool_name` in `library`.
    pub fn with_library(path: Toolpath, library: &ToolLibrary, tool_name: &str) -> Result<Self> {
        let tool = library.resolve(tool_name)?.clone();
        info!(tool = %tool.name, diameter = tool.diameter, "tool resolved from library");
        Ok(Self::new(path, Some(tool))?)
    }

    pub fn settings(&self) -> &PathToolSettings {
        &self.settings
    }

    /// Replace the operator settings. Invalid settings are rejected and the
    /// current ones kept.
    pub fn set_settings(&mut self, settings: PathToolSettings) -> PathResult<()> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    pub fn tool(&self) -> Option<&Tool> {
        self.tool.as_ref()
    }

    pub fn set_tool(&mut self, tool: Option<Tool>) {
        self.tool = tool;
        self.notify();
    }

    pub fn set_stock(&mut self, stock: Option<Box<dyn StockBoundary>>) {
        self.stock = stock;
    }

    pub fn set_view(&mut self, view: Box<dyn PathView>) {
        self.view = Some(view);
        self.notify();
    }

    pub fn source(&self) -> &Toolpath {
        &self.source
    }

    pub fn history(&self) -> &PassHistory {
        &self.history
    }

    /// Swap in a new source path and drop all derived passes.
    pub fn update_path(&mut self, path: Toolpath) -> PathResult<()> {
        path.validate()?;
        info!(points = path.len(), "path updated");
        self.source = path;
        self.reset_history();
        Ok(())
    }

    /// Extend the source path and drop all derived passes.
    pub fn append_path(&mut self, path: &Toolpath) -> PathResult<()> {
        path.validate()?;
        self.source.combine_path(path);
        info!(
            appended = path.len(),
            points = self.source.len(),
            "path appended"
        );
        self.reset_history();
        Ok(())
    }

    pub fn append_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let appended = Toolpath::load_from_path(&path)?;
        self.append_path(&appended)
            .with_context(|| format!("append {}", path.as_ref().display()))
    }

    /// All passes concatenated, carrying the job's feed and laser settings.
    pub fn complete_path(&self) -> Toolpath {
        self.history
            .complete_path(self.settings.default_feedrate, self.settings.laser_mode)
    }

    pub fn estimate(&self) -> Estimate {
        self.complete_path().estimate(self.settings.rapid_feedrate)
    }

    /// Cut the source path in passes down to the end depth.
    pub fn apply_depth_step(&mut self) -> PathResult<()> {
        let result = self.settings.validate().and_then(|()| {
            stepping::apply_depth_step(&self.source, &self.settings.depth_step_params())
        });
        self.commit("depth step", result)
    }

    /// Replace moves over already finished surface with traverses.
    pub fn remove_noncutting_points(&mut self) -> PathResult<()> {
        let result = prune::remove_noncutting_points(&self.history, self.settings.traverse_height);
        self.commit("remove non-cutting points", result)
    }

    /// Drop colinear points from every pass. Returns how many were removed.
    pub fn clean_colinear(&mut self) -> PathResult<usize> {
        let precision = self.settings.precision;
        if !(precision.is_finite() && precision > 0.0) {
            let err = PathError::invalid("precision", precision, "must be positive");
            warn!(action = "clean colinear", error = %err, "action aborted");
            return Err(err);
        }
        let mut removed = 0;
        let passes = self
            .history
            .passes()
            .iter()
            .map(|pass| {
                let mut pass = pass.clone();
                removed += clean::clean_colinear(&mut pass.path, precision);
                pass
            })
            .collect();
        self.commit("clean colinear", Ok(PassHistory::new(passes)))?;
        Ok(removed)
    }

    /// Replace engagement moves of the source path with trochoidal relief.
    pub fn calc_trochoidal_milling(&mut self) -> PathResult<()> {
        let params = self.settings.trochoidal_params(self.tool.as_ref());
        let result =
            trochoidal::calc_trochoidal_milling(&self.source, &params, self.stock.as_deref())
                .map(|path| PassHistory::new(vec![Pass::unstepped(path)]));
        self.commit("trochoidal milling", result)
    }

    /// Write the complete path to the configured output file.
    pub fn save(&self, writer: &dyn PathWriter) -> Result<PathBuf> {
        let destination = self.settings.output_filename.clone();
        let path = self.complete_path();
        writer
            .write(&path, &destination)
            .with_context(|| format!("save job to {}", destination.display()))?;
        info!(
            output = %destination.display(),
            estimate = %path.estimate(self.settings.rapid_feedrate),
            "job saved"
        );
        Ok(destination)
    }

    fn commit(&mut self, action: &'static str, result: PathResult<PassHistory>) -> PathResult<()> {
        match result {
            Ok(history) => {
                self.history = history;
                info!(
                    action,
                    passes = self.history.len(),
                    points = self.history.paths().map(Toolpath::len).sum::<usize>(),
                    "action applied"
                );
                self.notify();
                Ok(())
            }
            Err(err) => {
                warn!(action, error = %err, "action aborted; keeping previous passes");
                Err(err)
            }
        }
    }

    fn reset_history(&mut self) {
        self.history = PassHistory::single(self.source.clone());
        self.notify();
    }

    fn notify(&mut self) {
        if self.view.is_none() {
            return;
        }
        let complete = self.complete_path();
        if let Some(view) = self.view.as_mut() {
            view.update(&complete, self.tool.as_ref());
        }
    }
}

impl Toolpath {
    /// Load a path stored as JSON and check it for non-finite values.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("read toolpath {}", path.display()))?;
        let toolpath: Toolpath = serde_json::from_slice(&bytes)
            .with_context(|| format!("deserialize toolpath {}", path.display()))?;
        toolpath
            .validate()
            .with_context(|| format!("validate toolpath {}", path.display()))?;
        Ok(toolpath)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create toolpath directory {}", parent.display()))?;
        }
        let data = serde_json::to_vec_pretty(self).context("serialize toolpath")?;
        fs::write(path, data).with_context(|| format!("write toolpath {}", path.display()))
    }
}
