use crate::types::Tool;
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Cutters known by name, stored as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ToolLibrary {
    pub tools: Vec<Tool>,
}

impl ToolLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a library from `path`. A missing file is an empty library.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let data =
            fs::read(path).with_context(|| format!("read tool library {}", path.display()))?;
        let library: Self = serde_json::from_slice(&data)
            .with_context(|| format!("deserialize tool library {}", path.display()))?;
        for tool in &library.tools {
            check_tool(tool).with_context(|| format!("tool library {}", path.display()))?;
        }
        Ok(library)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create tool library directory {}", parent.display()))?;
        }
        let data = serde_json::to_vec_pretty(self).context("serialize tool library")?;
        fs::write(path, data).with_context(|| format!("write tool library {}", path.display()))
    }

    /// Store `tool` under its name. Returns the tool it replaced.
    pub fn add_tool(&mut self, tool: Tool) -> Result<Option<Tool>> {
        check_tool(&tool)?;
        match self.tools.iter_mut().find(|t| t.name == tool.name) {
            Some(slot) => Ok(Some(std::mem::replace(slot, tool))),
            None => {
                self.tools.push(tool);
                Ok(None)
            }
        }
    }

    pub fn remove_tool(&mut self, name: &str) -> Option<Tool> {
        let index = self.tools.iter().position(|t| t.name == name)?;
        Some(self.tools.remove(index))
    }

    pub fn find(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Like [`find`](Self::find), but an unknown name is an error naming the
    /// tools on offer.
    pub fn resolve(&self, name: &str) -> Result<&Tool> {
        self.find(name).ok_or_else(|| {
            let known: Vec<&str> = self.tools.iter().map(|t| t.name.as_str()).collect();
            anyhow!("unknown tool {name:?}; library has [{}]", known.join(", "))
        })
    }

    /// `~/.pathtool/tools/library.json`.
    pub fn default_library_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
        Ok(home.join(".pathtool").join("tools").join("library.json"))
    }
}

fn check_tool(tool: &Tool) -> Result<()> {
    if tool.name.trim().is_empty() {
        bail!("tool name must not be empty");
    }
    if !(tool.diameter.is_finite() && tool.diameter > 0.0) {
        bail!("tool {:?} has invalid diameter {}", tool.name, tool.diameter);
    }
    if !(tool.feedrate.is_finite() && tool.feedrate > 0.0) {
        bail!("tool {:?} has invalid feed rate {}", tool.name, tool.feedrate);
    }
    Ok(())
}
