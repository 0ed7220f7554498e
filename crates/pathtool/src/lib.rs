//! Post-processing passes for CAM toolpaths: depth stepping with ramped
//! entry, pruning of moves over finished surface, trochoidal relief milling
//! and colinear point cleanup.

mod clean;
mod error;
mod job;
mod postprocessor;
mod prune;
mod ramp;
mod segment;
mod settings;
mod stepping;
mod stock;
mod tool_library;
mod trochoidal;
mod types;

pub use clean::{clean_colinear, DEFAULT_PRECISION};
pub use error::{PathError, PathResult};
pub use job::{PathJob, PathView};
pub use postprocessor::{post_process_grbl, GCode, GrblWriter, PathWriter};
pub use prune::remove_noncutting_points;
pub use ramp::{apply_ramp_down, RampParams};
pub use segment::{segment_path, Segment};
pub use settings::*;
pub use stepping::{apply_depth_step, apply_stepping, DepthStepParams, Pass, PassHistory};
pub use stock::{ContainsFn, StockBoundary, StockPolygon};
pub use tool_library::ToolLibrary;
pub use trochoidal::{calc_trochoidal_milling, TrochoidalParams, STEPS_PER_REV};
pub use types::*;

/// Install a `tracing` subscriber reading `RUST_LOG`, defaulting to `info`.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| anyhow::anyhow!("install tracing subscriber: {e}"))
}
