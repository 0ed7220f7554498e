use anyhow::Result;
use glam::DVec3;
use pathtool::*;

fn main() -> Result<()> {
    init_logging()?;

    let args: Vec<String> = std::env::args().collect();
    let operation = args.get(1).map(|s| s.as_str()).unwrap_or("all");
    let path = match args.get(2) {
        Some(file) => Toolpath::load_from_path(file)?,
        None => demo_pocket(),
    };

    let mut job = match args.get(3) {
        Some(name) => {
            let library = ToolLibrary::load_from_path(ToolLibrary::default_library_path()?)?;
            PathJob::with_library(path, &library, name)?
        }
        None => PathJob::new(path, Some(Tool::new("6mm Endmill", 6.0, 800.0)))?,
    };
    let mut settings = job.settings().clone();
    settings.max_depth_step = 4.0;
    job.set_settings(settings)?;

    match operation {
        "step" => job.apply_depth_step()?,
        "prune" => {
            job.apply_depth_step()?;
            job.remove_noncutting_points()?;
        }
        "trochoidal" => job.calc_trochoidal_milling()?,
        "clean" => {
            job.clean_colinear()?;
        }
        "all" => {
            job.apply_depth_step()?;
            job.remove_noncutting_points()?;
            job.clean_colinear()?;
        }
        _ => {
            println!("Usage: pathtool [step|prune|trochoidal|clean|all] [path.json] [tool]");
            println!("  step        - Cut the path in depth passes");
            println!("  prune       - Depth passes without moves over finished surface");
            println!("  trochoidal  - Replace engagement moves with relief circles");
            println!("  clean       - Remove colinear points");
            println!("  all         - Depth passes, pruning and cleaning (default)");
            println!("  tool        - Name of a tool in ~/.pathtool/tools/library.json");
            return Ok(());
        }
    }

    let complete = job.complete_path();
    println!("pathtool - {operation}");
    println!("Passes: {}", job.history().len());
    println!("Estimate: {}", job.estimate());
    println!("\nG-code:\n");
    print!("{}", post_process_grbl(&complete));
    Ok(())
}

/// Three concentric square rings at -12, outermost touching the model.
fn demo_pocket() -> Toolpath {
    let mut points = Vec::new();
    for ring in 0..3 {
        let inset = 3.0 * ring as f64;
        let (lo, hi) = (inset, 60.0 - inset);
        let clearance = 0.5 + 3.0 * ring as f64;
        points.push(PathPoint::rapid(DVec3::new(lo, lo, 5.0)));
        for (x, y) in [(lo, lo), (hi, lo), (hi, hi), (lo, hi), (lo, lo)] {
            points.push(
                PathPoint::new(DVec3::new(x, y, -12.0))
                    .with_dist_from_model(clearance)
                    .with_order(ring as f64)
                    .with_inside_model(true),
            );
        }
    }
    Toolpath::new(points)
}
