use glam::DVec3;
use pathtool::*;
use proptest::prelude::*;

fn closed_square(z: f64) -> Toolpath {
    Toolpath::from_positions([
        DVec3::new(0.0, 0.0, z),
        DVec3::new(10.0, 0.0, z),
        DVec3::new(10.0, 10.0, z),
        DVec3::new(0.0, 10.0, z),
        DVec3::new(0.0, 0.0, z),
    ])
}

fn params(start: f64, end: f64, step: f64, rampdown: f64) -> DepthStepParams {
    DepthStepParams {
        start_depth: start,
        end_depth: end,
        max_depth_step: step,
        rampdown,
        traverse_height: start + 5.0,
    }
}

#[test]
fn test_square_takes_two_passes() {
    // Square on the surface, cut from 0 to -10 in steps of 5
    let history =
        apply_depth_step(&closed_square(0.0), &params(0.0, -10.0, 5.0, 0.1)).expect("stepping");

    assert_eq!(history.len(), 2, "Should take two passes");
    assert_eq!(history.depth_limits(), vec![-5.0, -10.0]);
    assert!(!history.passes()[0].finished, "First pass is above the end depth");
    assert!(history.passes()[1].finished, "Second pass should finish");
}

#[test]
fn test_deep_square_is_clamped_per_pass() {
    let history =
        apply_depth_step(&closed_square(-12.0), &params(0.0, -12.0, 5.0, 0.0)).expect("stepping");

    assert_eq!(history.depth_limits(), vec![-5.0, -10.0, -12.0]);
    for pass in history.passes() {
        let limit = pass.depth_limit.expect("stepped pass");
        assert!(
            pass.path.positions().all(|p| (p.z - limit).abs() < 1e-12),
            "Every point should sit on the pass limit"
        );
    }
    assert!(history.passes()[2].finished);
}

#[test]
fn test_ramped_square_enters_from_traverse_height() {
    // Deep square with ramping: each pass starts and ends with a rapid at traverse height
    let history =
        apply_depth_step(&closed_square(-4.0), &params(0.0, -4.0, 4.0, 0.1)).expect("stepping");
    let pass = &history.passes()[0].path;

    let first = pass.points.first().expect("entry");
    let last = pass.points.last().expect("exit");
    assert!(first.rapid && last.rapid, "Ramp should be bracketed by rapids");
    assert_eq!(first.position.map(|p| p.z), Some(5.0));
    assert_eq!(last.position.map(|p| p.z), Some(5.0));
    assert!(pass.points.len() > closed_square(-4.0).len());
}

#[test]
fn test_every_rapid_starts_a_segment() {
    let mut path = closed_square(-1.0);
    path.points.push(PathPoint::rapid(DVec3::new(20.0, 0.0, 5.0)));
    path.points.push(PathPoint::new(DVec3::new(20.0, 0.0, -1.0)));
    path.points.push(PathPoint::new(DVec3::new(30.0, 0.0, -1.0)));

    let segments = segment_path(&path.points);
    assert_eq!(segments.len(), 2);
    assert!(segments[0].is_closed(), "Square should be a closed loop");
    assert!(segments[1].points[0].rapid, "Rapid should open the next segment");
    assert!(!segments[1].is_closed());
}

#[test]
fn test_open_plunge_is_ramped() {
    // Open run of length 10 asked to drop 5 at 0.1 per mm
    let segment = vec![
        PathPoint::new(DVec3::new(0.0, 0.0, 0.0)),
        PathPoint::new(DVec3::new(10.0, 0.0, -5.0)),
    ];
    let out = apply_ramp_down(
        &segment,
        &RampParams {
            previous_cut_depth: 0.0,
            depth_limit: -5.0,
            rampdown: 0.1,
            traverse_height: 5.0,
        },
    );
    let end = &out[1];
    approx::assert_abs_diff_eq!(end.position.expect("position").z, -1.0, epsilon = 1e-12);
    assert!(!end.in_contact, "Raised point must be left for a later pass");
}

proptest! {
    #[test]
    fn prop_depth_limits_monotone_and_bounded(
        zs in prop::collection::vec(-30.0..0.0f64, 2..20),
        end in -20.0..-0.5f64,
        step in 0.5..6.0f64,
        rampdown in prop_oneof![Just(0.0), 0.05..0.5f64],
    ) {
        let path = Toolpath::from_positions(
            zs.iter().enumerate().map(|(i, &z)| DVec3::new(i as f64 * 3.0, (i % 2) as f64, z)),
        );
        let history = apply_depth_step(&path, &params(0.0, end, step, rampdown)).expect("stepping");

        let limits = history.depth_limits();
        prop_assert!(limits.windows(2).all(|w| w[1] <= w[0]));
        prop_assert!(limits.iter().all(|&l| l >= end));
        prop_assert_eq!(limits.last().copied(), Some(end));
        for path in history.paths() {
            prop_assert!(path.positions().all(|p| p.z >= end - 1e-9));
        }
    }

    #[test]
    fn prop_open_ramp_never_plunges(
        zs in prop::collection::vec(-10.0..0.0f64, 2..20),
        steps in prop::collection::vec(0.1..5.0f64, 20),
        previous in -4.0..0.0f64,
        rate in 0.01..1.0f64,
    ) {
        let mut x = 0.0;
        let segment: Vec<PathPoint> = zs
            .iter()
            .zip(&steps)
            .map(|(&z, &dx)| {
                x += dx;
                PathPoint::new(DVec3::new(x, 0.0, z))
            })
            .collect();
        let ramp = RampParams {
            previous_cut_depth: previous,
            depth_limit: previous - 5.0,
            rampdown: rate,
            traverse_height: 5.0,
        };
        let out = apply_ramp_down(&segment, &ramp);
        prop_assert_eq!(out.len(), segment.len());

        for pair in out.windows(2) {
            let from = pair[0].position.expect("position");
            let to = pair[1].position.expect("position");
            let planar = from.truncate().distance(to.truncate());
            let drop = from.z.min(previous) - to.z;
            prop_assert!(drop <= rate * planar + 1e-9, "drop {} over {}", drop, planar);
        }
    }
}
