use crate::error::PathResult;
use crate::stepping::{Pass, PassHistory};
use crate::types::PathPoint;
use tracing::debug;

/// Drop moves over surface that an earlier pass already finished.
///
/// The first pass is kept as is. In every later pass, a run of points whose
/// counterpart in the previous pass was in contact is replaced by a rapid to
/// traverse height and a rapid above the point where cutting resumes. Runs
/// too short to save a move are kept. Counterparts are found through
/// [`PassHistory::counterparts`], so ramps and traverses inserted by depth
/// stepping are kept and never count as finished.
pub fn remove_noncutting_points(
    history: &PassHistory,
    traverse_height: f64,
) -> PathResult<PassHistory> {
    let mut passes = Vec::with_capacity(history.len());
    for (index, pass) in history.passes().iter().enumerate() {
        if index == 0 {
            passes.push(pass.clone());
            continue;
        }
        let previous = &history.passes()[index - 1].path.points;
        let finished: Vec<bool> = history
            .counterparts(index)?
            .into_iter()
            .zip(&pass.path.points)
            .map(|(counterpart, point)| {
                point.position.is_some()
                    && counterpart.is_some_and(|pos| previous[pos].in_contact)
            })
            .collect();

        let points = prune_pass(&pass.path.points, &finished, traverse_height);
        debug!(
            pass = index,
            before = pass.path.len(),
            after = points.len(),
            "pruned pass"
        );
        let mut path = pass.path.clone();
        path.points = points;
        passes.push(Pass {
            path,
            ..pass.clone()
        });
    }
    Ok(PassHistory::new(passes))
}

fn prune_pass(points: &[PathPoint], finished: &[bool], traverse_height: f64) -> Vec<PathPoint> {
    let mut output = Vec::with_capacity(points.len());
    let mut index = 0;
    while index < points.len() {
        if !finished[index] {
            output.push(points[index].clone());
            index += 1;
            continue;
        }

        let start = index;
        while index < points.len() && finished[index] {
            index += 1;
        }
        let resume = points.get(index).filter(|p| p.position.is_some());
        // Lift, plus a drop back down unless the run reaches the end of the pass.
        let moves = if resume.is_some() { 2 } else { 1 };
        if index - start < moves {
            output.extend(points[start..index].iter().cloned());
            continue;
        }

        output.push(lift(&points[start], traverse_height, false));
        if let Some(next) = resume {
            output.push(lift(next, traverse_height, next.in_contact));
        }
    }
    output
}

fn lift(point: &PathPoint, height: f64, in_contact: bool) -> PathPoint {
    PathPoint {
        in_contact,
        ..PathPoint::traverse_above(point.position.unwrap_or_default(), height, point.inside_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PathError;
    use crate::types::Toolpath;
    use glam::DVec3;

    fn pass(contacts: &[bool], z: f64) -> Pass {
        let points = contacts
            .iter()
            .enumerate()
            .map(|(i, &c)| PathPoint {
                in_contact: c,
                ..PathPoint::new(DVec3::new(i as f64, 0.0, z))
            })
            .collect();
        Pass {
            depth_limit: Some(z),
            finished: false,
            path: Toolpath::new(points),
        }
    }

    #[test]
    fn test_first_pass_kept() {
        let history = PassHistory::new(vec![pass(&[true, true, true], -1.0)]);
        let pruned = remove_noncutting_points(&history, 5.0).expect("prune");
        assert_eq!(pruned, history);
    }

    #[test]
    fn test_finished_run_becomes_traverse() {
        let history = PassHistory::new(vec![
            pass(&[false, true, true, true, false], -1.0),
            pass(&[false, false, false, false, false], -2.0),
        ]);
        let pruned = remove_noncutting_points(&history, 5.0).expect("prune");
        let points = &pruned.passes()[1].path.points;
        assert_eq!(points.len(), 4);
        assert_eq!(points[0].position, Some(DVec3::new(0.0, 0.0, -2.0)));
        assert!(points[1].rapid);
        assert_eq!(points[1].position, Some(DVec3::new(1.0, 0.0, 5.0)));
        assert!(points[2].rapid);
        assert_eq!(points[2].position, Some(DVec3::new(4.0, 0.0, 5.0)));
        assert_eq!(points[3].position, Some(DVec3::new(4.0, 0.0, -2.0)));
        assert!(!points[3].rapid);
    }

    #[test]
    fn test_single_finished_point_is_kept() {
        let history = PassHistory::new(vec![
            pass(&[false, true, false], -1.0),
            pass(&[false, false, false], -2.0),
        ]);
        let pruned = remove_noncutting_points(&history, 5.0).expect("prune");
        assert_eq!(pruned.passes()[1], history.passes()[1]);
    }

    #[test]
    fn test_trailing_run_only_lifts() {
        let history = PassHistory::new(vec![
            pass(&[false, true, true], -1.0),
            pass(&[false, false, false], -2.0),
        ]);
        let pruned = remove_noncutting_points(&history, 5.0).expect("prune");
        let points = &pruned.passes()[1].path.points;
        assert_eq!(points.len(), 2);
        assert!(points[1].rapid);
        assert_eq!(points[1].position, Some(DVec3::new(1.0, 0.0, 5.0)));
    }

    #[test]
    fn test_length_mismatch_is_fatal() {
        let history = PassHistory::new(vec![
            pass(&[false, true], -1.0),
            pass(&[false, false, false], -2.0),
        ]);
        assert!(matches!(
            remove_noncutting_points(&history, 5.0),
            Err(PathError::PassLengthMismatch { pass: 1, .. })
        ));
    }

    fn indexed(pass: &Pass, first: usize) -> Pass {
        let mut pass = pass.clone();
        for (i, point) in pass.path.points.iter_mut().enumerate() {
            point.source_index = Some(first + i);
        }
        pass
    }

    #[test]
    fn test_inserted_points_are_matched_by_source_index() {
        let mut previous = indexed(&pass(&[true, true, true, false], -1.0), 0);
        previous
            .path
            .points
            .insert(0, PathPoint::traverse_above(DVec3::ZERO, 5.0, false));
        previous
            .path
            .points
            .insert(1, PathPoint::new(DVec3::new(0.0, 0.0, -0.5)));
        let mut current = indexed(&pass(&[false, false, false, false], -2.0), 0);
        current
            .path
            .points
            .insert(0, PathPoint::traverse_above(DVec3::ZERO, 5.0, false));

        let history = PassHistory::new(vec![previous, current]);
        let pruned = remove_noncutting_points(&history, 5.0).expect("prune");
        let points = &pruned.passes()[1].path.points;
        // traverse, lift over the finished run, drop above the resume point, resume point
        assert_eq!(points.len(), 4);
        assert_eq!(points[1].position, Some(DVec3::new(0.0, 0.0, 5.0)));
        assert_eq!(points[2].position, Some(DVec3::new(3.0, 0.0, 5.0)));
        assert_eq!(points[3].source_index, Some(3));
    }

    #[test]
    fn test_foreign_source_point_is_fatal() {
        let history = PassHistory::new(vec![
            indexed(&pass(&[true, true], -1.0), 0),
            indexed(&pass(&[false, false], -2.0), 1),
        ]);
        assert_eq!(
            remove_noncutting_points(&history, 5.0),
            Err(PathError::UnmatchedSourcePoint {
                pass: 1,
                source_index: 2
            })
        );
    }
}
