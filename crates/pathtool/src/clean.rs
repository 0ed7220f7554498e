use crate::types::{PathPoint, Toolpath};

/// Default direction tolerance for [`clean_colinear`].
pub const DEFAULT_PRECISION: f64 = 0.005;

/// Remove interior cutting points that do not change the direction of travel.
///
/// A point is dropped when the unit vectors into and out of it differ by less
/// than `precision`, or when it repeats its predecessor. After a removal the
/// previous point is checked again against its new neighbour, so the result
/// has no removable point left and cleaning twice changes nothing.
pub fn clean_colinear(path: &mut Toolpath, precision: f64) -> usize {
    let points = &mut path.points;
    let mut removed = 0;
    let mut index = 1;
    while index + 1 < points.len() {
        if is_redundant(&points[index - 1], &points[index], &points[index + 1], precision) {
            points.remove(index);
            removed += 1;
            index = index.saturating_sub(1).max(1);
        } else {
            index += 1;
        }
    }
    removed
}

fn is_redundant(previous: &PathPoint, point: &PathPoint, next: &PathPoint, precision: f64) -> bool {
    if point.rapid {
        return false;
    }
    let (Some(a), Some(b), Some(c)) = (previous.position, point.position, next.position) else {
        return false;
    };
    let incoming = b - a;
    if incoming.length_squared() == 0.0 {
        return true;
    }
    let outgoing = c - b;
    if outgoing.length_squared() == 0.0 {
        return false;
    }
    (incoming.normalize() - outgoing.normalize()).length() < precision
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_collinear_run_reduced_to_endpoints() {
        let mut path = Toolpath::from_positions((0..5).map(|i| DVec3::new(i as f64, i as f64, 0.0)));
        let removed = clean_colinear(&mut path, DEFAULT_PRECISION);
        assert_eq!(removed, 3);
        assert_eq!(path.len(), 2);
        assert_eq!(path.points[1].position, Some(DVec3::new(4.0, 4.0, 0.0)));
    }

    #[test]
    fn test_corner_is_kept() {
        let mut path = Toolpath::from_positions([
            DVec3::ZERO,
            DVec3::new(5.0, 0.0, 0.0),
            DVec3::new(5.0, 5.0, 0.0),
        ]);
        assert_eq!(clean_colinear(&mut path, DEFAULT_PRECISION), 0);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_rapids_are_kept() {
        let mut path = Toolpath::from_positions([DVec3::ZERO, DVec3::X, DVec3::X * 2.0]);
        path.points[1].rapid = true;
        assert_eq!(clean_colinear(&mut path, DEFAULT_PRECISION), 0);
    }

    #[test]
    fn test_duplicate_point_removed() {
        let mut path = Toolpath::from_positions([
            DVec3::ZERO,
            DVec3::X,
            DVec3::X,
            DVec3::new(1.0, 1.0, 0.0),
        ]);
        assert_eq!(clean_colinear(&mut path, DEFAULT_PRECISION), 1);
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let mut path = Toolpath::from_positions([
            DVec3::ZERO,
            DVec3::new(1.0, 0.001, 0.0),
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(3.0, 0.004, 0.0),
            DVec3::new(3.0, 3.0, 0.0),
        ]);
        clean_colinear(&mut path, 0.005);
        let once = path.clone();
        assert_eq!(clean_colinear(&mut path, 0.005), 0);
        assert_eq!(path, once);
    }
}
