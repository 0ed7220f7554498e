use glam::DVec3;
use kurbo::{BezPath, Point, Shape};
use serde::{Deserialize, Serialize};

/// Remaining stock, seen as a containment test.
pub trait StockBoundary {
    fn contains(&self, point: DVec3) -> bool;
}

/// Adapter turning a predicate into a stock boundary.
pub struct ContainsFn<F>(pub F);

impl<F> StockBoundary for ContainsFn<F>
where
    F: Fn(DVec3) -> bool,
{
    fn contains(&self, point: DVec3) -> bool {
        (self.0)(point)
    }
}

impl StockBoundary for geo::Polygon<f64> {
    fn contains(&self, point: DVec3) -> bool {
        geo::Contains::contains(self, &geo::Point::new(point.x, point.y))
    }
}

/// Stock outline in the XY plane, optionally bounded in Z.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPolygon {
    pub outline: Vec<(f64, f64)>,
    /// Inclusive `(bottom, top)` of the stock; unbounded when absent.
    #[serde(default)]
    pub z_range: Option<(f64, f64)>,
    #[serde(skip)]
    shape: Option<BezPath>,
}

impl StockPolygon {
    pub fn new(outline: Vec<(f64, f64)>) -> Self {
        let shape = outline_to_path(&outline);
        Self {
            outline,
            z_range: None,
            shape,
        }
    }

    pub fn with_z_range(mut self, bottom: f64, top: f64) -> Self {
        self.z_range = Some((bottom.min(top), bottom.max(top)));
        self
    }

    /// Axis-aligned rectangular stock.
    pub fn rectangle(min: (f64, f64), max: (f64, f64)) -> Self {
        Self::new(vec![min, (max.0, min.1), max, (min.0, max.1)])
    }
}

impl StockBoundary for StockPolygon {
    fn contains(&self, point: DVec3) -> bool {
        if let Some((bottom, top)) = self.z_range {
            if point.z < bottom || point.z > top {
                return false;
            }
        }
        match &self.shape {
            Some(shape) => shape.contains(Point::new(point.x, point.y)),
            // Deserialized without its cached path.
            None => outline_to_path(&self.outline)
                .is_some_and(|shape| shape.contains(Point::new(point.x, point.y))),
        }
    }
}

fn outline_to_path(outline: &[(f64, f64)]) -> Option<BezPath> {
    let (first, rest) = outline.split_first()?;
    if rest.len() < 2 {
        return None;
    }
    let mut path = BezPath::new();
    path.move_to(*first);
    for &vertex in rest {
        path.line_to(vertex);
    }
    path.close_path();
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rectangle_contains() {
        let stock = StockPolygon::rectangle((0.0, 0.0), (10.0, 5.0));
        assert!(stock.contains(DVec3::new(5.0, 2.0, -100.0)));
        assert!(!stock.contains(DVec3::new(11.0, 2.0, 0.0)));
        assert!(!stock.contains(DVec3::new(5.0, -0.5, 0.0)));
    }

    #[test]
    fn test_z_range() {
        let stock = StockPolygon::rectangle((0.0, 0.0), (10.0, 10.0)).with_z_range(0.0, -12.0);
        assert!(stock.contains(DVec3::new(5.0, 5.0, -6.0)));
        assert!(!stock.contains(DVec3::new(5.0, 5.0, 1.0)));
        assert!(!stock.contains(DVec3::new(5.0, 5.0, -13.0)));
    }

    #[test]
    fn test_deserialized_polygon_still_tests() {
        let json = r#"{"outline":[[0.0,0.0],[4.0,0.0],[4.0,4.0],[0.0,4.0]]}"#;
        let stock: StockPolygon = serde_json::from_str(json).expect("parse");
        assert!(stock.contains(DVec3::new(2.0, 2.0, 0.0)));
        assert!(!stock.contains(DVec3::new(5.0, 2.0, 0.0)));
    }

    #[test]
    fn test_degenerate_outline_contains_nothing() {
        let stock = StockPolygon::new(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert!(!stock.contains(DVec3::new(0.5, 0.5, 0.0)));
    }

    #[test]
    fn test_geo_polygon_and_closure() {
        let polygon = geo::Polygon::new(
            geo::LineString::from(vec![(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 3.0)]),
            vec![],
        );
        assert!(StockBoundary::contains(&polygon, DVec3::new(1.0, 1.0, 0.0)));
        assert!(!StockBoundary::contains(&polygon, DVec3::new(4.0, 1.0, 0.0)));

        let above_floor = ContainsFn(|p: DVec3| p.z >= -3.0);
        assert!(above_floor.contains(DVec3::new(0.0, 0.0, -1.0)));
        assert!(!above_floor.contains(DVec3::new(0.0, 0.0, -4.0)));
    }
}
