//! Polygonal habitat with membership tests and uniform point sampling.

use mesa_core::errors::{ErrorInfo, MesaError};
use mesa_core::RngHandle;
use serde::{Deserialize, Serialize};

/// Simple polygon delimiting the region where tile seeds may live.
///
/// Vertices are stored in ring order without a repeated closing vertex. The
/// polygon may be non-convex; membership uses the even-odd rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habitat {
    vertices: Vec<[f64; 2]>,
    bbox: [f64; 4],
}

impl Habitat {
    /// Builds a habitat from polygon vertices in ring order.
    pub fn new(vertices: Vec<[f64; 2]>) -> Result<Self, MesaError> {
        if vertices.len() < 3 {
            return Err(MesaError::Domain(
                ErrorInfo::new("degenerate-polygon", "habitat needs at least three vertices")
                    .with_context("vertices", vertices.len().to_string()),
            ));
        }
        for (idx, v) in vertices.iter().enumerate() {
            if !v[0].is_finite() || !v[1].is_finite() {
                return Err(MesaError::Domain(
                    ErrorInfo::new("non-finite-vertex", "habitat vertex is not finite")
                        .with_context("index", idx.to_string()),
                ));
            }
        }
        let area = shoelace_area(&vertices);
        if area <= 0.0 {
            return Err(MesaError::Domain(
                ErrorInfo::new("zero-area-polygon", "habitat polygon has no interior")
                    .with_context("area", area.to_string())
                    .with_hint("vertices may be collinear or repeated"),
            ));
        }
        let bbox = bounding_box(&vertices);
        Ok(Self { vertices, bbox })
    }

    /// Builds an axis-aligned rectangular habitat.
    pub fn rectangle(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, MesaError> {
        Self::new(vec![
            [x_min, y_min],
            [x_max, y_min],
            [x_max, y_max],
            [x_min, y_max],
        ])
    }

    /// Returns the polygon vertices in ring order.
    pub fn vertices(&self) -> &[[f64; 2]] {
        &self.vertices
    }

    /// Returns the enclosing `[x_min, y_min, x_max, y_max]` bounding box.
    pub fn bounding_box(&self) -> [f64; 4] {
        self.bbox
    }

    /// Returns the polygon area.
    pub fn area(&self) -> f64 {
        shoelace_area(&self.vertices)
    }

    /// Tests membership with the even-odd crossing rule.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let [x_min, y_min, x_max, y_max] = self.bbox;
        if x < x_min || x > x_max || y < y_min || y > y_max {
            return false;
        }
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = self.vertices[i];
            let [xj, yj] = self.vertices[j];
            if (yi > y) != (yj > y) {
                let x_cross = xj + (y - yj) / (yi - yj) * (xi - xj);
                if x < x_cross {
                    inside = !inside;
                }
            }
            j = i;
        }
        inside
    }

    /// Draws a point uniformly over the polygon area.
    ///
    /// Uniform bounding-box proposals filtered through [`Habitat::contains`]
    /// are uniform over the interior. The loop terminates with probability one
    /// because construction guarantees positive area.
    pub fn sample_point(&self, rng: &mut RngHandle) -> [f64; 2] {
        let [x_min, y_min, x_max, y_max] = self.bbox;
        loop {
            let x = rng.uniform_range(x_min, x_max);
            let y = rng.uniform_range(y_min, y_max);
            if self.contains(x, y) {
                return [x, y];
            }
        }
    }
}

fn shoelace_area(vertices: &[[f64; 2]]) -> f64 {
    let n = vertices.len();
    let mut twice_area = 0.0;
    for i in 0..n {
        let [x0, y0] = vertices[i];
        let [x1, y1] = vertices[(i + 1) % n];
        twice_area += x0 * y1 - x1 * y0;
    }
    twice_area.abs() / 2.0
}

fn bounding_box(vertices: &[[f64; 2]]) -> [f64; 4] {
    let mut bbox = [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY];
    for v in vertices {
        bbox[0] = bbox[0].min(v[0]);
        bbox[1] = bbox[1].min(v[1]);
        bbox[2] = bbox[2].max(v[0]);
        bbox[3] = bbox[3].max(v[1]);
    }
    bbox
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rejects_degenerate_polygons() {
        assert!(Habitat::new(vec![[0.0, 0.0], [1.0, 1.0]]).is_err());
        let collinear = Habitat::new(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]);
        assert_eq!(collinear.unwrap_err().info().code, "zero-area-polygon");
    }

    #[test]
    fn rectangle_membership() {
        let habitat = Habitat::rectangle(0.0, 0.0, 2.0, 1.0).expect("rectangle");
        assert!(habitat.contains(1.0, 0.5));
        assert!(!habitat.contains(2.5, 0.5));
        assert!(!habitat.contains(1.0, -0.1));
        assert!((habitat.area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn non_convex_membership() {
        // L-shaped region: the notch around (1.5, 1.5) is outside.
        let habitat = Habitat::new(vec![
            [0.0, 0.0],
            [2.0, 0.0],
            [2.0, 1.0],
            [1.0, 1.0],
            [1.0, 2.0],
            [0.0, 2.0],
        ])
        .expect("l-shape");
        assert!(habitat.contains(0.5, 0.5));
        assert!(habitat.contains(0.5, 1.5));
        assert!(habitat.contains(1.5, 0.5));
        assert!(!habitat.contains(1.5, 1.5));
    }

    proptest! {
        #[test]
        fn sampled_points_lie_inside(seed in 0u64..1_000) {
            let habitat = Habitat::new(vec![
                [0.0, 0.0],
                [2.0, 0.0],
                [2.0, 1.0],
                [1.0, 1.0],
                [1.0, 2.0],
                [0.0, 2.0],
            ]).expect("l-shape");
            let mut rng = RngHandle::from_seed(seed);
            for _ in 0..32 {
                let [x, y] = habitat.sample_point(&mut rng);
                prop_assert!(habitat.contains(x, y));
            }
        }
    }
}
