//! 2D convex hull and the opening-shape features derived from it.

/// Convex hull of a 2D point set plus the shape metrics original_source's
/// `compute_opening_features` derives from it.
#[derive(Clone, Debug, PartialEq)]
pub struct HullFeatures {
    pub area: f64,
    pub perimeter: f64,
    pub width: f64,
    pub height: f64,
    pub aspect_ratio: f64,
    pub circularity: f64,
}

/// Computes the convex hull of `points` (Andrew's monotone chain) and returns its area,
/// perimeter, width/height (width always the larger of the two, per original_source's
/// swap), aspect ratio and circularity (`4*pi*area / perimeter^2`).
///
/// Returns `None` if fewer than 3 distinct points are given.
pub fn hull_features(points: &[(f64, f64)]) -> Option<HullFeatures> {
    let hull = convex_hull(points)?;
    let area = polygon_area(&hull);
    let perimeter = polygon_perimeter(&hull);

    let min_x = points.iter().map(|p| p.0).fold(f64::INFINITY, f64::min);
    let max_x = points.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = points.iter().map(|p| p.1).fold(f64::INFINITY, f64::min);
    let max_y = points.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max);

    let (mut width, mut height) = (max_x - min_x, max_y - min_y);
    if width < height {
        std::mem::swap(&mut width, &mut height);
    }

    let aspect_ratio = if height > 0.0 { width / height } else { 0.0 };
    let circularity = if perimeter > 0.0 {
        4.0 * std::f64::consts::PI * area / (perimeter * perimeter)
    } else {
        0.0
    };

    Some(HullFeatures {
        area,
        perimeter,
        width,
        height,
        aspect_ratio,
        circularity,
    })
}

/// Computes the convex hull of a 2D point set via Andrew's monotone chain, returning hull
/// vertices in counter-clockwise order. Returns `None` for fewer than 3 distinct points.
pub fn convex_hull(points: &[(f64, f64)]) -> Option<Vec<(f64, f64)>> {
    let mut pts: Vec<(f64, f64)> = points.to_vec();
    pts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    pts.dedup();
    if pts.len() < 3 {
        return None;
    }

    let cross = |o: (f64, f64), a: (f64, f64), b: (f64, f64)| -> f64 {
        (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
    };

    let mut lower: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(f64, f64)> = Vec::with_capacity(pts.len());
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);

    if lower.len() < 3 {
        None
    } else {
        Some(lower)
    }
}

fn polygon_area(hull: &[(f64, f64)]) -> f64 {
    let mut sum = 0.0;
    for i in 0..hull.len() {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % hull.len()];
        sum += x0 * y1 - x1 * y0;
    }
    (sum / 2.0).abs()
}

fn polygon_perimeter(hull: &[(f64, f64)]) -> f64 {
    let mut perimeter = 0.0;
    for i in 0..hull.len() {
        let (x0, y0) = hull[i];
        let (x1, y1) = hull[(i + 1) % hull.len()];
        perimeter += ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
    }
    perimeter
}
