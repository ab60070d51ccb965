/// Plane coordinates in meters.
pub type Point = (f64, f64);

pub fn distance(a: Point, b: Point) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    (dx * dx + dy * dy).sqrt()
}

fn dot(u: Point, v: Point) -> f64 {
    u.0 * v.0 + u.1 * v.1
}

fn cross(u: Point, v: Point) -> f64 {
    u.0 * v.1 - u.1 * v.0
}

/// Rotates the vector `(length, 0)` onto the direction of `direction`.
/// The rotation angle comes from the dot and cross products, so any
/// orientation of the link is handled the same way.
pub fn project_length_on_vector(direction: Point, length: f64) -> Point {
    let u = (length, 0.0);
    let theta = cross(u, direction).atan2(dot(u, direction));
    let (sin, cos) = theta.sin_cos();
    (cos * u.0 - sin * u.1, sin * u.0 + cos * u.1)
}

/// Point reached after `length` meters from `origin` along `direction`.
pub fn position_on_vector(origin: Point, direction: Point, length: f64) -> Point {
    let p = project_length_on_vector(direction, length);
    (origin.0 + p.0, origin.1 + p.1)
}

fn ccw(a: Point, b: Point, c: Point) -> bool {
    (c.1 - a.1) * (b.0 - a.0) > (b.1 - a.1) * (c.0 - a.0)
}

/// Segment intersection test for `ab` against `cd`.
pub fn two_lines_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    ccw(a, c, d) != ccw(b, c, d) && ccw(a, b, c) != ccw(a, b, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_follows_link_direction() {
        let p = position_on_vector((10.0, 10.0), (0.0, 50.0), 20.0);
        assert!((p.0 - 10.0).abs() < 1e-9);
        assert!((p.1 - 30.0).abs() < 1e-9);

        let p = position_on_vector((0.0, 0.0), (-3.0, -4.0), 5.0);
        assert!((p.0 + 3.0).abs() < 1e-9);
        assert!((p.1 + 4.0).abs() < 1e-9);
    }

    #[test]
    fn crossing_segments() {
        assert!(two_lines_intersect((0.0, 0.0), (10.0, 0.0), (5.0, -5.0), (5.0, 5.0)));
        assert!(!two_lines_intersect((0.0, 0.0), (10.0, 0.0), (0.0, 1.0), (10.0, 1.0)));
        assert!(!two_lines_intersect((0.0, 0.0), (4.0, 0.0), (5.0, -5.0), (5.0, 5.0)));
    }
}
