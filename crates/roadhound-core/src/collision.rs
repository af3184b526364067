use crate::map::Position;

/// Closest approach of a moving point to a fixed target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionResult {
    /// Squared distance from the target to the line through the path.
    pub sq_distance: f64,
    /// Fraction of the path travelled at the closest approach.
    pub proj_ratio: f64,
}

impl CollectionResult {
    /// Whether the closest approach lies within the path and within `radius`.
    pub fn is_collected(&self, radius: f64) -> bool {
        (0.0..=1.0).contains(&self.proj_ratio) && self.sq_distance <= radius * radius
    }
}

/// Project `target` onto the path from `start` to `end`.
///
/// A zero-length path is a stationary point: projection 0 and the plain
/// squared distance.
pub fn try_collect_point(start: Position, end: Position, target: Position) -> CollectionResult {
    let u_x = target.x - start.x;
    let u_y = target.y - start.y;
    let v_x = end.x - start.x;
    let v_y = end.y - start.y;

    let u_len2 = u_x * u_x + u_y * u_y;
    let v_len2 = v_x * v_x + v_y * v_y;
    if v_len2 == 0.0 {
        return CollectionResult {
            sq_distance: u_len2,
            proj_ratio: 0.0,
        };
    }

    let u_dot_v = u_x * v_x + u_y * v_y;
    CollectionResult {
        sq_distance: (u_len2 - u_dot_v * u_dot_v / v_len2).max(0.0),
        proj_ratio: u_dot_v / v_len2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> Position {
        Position::new(x, y)
    }

    #[test]
    fn hit_in_middle_of_path() {
        let r = try_collect_point(p(0.0, 0.0), p(10.0, 0.0), p(5.0, 0.2));
        assert!((r.proj_ratio - 0.5).abs() < 1e-12);
        assert!((r.sq_distance - 0.04).abs() < 1e-12);
        assert!(r.is_collected(0.3));
    }

    #[test]
    fn miss_beside_path() {
        let r = try_collect_point(p(0.0, 0.0), p(10.0, 0.0), p(5.0, 1.0));
        assert!(!r.is_collected(0.3));
    }

    #[test]
    fn target_behind_start_is_not_collected() {
        let r = try_collect_point(p(0.0, 0.0), p(10.0, 0.0), p(-0.1, 0.0));
        assert!(r.proj_ratio < 0.0);
        assert!(!r.is_collected(0.3));
    }

    #[test]
    fn target_past_end_is_not_collected() {
        let r = try_collect_point(p(0.0, 0.0), p(10.0, 0.0), p(10.1, 0.0));
        assert!(r.proj_ratio > 1.0);
        assert!(!r.is_collected(0.3));
    }

    #[test]
    fn path_endpoints_are_inclusive() {
        let start = try_collect_point(p(0.0, 0.0), p(10.0, 0.0), p(0.0, 0.0));
        let end = try_collect_point(p(0.0, 0.0), p(10.0, 0.0), p(10.0, 0.0));
        assert!(start.is_collected(0.3));
        assert!(end.is_collected(0.3));
    }

    #[test]
    fn stationary_dog_collects_only_what_it_stands_on() {
        let on = try_collect_point(p(1.0, 1.0), p(1.0, 1.0), p(1.1, 1.0));
        assert_eq!(on.proj_ratio, 0.0);
        assert!(on.is_collected(0.3));

        let off = try_collect_point(p(1.0, 1.0), p(1.0, 1.0), p(2.0, 1.0));
        assert!((off.sq_distance - 1.0).abs() < 1e-12);
        assert!(!off.is_collected(0.3));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn sq_distance_is_finite_and_non_negative(
                sx in -100.0f64..100.0, sy in -100.0f64..100.0,
                ex in -100.0f64..100.0, ey in -100.0f64..100.0,
                tx in -100.0f64..100.0, ty in -100.0f64..100.0,
            ) {
                let r = try_collect_point(p(sx, sy), p(ex, ey), p(tx, ty));
                prop_assert!(r.sq_distance.is_finite());
                prop_assert!(r.proj_ratio.is_finite());
                prop_assert!(r.sq_distance >= 0.0);
            }

            #[test]
            fn points_on_path_are_always_collected(
                sx in -100.0f64..100.0, sy in -100.0f64..100.0,
                ex in -100.0f64..100.0, ey in -100.0f64..100.0,
                t in 0.0f64..=1.0,
            ) {
                let start = p(sx, sy);
                let end = p(ex, ey);
                let target = p(sx + (ex - sx) * t, sy + (ey - sy) * t);
                let r = try_collect_point(start, end, target);
                prop_assert!(r.sq_distance < 1e-6);
                // Rounding can push the ratio a hair outside [0, 1] at the ends.
                prop_assert!(r.proj_ratio > -1e-9 && r.proj_ratio < 1.0 + 1e-9);
            }
        }
    }
}
