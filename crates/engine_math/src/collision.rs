//! Axis-separated collision resolution.
//!
//! A mover is swept along x first and y second, each against the full
//! obstacle set. Resolving one axis at a time keeps corner cases simple: a
//! body sliding along a floor never snags on the floor's top edge.

use crate::rect::Rect;

/// What a single-axis sweep ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contact {
    /// Moved freely.
    None,
    /// Stopped against a side.
    Wall,
    /// Came down onto an obstacle's top edge.
    Landed,
    /// Came up into an obstacle's bottom edge.
    Ceiling,
}

/// Move `rect` horizontally by `dx`, stopping flush against the first
/// obstacle the projected position overlaps.
pub fn sweep_x(rect: &mut Rect, dx: f32, obstacles: &[Rect]) -> Contact {
    let mut projected = *rect;
    projected.x += dx;

    let Some(hit) = obstacles.iter().find(|o| projected.intersects(o)) else {
        *rect = projected;
        return Contact::None;
    };

    if projected.right() >= hit.left() && rect.right() <= hit.left() {
        rect.set_right(hit.left());
        Contact::Wall
    } else if projected.left() <= hit.right() && rect.left() >= hit.right() {
        rect.set_left(hit.right());
        Contact::Wall
    } else {
        // Already overlapping before the move; stay put rather than tunnel.
        Contact::Wall
    }
}

/// Move `rect` vertically by `dy`, landing on or bumping into the first
/// obstacle the projected position overlaps.
pub fn sweep_y(rect: &mut Rect, dy: f32, obstacles: &[Rect]) -> Contact {
    let mut projected = *rect;
    projected.y += dy;

    let Some(hit) = obstacles.iter().find(|o| projected.intersects(o)) else {
        *rect = projected;
        return Contact::None;
    };

    if projected.bottom() >= hit.top() && rect.bottom() <= hit.top() {
        rect.set_bottom(hit.top());
        Contact::Landed
    } else if projected.top() <= hit.bottom() && rect.top() >= hit.bottom() {
        rect.set_top(hit.bottom());
        Contact::Ceiling
    } else {
        Contact::Wall
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> Rect {
        Rect::new(0.0, 600.0, 1920.0, 20.0)
    }

    #[test]
    fn test_free_fall_moves_full_distance() {
        let mut body = Rect::new(100.0, 100.0, 50.0, 50.0);
        assert_eq!(sweep_y(&mut body, 10.0, &[floor()]), Contact::None);
        assert_eq!(body.y, 110.0);
    }

    #[test]
    fn test_landing_snaps_to_floor_top() {
        let mut body = Rect::new(100.0, 540.0, 50.0, 50.0);
        assert_eq!(sweep_y(&mut body, 25.0, &[floor()]), Contact::Landed);
        assert_eq!(body.bottom(), 600.0);
    }

    #[test]
    fn test_ceiling_snaps_to_obstacle_bottom() {
        let ceiling = Rect::new(0.0, 0.0, 500.0, 20.0);
        let mut body = Rect::new(100.0, 25.0, 50.0, 50.0);
        assert_eq!(sweep_y(&mut body, -10.0, &[ceiling]), Contact::Ceiling);
        assert_eq!(body.top(), 20.0);
    }

    #[test]
    fn test_wall_stops_horizontal_motion() {
        let wall = Rect::new(200.0, 0.0, 20.0, 600.0);
        let mut body = Rect::new(140.0, 100.0, 50.0, 50.0);
        assert_eq!(sweep_x(&mut body, 30.0, &[wall]), Contact::Wall);
        assert_eq!(body.right(), 200.0);

        let mut body = Rect::new(230.0, 100.0, 50.0, 50.0);
        assert_eq!(sweep_x(&mut body, -30.0, &[wall]), Contact::Wall);
        assert_eq!(body.left(), 220.0);
    }

    #[test]
    fn test_sliding_along_floor_is_not_blocked() {
        let mut body = Rect::new(100.0, 550.0, 50.0, 50.0);
        assert_eq!(sweep_x(&mut body, 15.0, &[floor()]), Contact::None);
        assert_eq!(body.x, 115.0);
    }
}
