//! Straight-line motion shared by the moving arena objects.

use crate::input::{DOWN, LEFT, RIGHT, UP};
use crate::{MAX_X, MAX_Y, MIN_X, MIN_Y};
use colyseus_core::Rect;

/// Moves `rect` for `elapsed_ms` in the directions set in `input`, clamped to
/// the world bounds.
pub fn extrapolate(rect: Rect, input: u32, speed: f32, elapsed_ms: i64) -> Rect {
    let distance = speed * elapsed_ms.max(0) as f32;
    let mut moved = rect;

    if input & LEFT != 0 {
        moved.x = (moved.x - distance).max(MIN_X);
    }
    if input & RIGHT != 0 {
        moved.x = (moved.x + distance).min(MAX_X - moved.width);
    }
    if input & UP != 0 {
        moved.y = (moved.y - distance).max(MIN_Y);
    }
    if input & DOWN != 0 {
        moved.y = (moved.y + distance).min(MAX_Y - moved.height);
    }

    moved
}

/// Grows `location` by `margin`, then stretches it along the directions set
/// in `input` by the distance covered within `horizon_ms`.
pub fn predicted_region(location: Rect, input: u32, speed: f32, margin: f32, horizon_ms: i64) -> Rect {
    let mut region = location.expand(margin);
    let reach = speed * horizon_ms.max(0) as f32;

    if input & LEFT != 0 {
        region.x -= reach;
        region.width += reach;
    }
    if input & RIGHT != 0 {
        region.width += reach;
    }
    if input & UP != 0 {
        region.y -= reach;
        region.height += reach;
    }
    if input & DOWN != 0 {
        region.height += reach;
    }

    region
}

/// True once `rect` touches or crosses any world edge.
pub fn at_world_edge(rect: &Rect) -> bool {
    rect.x <= MIN_X || rect.y <= MIN_Y || rect.right() >= MAX_X || rect.bottom() >= MAX_Y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PLAYER_SPEED;

    fn approx(a: Rect, b: Rect) -> bool {
        [(a.x, b.x), (a.y, b.y), (a.width, b.width), (a.height, b.height)]
            .iter()
            .all(|(l, r)| (l - r).abs() < 1e-4)
    }

    #[test]
    fn test_extrapolate_moves_and_clamps() {
        let rect = Rect::new(50.0, 50.0, 5.0, 5.0);
        let moved = extrapolate(rect, RIGHT | DOWN, PLAYER_SPEED, 1000);
        assert!(approx(moved, Rect::new(51.0, 51.0, 5.0, 5.0)));

        let clamped = extrapolate(Rect::new(95.0, 2.0, 5.0, 5.0), RIGHT | UP, PLAYER_SPEED, 10_000);
        assert!(approx(clamped, Rect::new(95.0, 0.0, 5.0, 5.0)));

        // no direction bits, no motion
        assert_eq!(extrapolate(rect, 0, PLAYER_SPEED, 1000), rect);
        // a clock running behind never moves objects backwards
        assert_eq!(extrapolate(rect, RIGHT, PLAYER_SPEED, -500), rect);
    }

    #[test]
    fn test_predicted_region_stretches_along_input() {
        let location = Rect::new(10.0, 10.0, 2.0, 2.0);
        let region = predicted_region(location, LEFT | DOWN, PLAYER_SPEED, 3.0, 600);
        assert!(approx(region, Rect::new(6.4, 7.0, 8.6, 8.6)));

        let still = predicted_region(location, 0, PLAYER_SPEED, 3.0, 600);
        assert_eq!(still, Rect::new(7.0, 7.0, 8.0, 8.0));
    }

    #[test]
    fn test_world_edge() {
        assert!(at_world_edge(&Rect::new(50.0, 99.0, 1.0, 1.0)));
        assert!(at_world_edge(&Rect::new(0.0, 50.0, 1.0, 1.0)));
        assert!(!at_world_edge(&Rect::new(50.0, 50.0, 1.0, 1.0)));
    }
}
