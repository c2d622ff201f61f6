// Ball trajectory prediction for bots

use crate::game::{Ball, COURT_HEIGHT};

/// Project the ball's vertical position to the moment it reaches `paddle_x`.
///
/// Linear projection in whole frames (`(paddle_x - ball_x) / vx`, truncated);
/// a ball with no horizontal speed counts as already aligned. The result is
/// folded back into the court by a single wall reflection.
pub fn project_intercept(ball: &Ball, paddle_x: i32) -> i32 {
    let x = i64::from(ball.position.x);
    let y = i64::from(ball.position.y);
    let vx = i64::from(ball.velocity.vx);
    let vy = i64::from(ball.velocity.vy);

    let frames_to_reach = if vx != 0 { (i64::from(paddle_x) - x) / vx } else { 0 };

    fold_into_court(y.saturating_add(vy.saturating_mul(frames_to_reach)))
}

/// Reflect a projected position off the top or bottom wall once.
///
/// Steep shots that would bounce more than once are not modelled; the
/// result is only clamped to the representable range.
pub fn fold_into_court(y: i64) -> i32 {
    let height = i64::from(COURT_HEIGHT);

    let folded = if y < 0 {
        y.saturating_neg()
    } else if y > height {
        height.saturating_sub(y - height)
    } else {
        y
    };

    folded.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
