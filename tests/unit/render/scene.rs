use super::*;
use crate::song::melody::build_song;

fn canvas() -> Canvas {
    Canvas {
        width: 320,
        height: 240,
    }
}

fn mouth_height(plan: &ScenePlan) -> f64 {
    plan.ops
        .iter()
        .find_map(|op| match op {
            DrawOp::FillPath { path, color, .. } if *color == MOUTH => {
                Some(path.bounding_box().height())
            }
            _ => None,
        })
        .unwrap()
}

#[test]
fn background_is_one_vertical_gradient() {
    let song = build_song();
    let plan = compose(canvas(), &FrameState::at_rest(&song));
    assert_eq!(
        plan.ops[0],
        DrawOp::FillLinearGradient {
            rect: Rect::new(0.0, 0.0, 320.0, 240.0),
            start: Point::new(0.0, 0.0),
            end: Point::new(0.0, 240.0),
            from: BG_TOP,
            to: BG_BOTTOM,
        }
    );
}

#[test]
fn only_the_spotlight_is_additive() {
    let song = build_song();
    let plan = compose(canvas(), &FrameState::evaluate(&song, 5.0, 0.3));
    assert_eq!(plan.ops[1].color(), SPOTLIGHT);
    assert_eq!(plan.ops[1].blend(), Blend::Plus);
    assert!(plan.ops[2..].iter().all(|op| op.blend() == Blend::Normal));
}

#[test]
fn peekaboo_adds_cover_strips() {
    let song = build_song();
    let mut state = FrameState::evaluate(&song, 5.0, 0.2);
    state.peekaboo = false;
    let open = compose(canvas(), &state).ops.len();
    state.peekaboo = true;
    let covered = compose(canvas(), &state).ops.len();
    assert_eq!(covered, open + 2);
}

#[test]
fn confetti_adds_forty_particles() {
    let song = build_song();
    let mut state = FrameState::evaluate(&song, 5.0, 0.2);
    let plain = compose(canvas(), &state).ops.len();
    state.confetti = true;
    let sparkly = compose(canvas(), &state).ops.len();
    assert_eq!(sparkly, plain + confetti::PARTICLE_COUNT);
}

#[test]
fn mouth_grows_with_openness() {
    let song = build_song();
    let closed = compose(canvas(), &FrameState::evaluate(&song, 5.0, 0.08));
    let wide = compose(canvas(), &FrameState::evaluate(&song, 5.0, 0.5));
    assert!(mouth_height(&wide) > mouth_height(&closed));
}

#[test]
fn singer_follows_bob() {
    let song = build_song();
    let state = FrameState::evaluate(&song, 0.8, 0.12);
    let plan = compose(canvas(), &state);
    let body = plan
        .ops
        .iter()
        .find(|op| op.color() == BODY)
        .unwrap();
    let DrawOp::FillPath { transform, .. } = body else {
        panic!("body is a path");
    };
    let origin = *transform * Point::ZERO;
    assert!((origin.x - 160.0).abs() < 1e-9);
    assert!((origin.y - (240.0 * 0.46 + state.bob)).abs() < 1e-9);
}
