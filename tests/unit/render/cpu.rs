use super::*;
use crate::song::melody::build_song;

fn canvas() -> Canvas {
    Canvas {
        width: 320,
        height: 240,
    }
}

fn close(px: [u8; 4], rgb: [u8; 3]) -> bool {
    px[3] == 255
        && px[..3]
            .iter()
            .zip(rgb)
            .all(|(a, b)| (i16::from(*a) - i16::from(b)).abs() <= 2)
}

#[test]
fn frame_matches_canvas_size() {
    let song = build_song();
    let mut r = StageRenderer::new(canvas()).unwrap();
    let frame = r.render(&FrameState::at_rest(&song)).unwrap();
    assert_eq!((frame.width, frame.height), (320, 240));
    assert_eq!(frame.data.len(), 320 * 240 * 4);
    assert!(frame.premultiplied);
}

#[test]
fn stage_colours_land_where_expected() {
    let song = build_song();
    let mut r = StageRenderer::new(canvas()).unwrap();
    let frame = r.render(&FrameState::at_rest(&song)).unwrap();

    let top_left = frame.pixel(0, 0).unwrap();
    assert!(close(top_left, [0x0b, 0x17, 0x36]), "{top_left:?}");

    let floor = frame.pixel(0, 239).unwrap();
    assert!(close(floor, [0x0b, 0x12, 0x28]), "{floor:?}");

    // Between nose and mouth on the resting face.
    let r_head = 240.0 * 0.14;
    let cheek = frame
        .pixel(160, (240.0 * 0.46 + r_head * 0.15) as u32)
        .unwrap();
    assert!(close(cheek, [0xff, 0xe0, 0xc7]), "{cheek:?}");
}

#[test]
fn background_darkens_downwards() {
    let song = build_song();
    let mut r = StageRenderer::new(canvas()).unwrap();
    let frame = r.render(&FrameState::at_rest(&song)).unwrap();

    // Left edge, above the floor and outside the spotlight.
    let top = frame.pixel(0, 2).unwrap();
    let mid = frame.pixel(0, 120).unwrap();
    assert!(close(mid, [0x0a, 0x13, 0x2e]), "{mid:?}");
    assert!(mid[2] < top[2]);
}

#[test]
fn spotlight_adds_light() {
    let song = build_song();
    let mut r = StageRenderer::new(canvas()).unwrap();
    let frame = r.render(&FrameState::at_rest(&song)).unwrap();

    // Same row, just outside and well inside the spotlight ellipse.
    let dark = frame.pixel(4, 60).unwrap();
    let lit = frame.pixel(40, 60).unwrap();
    let gain: Vec<i16> = lit[..3]
        .iter()
        .zip(&dark[..3])
        .map(|(l, d)| i16::from(*l) - i16::from(*d))
        .collect();
    // rgba(124, 195, 255, 26) premultiplied and added; source-over would dim the blue gain.
    for (got, want) in gain.iter().zip([13i16, 20, 26]) {
        assert!((got - want).abs() <= 2, "{gain:?}");
    }
}

#[test]
fn renderer_is_reusable_across_frames() {
    let song = build_song();
    let mut r = StageRenderer::new(canvas()).unwrap();
    let a = r.render(&FrameState::evaluate(&song, 3.0, 0.5)).unwrap();
    let b = r.render(&FrameState::evaluate(&song, 3.0, 0.5)).unwrap();
    assert_eq!(a.data, b.data);
    let c = r.render(&FrameState::evaluate(&song, 3.0, 0.12)).unwrap();
    assert_ne!(a.data, c.data);
}

#[test]
fn rejects_unusable_canvases() {
    assert!(
        StageRenderer::new(Canvas {
            width: 0,
            height: 10
        })
        .is_err()
    );
    assert!(
        StageRenderer::new(Canvas {
            width: 70_000,
            height: 10
        })
        .is_err()
    );

    let mut r = StageRenderer::new(canvas()).unwrap();
    let other = ScenePlan {
        canvas: Canvas {
            width: 16,
            height: 16,
        },
        ops: Vec::new(),
    };
    assert!(r.render_plan(&other).is_err());
}
