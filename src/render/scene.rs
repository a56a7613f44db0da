use kurbo::{Circle, Ellipse, RoundedRect, Shape};

use crate::{
    eval::{confetti, frame_state::FrameState},
    foundation::core::{Affine, BezPath, Canvas, Point, Rect, Rgba8, Vec2},
};

const PATH_TOLERANCE: f64 = 0.1;

const BG_TOP: Rgba8 = Rgba8::hex(0x0b1736);
const BG_BOTTOM: Rgba8 = Rgba8::hex(0x091026);
const SPOTLIGHT: Rgba8 = Rgba8 {
    r: 124,
    g: 195,
    b: 255,
    a: 26,
};
const FLOOR: Rgba8 = Rgba8::hex(0x0b1228);
const FLOOR_RIM: Rgba8 = Rgba8 {
    r: 255,
    g: 255,
    b: 255,
    a: 13,
};
const BODY: Rgba8 = Rgba8::hex(0x7cc3ff);
const NECK: Rgba8 = Rgba8::hex(0xffd3b6);
const SKIN: Rgba8 = Rgba8::hex(0xffe0c7);
const HAIR: Rgba8 = Rgba8::hex(0x3b2f2a);
const HAIR_FRINGE: Rgba8 = Rgba8::hex(0x2d2420);
const WHITE: Rgba8 = Rgba8::hex(0xffffff);
const PUPIL: Rgba8 = Rgba8::hex(0x111111);
const NOSE: Rgba8 = Rgba8::hex(0xf5c8a9);
const MOUTH: Rgba8 = Rgba8::hex(0x9b0f3f);

/// How a fill combines with what is already drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Blend {
    /// Source-over.
    #[default]
    Normal,
    /// Additive, like canvas `lighter`.
    Plus,
}

/// One fill in device pixels.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    FillPath {
        path: BezPath,
        transform: Affine,
        color: Rgba8,
        blend: Blend,
    },
    FillRect {
        rect: Rect,
        transform: Affine,
        color: Rgba8,
        blend: Blend,
    },
    /// Two-stop linear gradient from `start` to `end`, untransformed.
    FillLinearGradient {
        rect: Rect,
        start: Point,
        end: Point,
        from: Rgba8,
        to: Rgba8,
    },
}

impl DrawOp {
    /// Fill colour; for gradients, the colour at `start`.
    pub fn color(&self) -> Rgba8 {
        match self {
            DrawOp::FillPath { color, .. } | DrawOp::FillRect { color, .. } => *color,
            DrawOp::FillLinearGradient { from, .. } => *from,
        }
    }

    /// Gradients always use [`Blend::Normal`].
    pub fn blend(&self) -> Blend {
        match self {
            DrawOp::FillPath { blend, .. } | DrawOp::FillRect { blend, .. } => *blend,
            DrawOp::FillLinearGradient { .. } => Blend::Normal,
        }
    }
}

/// Ordered fills for one frame, back to front.
#[derive(Clone, Debug)]
pub struct ScenePlan {
    pub canvas: Canvas,
    pub ops: Vec<DrawOp>,
}

struct Builder {
    ops: Vec<DrawOp>,
    transform: Affine,
    blend: Blend,
}

impl Builder {
    fn rect(&mut self, rect: Rect, color: Rgba8) {
        self.ops.push(DrawOp::FillRect {
            rect,
            transform: self.transform,
            color,
            blend: self.blend,
        });
    }

    fn shape(&mut self, shape: impl Shape, color: Rgba8) {
        self.path(shape.to_path(PATH_TOLERANCE), color);
    }

    fn path(&mut self, path: BezPath, color: Rgba8) {
        self.ops.push(DrawOp::FillPath {
            path,
            transform: self.transform,
            color,
            blend: self.blend,
        });
    }
}

/// Lay out the stage, the singer and the confetti for `state` on `canvas`.
pub fn compose(canvas: Canvas, state: &FrameState) -> ScenePlan {
    let w = f64::from(canvas.width);
    let h = f64::from(canvas.height);
    let mut b = Builder {
        ops: Vec::with_capacity(96),
        transform: Affine::IDENTITY,
        blend: Blend::Normal,
    };

    b.ops.push(DrawOp::FillLinearGradient {
        rect: Rect::new(0.0, 0.0, w, h),
        start: Point::new(0.0, 0.0),
        end: Point::new(0.0, h),
        from: BG_TOP,
        to: BG_BOTTOM,
    });

    b.blend = Blend::Plus;
    b.shape(
        Ellipse::new((w * 0.5, h * 0.25), (w * 0.45, h * 0.18), 0.0),
        SPOTLIGHT,
    );
    b.blend = Blend::Normal;

    b.rect(Rect::new(0.0, h * 0.72, w, h), FLOOR);
    b.rect(Rect::new(0.0, h * 0.72, w, h * 0.72 + 2.0), FLOOR_RIM);

    draw_singer(&mut b, canvas, state);

    if state.confetti {
        b.transform = Affine::IDENTITY;
        for p in confetti::particles(canvas, state.elapsed) {
            b.shape(Circle::new(p.center, p.radius), p.color);
        }
    }

    ScenePlan { canvas, ops: b.ops }
}

fn draw_singer(b: &mut Builder, canvas: Canvas, state: &FrameState) {
    let cx = f64::from(canvas.width) * 0.5;
    let cy = f64::from(canvas.height) * 0.46;
    let r = canvas.min_side() * 0.14;

    let body = Affine::translate(Vec2::new(cx, cy + state.bob)) * Affine::rotate(state.tilt);
    b.transform = body;

    b.shape(
        RoundedRect::new(-r * 0.9, r * 0.9, r * 0.9, r * 2.5, f64::min(18.0, r * 0.8)),
        BODY,
    );
    b.rect(Rect::new(-r * 0.25, r * 0.68, r * 0.25, r * 1.03), NECK);
    b.shape(Circle::new(Point::ZERO, r), SKIN);

    b.shape(
        Ellipse::new((0.0, -r * 0.6), (r * 0.95, r * 0.65), 0.0),
        HAIR,
    );
    let mut fringe = BezPath::new();
    fringe.move_to((-r * 0.95, -r * 0.15));
    fringe.quad_to((0.0, -r * 1.25), (r * 0.95, -r * 0.1));
    fringe.line_to((r * 0.95, -r * 0.45));
    fringe.quad_to((0.0, -r * 1.1), (-r * 0.95, -r * 0.5));
    fringe.close_path();
    b.path(fringe, HAIR_FRINGE);

    let eye_y = -r * 0.22;
    let eye_x = r * 0.46;
    for x in [-eye_x, eye_x] {
        b.shape(
            Ellipse::new((x, eye_y), (r * 0.22, r * state.eye_open * 0.14), 0.0),
            WHITE,
        );
    }
    for x in [-eye_x, eye_x] {
        b.shape(Circle::new((x, eye_y), r * 0.07), PUPIL);
    }

    b.shape(Circle::new((0.0, -r * 0.02), r * 0.07), NOSE);

    let mouth_w = r * 0.6;
    let mouth_h = r * (0.10 + 0.35 * state.mouth_open);
    b.shape(
        Ellipse::new((0.0, r * 0.34), (mouth_w, mouth_h), 0.0),
        MOUTH,
    );
    b.rect(
        Rect::from_origin_size(
            (-mouth_w * 0.6, r * 0.28),
            (mouth_w * 1.2, f64::max(2.0, mouth_h * 0.25)),
        ),
        WHITE,
    );

    let cover = if state.peekaboo { 1.0 } else { 0.0 };
    let hands_y = -r * 0.05;
    let hand_x = r * 1.05;
    let hand = Rect::from_origin_size((-r * 0.25, -r * 0.15), (r * 0.5, r * 0.6));
    for (x, angle) in [(-hand_x, -0.3 + 0.3 * cover), (hand_x, 0.3 - 0.3 * cover)] {
        b.transform = body * Affine::translate(Vec2::new(x, hands_y)) * Affine::rotate(angle);
        b.rect(hand, SKIN);
    }
    b.transform = body;

    if state.peekaboo {
        let cover_y = eye_y - r * 0.04;
        let cover_h = r * 0.4 * (0.2 + 0.8 * cover);
        for x in [-eye_x, eye_x] {
            b.rect(
                Rect::from_origin_size((x - r * 0.28, cover_y), (r * 0.56, cover_h)),
                SKIN,
            );
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scene.rs"]
mod tests;
