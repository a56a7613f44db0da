use crate::{
    eval::frame_state::FrameState,
    foundation::{
        core::{Affine, BezPath, Canvas, Point, Rect, Rgba8},
        error::{PeekabooError, PeekabooResult},
    },
    render::{
        FrameRGBA,
        scene::{Blend, DrawOp, ScenePlan, compose},
    },
};

/// Rasterizes scene plans into a reusable pixmap.
pub struct StageRenderer {
    canvas: Canvas,
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
}

impl std::fmt::Debug for StageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageRenderer")
            .field("canvas", &self.canvas)
            .finish_non_exhaustive()
    }
}

impl StageRenderer {
    /// A renderer for `canvas`. Both sides must be non-zero and fit in `u16`.
    pub fn new(canvas: Canvas) -> PeekabooResult<Self> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(PeekabooError::render("canvas must be non-empty"));
        }
        let width: u16 = canvas
            .width
            .try_into()
            .map_err(|_| PeekabooError::render("canvas width exceeds u16"))?;
        let height: u16 = canvas
            .height
            .try_into()
            .map_err(|_| PeekabooError::render("canvas height exceeds u16"))?;
        Ok(Self {
            canvas,
            width,
            height,
            pixmap: vello_cpu::Pixmap::new(width, height),
        })
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Compose and rasterize one frame.
    pub fn render(&mut self, state: &FrameState) -> PeekabooResult<FrameRGBA> {
        let plan = compose(self.canvas, state);
        self.render_plan(&plan)
    }

    /// Rasterize an already composed plan. The plan must target this renderer's canvas.
    ///
    /// The pixmap is cleared and reused, so the returned frame owns a copy of its pixels.
    pub fn render_plan(&mut self, plan: &ScenePlan) -> PeekabooResult<FrameRGBA> {
        if plan.canvas != self.canvas {
            return Err(PeekabooError::render(format!(
                "plan canvas {}x{} does not match renderer {}x{}",
                plan.canvas.width, plan.canvas.height, self.canvas.width, self.canvas.height
            )));
        }

        clear_pixmap(&mut self.pixmap);
        let mut ctx = vello_cpu::RenderContext::new(self.width, self.height);
        for op in &plan.ops {
            draw_op(&mut ctx, op);
        }
        ctx.flush();
        ctx.render_to_pixmap(&mut self.pixmap);

        Ok(FrameRGBA {
            width: self.canvas.width,
            height: self.canvas.height,
            data: self.pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }
}

fn clear_pixmap(pixmap: &mut vello_cpu::Pixmap) {
    pixmap.data_as_u8_slice_mut().fill(0);
}

fn draw_op(ctx: &mut vello_cpu::RenderContext, op: &DrawOp) {
    let layered = op.blend() == Blend::Plus;
    if layered {
        // The layer is transparent outside the fill, so adding it leaves the rest untouched.
        ctx.push_blend_layer(vello_cpu::peniko::BlendMode::from(
            vello_cpu::peniko::Compose::Plus,
        ));
    }

    match op {
        DrawOp::FillPath {
            path,
            transform,
            color,
            ..
        } => {
            ctx.set_paint(color_to_cpu(*color));
            ctx.set_transform(affine_to_cpu(*transform));
            ctx.fill_path(&bezpath_to_cpu(path));
        }
        DrawOp::FillRect {
            rect,
            transform,
            color,
            ..
        } => {
            ctx.set_paint(color_to_cpu(*color));
            ctx.set_transform(affine_to_cpu(*transform));
            ctx.fill_rect(&rect_to_cpu(*rect));
        }
        DrawOp::FillLinearGradient {
            rect,
            start,
            end,
            from,
            to,
        } => {
            let gradient =
                vello_cpu::peniko::Gradient::new_linear(point_to_cpu(*start), point_to_cpu(*end))
                    .with_stops([color_to_cpu(*from), color_to_cpu(*to)]);
            ctx.set_paint(gradient);
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.fill_rect(&rect_to_cpu(*rect));
        }
    }

    if layered {
        ctx.pop_layer();
    }
}

fn color_to_cpu(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
