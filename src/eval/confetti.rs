use std::f64::consts::PI;

use crate::foundation::core::{Canvas, Point, Rgba8};

pub const PARTICLE_COUNT: usize = 40;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Particle {
    pub center: Point,
    pub radius: f64,
    pub color: Rgba8,
}

/// Closed-form particle positions at `t`; no state is carried between frames.
pub fn particles(canvas: Canvas, t: f64) -> Vec<Particle> {
    let w = f64::from(canvas.width);
    let h = f64::from(canvas.height);
    (0..PARTICLE_COUNT)
        .map(|i| {
            let fi = i as f64;
            let phi = (t * 2.0 + fi).rem_euclid(PI);
            let rx = (phi * (fi + 1.0)).sin() * w * 0.45;
            let ry = (phi * (fi + 3.0)).cos() * h * 0.18;
            Particle {
                center: Point::new(w * 0.5 + rx, h * 0.28 + ry),
                radius: 2.0 + (i % 3) as f64,
                color: Rgba8::hsla(((i * 23) % 360) as f64, 0.8, 0.65, 0.5),
            }
        })
        .collect()
}
