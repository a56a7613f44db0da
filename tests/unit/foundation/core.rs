use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
    assert!(Fps::new(60, 1).is_ok());
}

#[test]
fn fps_frames_secs_roundtrip_floor() {
    let fps = Fps::new(30000, 1001).unwrap();
    let secs = fps.frames_to_secs(123);
    assert_eq!(fps.secs_to_frames_floor(secs), 123);
}

#[test]
fn hex_colour_splits_channels() {
    assert_eq!(Rgba8::hex(0x7cc3ff), Rgba8::opaque(0x7c, 0xc3, 0xff));
    assert_eq!(Rgba8::hex(0x0b1736).a, 255);
}

#[test]
fn hsla_primaries() {
    assert_eq!(Rgba8::hsla(0.0, 1.0, 0.5, 1.0), Rgba8::opaque(255, 0, 0));
    assert_eq!(Rgba8::hsla(120.0, 1.0, 0.5, 1.0), Rgba8::opaque(0, 255, 0));
    assert_eq!(Rgba8::hsla(240.0, 1.0, 0.5, 1.0), Rgba8::opaque(0, 0, 255));
    assert_eq!(Rgba8::hsla(480.0, 1.0, 0.5, 0.5).g, 255);
    assert_eq!(Rgba8::hsla(0.0, 0.0, 1.0, 0.5).a, 128);
}

#[test]
fn premul_scales_colour_by_alpha() {
    let c = Rgba8::opaque(255, 0, 0).with_alpha(0.5);
    assert_eq!(c.to_premul(), [128, 0, 0, 128]);
}

#[test]
fn canvas_min_side() {
    let c = Canvas {
        width: 640,
        height: 360,
    };
    assert_eq!(c.min_side(), 360.0);
}
