use super::*;

#[test]
fn mul_div255_rounds_to_nearest() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u16(0, 200), 0);
}

#[test]
fn lerp_and_clamp() {
    assert_eq!(lerp(2.0, 4.0, 0.5), 3.0);
    assert_eq!(clamp01(-1.0), 0.0);
    assert_eq!(clamp01(2.0), 1.0);
}

#[test]
fn megabytes_label_uses_two_decimals() {
    assert_eq!(format_megabytes(0), "0.00 MB");
    assert_eq!(format_megabytes(1024 * 1024 * 3 / 2), "1.50 MB");
}
