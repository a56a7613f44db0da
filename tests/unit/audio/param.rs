use super::*;

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn default_value_holds_without_events() {
    let p = AudioParam::new(0.9);
    assert_eq!(p.value_at(0.0), 0.9);
    assert_eq!(p.value_at(100.0), 0.9);
}

#[test]
fn set_value_jumps_at_its_time() {
    let mut p = AudioParam::new(1.0);
    p.set_value_at_time(0.25, 2.0).unwrap();
    assert_eq!(p.value_at(1.999), 1.0);
    assert_eq!(p.value_at(2.0), 0.25);
    assert_eq!(p.value_at(9.0), 0.25);
}

#[test]
fn linear_ramp_interpolates_from_previous_event() {
    let mut p = AudioParam::new(1.0);
    p.set_value_at_time(0.0, 1.0)
        .unwrap()
        .linear_ramp_to_value_at_time(1.0, 3.0)
        .unwrap();
    assert!(close(p.value_at(1.0), 0.0));
    assert!(close(p.value_at(2.0), 0.5));
    assert!(close(p.value_at(3.0), 1.0));
    assert!(close(p.value_at(4.0), 1.0));
}

#[test]
fn exponential_ramp_is_geometric() {
    let mut p = AudioParam::new(1.0);
    p.set_value_at_time(0.01, 0.0)
        .unwrap()
        .exponential_ramp_to_value_at_time(1.0, 2.0)
        .unwrap();
    assert!(close(p.value_at(1.0), 0.1));
    assert!(close(p.value_at(2.0), 1.0));
}

#[test]
fn exponential_ramp_rejects_non_positive_target() {
    let mut p = AudioParam::new(1.0);
    assert!(p.exponential_ramp_to_value_at_time(0.0, 1.0).is_err());
}

#[test]
fn set_target_decays_with_time_constant() {
    let mut p = AudioParam::new(1.0);
    p.set_target_at_time(0.0, 1.0, 0.5).unwrap();
    assert_eq!(p.value_at(0.5), 1.0);
    assert!(close(p.value_at(1.5), (-1.0f64).exp()));
    assert!(p.value_at(10.0) < 1e-8);
    assert!(p.set_target_at_time(0.0, 2.0, 0.0).is_err());
}

#[test]
fn note_envelope_shape() {
    // Attack, hold, then release: the shape every scheduled tone uses.
    let mut p = AudioParam::new(1.0);
    p.set_value_at_time(0.00001, 1.0)
        .unwrap()
        .exponential_ramp_to_value_at_time(0.16, 1.008)
        .unwrap()
        .set_target_at_time(0.00001, 1.24, 0.03)
        .unwrap();
    assert!(p.value_at(1.0) < 1e-4);
    assert!(close(p.value_at(1.1), 0.16));
    assert!(p.value_at(1.24 + 0.03) < 0.16 * 0.4);
    assert!(p.value_at(1.6) < 1e-4);
}

#[test]
fn events_are_kept_sorted() {
    let mut p = AudioParam::new(0.0);
    p.set_value_at_time(3.0, 3.0).unwrap();
    p.set_value_at_time(1.0, 1.0).unwrap();
    let times: Vec<f64> = p
        .events()
        .iter()
        .map(|e| match *e {
            Automation::SetValue { time, .. } => time,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(times, vec![1.0, 3.0]);
    assert_eq!(p.value_at(2.0), 1.0);
    assert!(p.set_value_at_time(f64::NAN, 1.0).is_err());
}
