/// Average speed in km/h needed to cover `distance_km` in `remaining_seconds`.
///
/// Returns 0 when no useful advice exists: no time left, no known distance,
/// or a non-finite input.
pub fn required_speed_kmh(distance_km: f64, remaining_seconds: f64) -> f64 {
    if !distance_km.is_finite() || !remaining_seconds.is_finite() {
        return 0.0;
    }
    if remaining_seconds <= 0.0 || distance_km <= 0.0 {
        return 0.0;
    }

    distance_km / (remaining_seconds / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn one_hour_twenty_km() {
        assert!(close(required_speed_kmh(20.0, 3600.0), 20.0));
        assert!(close(required_speed_kmh(20.0, 1800.0), 40.0));
    }

    #[test]
    fn zero_when_out_of_time_or_distance() {
        assert_eq!(required_speed_kmh(20.0, 0.0), 0.0);
        assert_eq!(required_speed_kmh(20.0, -5.0), 0.0);
        assert_eq!(required_speed_kmh(0.0, 3600.0), 0.0);
        assert_eq!(required_speed_kmh(f64::NAN, 3600.0), 0.0);
        assert_eq!(required_speed_kmh(5.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn never_negative_and_zero_only_at_the_edges() {
        for d in [0.0, 0.001, 1.0, 12.5, 400.0] {
            for r in [-60.0, 0.0, 1.0, 59.9, 3600.0, 86400.0] {
                let speed = required_speed_kmh(d, r);
                assert!(speed >= 0.0);
                assert_eq!(speed == 0.0, d == 0.0 || r <= 0.0, "d={d} r={r}");
                if speed > 0.0 {
                    assert!(close(speed, d / (r / 3600.0)));
                }
            }
        }
    }
}
