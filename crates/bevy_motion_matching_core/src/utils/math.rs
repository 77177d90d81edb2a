/// Wraps an angle in degrees into `[-180, 180)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Signed shortest rotation from `from` to `to`, in degrees.
pub fn delta_angle(from: f32, to: f32) -> f32 {
    wrap_degrees(to - from)
}

/// Wraps a playback time into `[0, length)`. Zero length clips always return zero.
pub fn wrap_time(time: f32, length: f32) -> f32 {
    if length <= 0.0 {
        0.0
    } else {
        time.rem_euclid(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_angle_takes_shortest_path() {
        assert_eq!(delta_angle(170.0, -170.0), 20.0);
        assert_eq!(delta_angle(-170.0, 170.0), -20.0);
        assert_eq!(delta_angle(10.0, 30.0), 20.0);
    }

    #[test]
    fn test_wrap_time() {
        assert!((wrap_time(2.5, 1.0) - 0.5).abs() < 1e-6);
        assert!((wrap_time(-0.25, 1.0) - 0.75).abs() < 1e-6);
        assert_eq!(wrap_time(3.0, 0.0), 0.0);
    }
}
