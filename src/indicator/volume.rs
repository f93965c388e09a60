/// Mean of the strictly positive volumes in the series.
///
/// Returns 1 when no bar traded, so volume ratios downstream never divide by zero.
pub fn average_volume(volumes: &[f64]) -> f64 {
    let (sum, count) = volumes
        .iter()
        .filter(|&&v| v > 0.0)
        .fold((0.0, 0usize), |(sum, count), &v| (sum + v, count + 1));
    if count == 0 {
        return 1.0;
    }
    sum / count as f64
}

/// Last volume relative to [`average_volume`]. 0 for an empty series.
pub fn volume_ratio(volumes: &[f64]) -> f64 {
    match volumes.last() {
        Some(&last) => last / average_volume(volumes),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_ignores_non_positive_volumes() {
        assert!((average_volume(&[0.0, 2.0, 4.0, -1.0]) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn average_without_volume_is_one() {
        assert_eq!(average_volume(&[]), 1.0);
        assert_eq!(average_volume(&[0.0, 0.0]), 1.0);
    }

    #[test]
    fn ratio_of_spike_against_average() {
        let mut volumes = vec![1000.0; 19];
        volumes.push(5000.0);
        // average = 24000 / 20 = 1200
        assert!((volume_ratio(&volumes) - 5000.0 / 1200.0).abs() < 1e-12);
    }

    #[test]
    fn ratio_without_traded_volume_is_raw_last_volume() {
        assert_eq!(volume_ratio(&[0.0, 0.0]), 0.0);
        assert_eq!(volume_ratio(&[]), 0.0);
    }
}
