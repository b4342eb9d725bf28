//! Future memory-reservation projection.

/// Reservation the cluster would reach if one of `active` instances were
/// removed, assuming its reserved memory spreads evenly over the survivors.
///
/// With one instance or none the result is 100: removing the last instance is
/// never allowed and the formula is undefined.
pub fn project_reservation(current: f64, active: usize) -> f64 {
    if active <= 1 {
        return 100.0;
    }
    let n = active as f64;
    current * n / (n - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_instance_projects_full() {
        assert_eq!(project_reservation(10.0, 1), 100.0);
        assert_eq!(project_reservation(0.0, 0), 100.0);
    }

    #[test]
    fn redistributes_over_survivors() {
        let projected = project_reservation(80.0, 4);
        assert!((projected - 106.666_666).abs() < 1e-3);
    }

    #[test]
    fn no_integer_truncation() {
        assert_eq!(project_reservation(70.0, 3), 105.0);
        assert_eq!(project_reservation(33.0, 2), 66.0);
        assert!((project_reservation(10.0, 7) - 11.666_666).abs() < 1e-3);
    }
}
