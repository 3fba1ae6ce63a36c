//! Component B: trajectory metrics.

use nalgebra::Point2;

/// Summary statistics of a trajectory: shortest segment, point count, and
/// total path length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryMetrics {
    pub shortest_segment: f64,
    pub coord_count: usize,
    pub path_length: f64,
}

/// Computes `(shortest segment, point count, total path length)` for `traj`.
///
/// Undefined for `traj.len() < 2` — callers must guard; debug builds assert.
pub fn traj_metrics(traj: &[Point2<f64>]) -> TrajectoryMetrics {
    debug_assert!(traj.len() >= 2, "traj_metrics requires at least two points");

    let mut shortest = f64::INFINITY;
    let mut total = 0.0;
    for pair in traj.windows(2) {
        let len = (pair[1] - pair[0]).norm();
        shortest = shortest.min(len);
        total += len;
    }
    TrajectoryMetrics {
        shortest_segment: shortest,
        coord_count: traj.len(),
        path_length: total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_line_metrics() {
        let traj = vec![
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 1.0),
            Point2::new(3.0, 1.0),
        ];
        let m = traj_metrics(&traj);
        assert_eq!(m.coord_count, 3);
        assert!((m.shortest_segment - 1.0).abs() < 1e-12);
        assert!((m.path_length - 2.0).abs() < 1e-12);
    }

    #[test]
    fn uneven_segments_pick_shortest() {
        let traj = vec![
            Point2::new(0.0, 0.0),
            Point2::new(3.0, 0.0),
            Point2::new(3.0, 0.5),
        ];
        let m = traj_metrics(&traj);
        assert!((m.shortest_segment - 0.5).abs() < 1e-12);
        assert!((m.path_length - 3.5).abs() < 1e-12);
    }
}
