//! Component E: I/O and serialization collaborators.
//!
//! Everything here sits outside the engine proper: reading and writing
//! trajectory text files, shifting trajectories between task space (the
//! caller's own coordinate frame, which may have negative coordinates) and
//! grid space (origin-anchored, as the engine requires), and persisting a
//! trained [`pvf_core::PathVectorField`] to JSON.

use std::fs;
use std::path::Path;

use log::warn;
use nalgebra::{Point2, Vector2};
use pvf_core::{ConfigurationError, InputError, PathVectorField, RawState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Padding, in node-spacing multiples, added around a trajectory's bounding
/// box when extents are derived automatically.
const AUTO_PADDING: f64 = 3.0;

#[derive(Debug, Error)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ConfigurationError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("line {0} is not two whitespace-separated numbers")]
    MalformedLine(usize),
    #[error("trailing blank line at {0}")]
    TrailingBlankLine(usize),
}

/// Reads a trajectory file: one point per line, `x y` whitespace-separated.
/// A trailing blank line is rejected; blank lines elsewhere are treated as
/// a malformed line, since the format has no comment or skip convention.
pub fn read_trajectory(path: impl AsRef<Path>) -> Result<Vec<Point2<f64>>, IoError> {
    let text = fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().collect();

    if let Some(last) = lines.last() {
        if last.trim().is_empty() {
            return Err(IoError::TrailingBlankLine(lines.len()));
        }
    }

    let mut traj = Vec::with_capacity(lines.len());
    for (n, line) in lines.iter().enumerate() {
        let mut fields = line.split_whitespace();
        let x = fields.next().and_then(|s| s.parse::<f64>().ok());
        let y = fields.next().and_then(|s| s.parse::<f64>().ok());
        if fields.next().is_some() {
            return Err(IoError::MalformedLine(n + 1));
        }
        match (x, y) {
            (Some(x), Some(y)) => traj.push(Point2::new(x, y)),
            _ => return Err(IoError::MalformedLine(n + 1)),
        }
    }
    if traj.is_empty() {
        return Err(InputError::Empty.into());
    }
    Ok(traj)
}

/// Writes a trajectory in the same one-point-per-line format.
pub fn write_trajectory(path: impl AsRef<Path>, traj: &[Point2<f64>]) -> Result<(), IoError> {
    let mut out = String::with_capacity(traj.len() * 16);
    for p in traj {
        out.push_str(&format!("{} {}\n", p.x, p.y));
    }
    fs::write(path, out)?;
    Ok(())
}

/// Result of converting a task-space trajectory into grid space: the
/// shifted trajectory, the derived extents, and the shift that recovers
/// task-space coordinates from grid-space ones.
pub struct GridSpaceTrajectory {
    pub traj: Vec<Point2<f64>>,
    pub extents: (f64, f64),
    pub shift: Vector2<f64>,
}

/// Converts a task-space trajectory to grid space, deriving extents
/// automatically from the trajectory's bounding box padded by
/// `AUTO_PADDING` node spacings on every side.
pub fn to_grid_space(traj: &[Point2<f64>], node_spacing: f64) -> Result<GridSpaceTrajectory, IoError> {
    let first = traj.first().ok_or(InputError::Empty)?;
    let (mut min_x, mut max_x) = (first.x, first.x);
    let (mut min_y, mut max_y) = (first.y, first.y);
    for p in traj {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let y_fact = pvf_core::Y_FACT;
    let ex = (max_x - min_x) + 2.0 * AUTO_PADDING * node_spacing;
    let ey = (max_y - min_y) + 2.0 * AUTO_PADDING * node_spacing * y_fact;
    let shift = Vector2::new(min_x - AUTO_PADDING * node_spacing, min_y - AUTO_PADDING * node_spacing * y_fact);

    let shifted: Vec<Point2<f64>> = traj.iter().map(|p| p - shift).collect();
    Ok(GridSpaceTrajectory {
        traj: shifted,
        extents: (ex, ey),
        shift,
    })
}

/// Converts a grid-space trajectory back to task space using a shift
/// previously returned by [`to_grid_space`].
pub fn to_task_space(traj: &[Point2<f64>], shift: Vector2<f64>) -> Vec<Point2<f64>> {
    traj.iter().map(|p| p + shift).collect()
}

/// Drops consecutive duplicate points (stalls) and rejects any point
/// outside `(0, Ex) x (0, Ey)`.
pub fn check_extents(traj: &[Point2<f64>], extents: (f64, f64)) -> Result<Vec<Point2<f64>>, IoError> {
    if traj.is_empty() {
        return Err(InputError::Empty.into());
    }
    let (ex, ey) = extents;
    let mut fixed = Vec::with_capacity(traj.len());
    let mut dropped = 0;
    for (n, &p) in traj.iter().enumerate() {
        if p.x <= 0.0 || p.y <= 0.0 || p.x >= ex || p.y >= ey {
            return Err(InputError::OutOfExtents { x: p.x, y: p.y, ex, ey }.into());
        }
        if fixed.last() == Some(&p) {
            dropped += 1;
            continue;
        }
        let _ = n;
        fixed.push(p);
    }
    if dropped > 0 {
        warn!("dropped {dropped} consecutive duplicate coordinate(s) from trajectory");
    }
    Ok(fixed)
}

/// JSON-serializable mirror of [`RawState`], matching the persisted-state
/// layout byte-for-byte (field names and array shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDocument {
    pub node_spacing: f64,
    pub grid_extents: [f64; 2],
    pub grid: Vec<Vec<[f64; 2]>>,
    pub average_path_length: f64,
    pub grid_update_count: u64,
    pub max_coord_count: usize,
    pub shortest_segment: f64,
    /// Task-space offset of the grid-space origin. `[0.0, 0.0]` for models
    /// trained against caller-supplied extents with no shift.
    #[serde(default)]
    pub task_shift: [f64; 2],
}

impl From<RawState> for ModelDocument {
    fn from(raw: RawState) -> Self {
        Self {
            node_spacing: raw.node_spacing,
            grid_extents: [raw.grid_extents.0, raw.grid_extents.1],
            grid: raw
                .grid
                .into_iter()
                .map(|col| col.into_iter().map(|(x, y)| [x, y]).collect())
                .collect(),
            average_path_length: raw.average_path_length,
            grid_update_count: raw.grid_update_count,
            max_coord_count: raw.max_coord_count,
            shortest_segment: raw.shortest_segment,
            task_shift: [raw.task_shift.0, raw.task_shift.1],
        }
    }
}

impl From<ModelDocument> for RawState {
    fn from(doc: ModelDocument) -> Self {
        Self {
            node_spacing: doc.node_spacing,
            grid_extents: (doc.grid_extents[0], doc.grid_extents[1]),
            grid: doc
                .grid
                .into_iter()
                .map(|col| col.into_iter().map(|[x, y]| (x, y)).collect())
                .collect(),
            average_path_length: doc.average_path_length,
            grid_update_count: doc.grid_update_count,
            max_coord_count: doc.max_coord_count,
            shortest_segment: doc.shortest_segment,
            task_shift: (doc.task_shift[0], doc.task_shift[1]),
        }
    }
}

/// Loads a trained field from `path`, or `None` if the file does not exist
/// (mirrors the original collaborator's "no prior model yet" contract).
pub fn open_model(path: impl AsRef<Path>) -> Result<Option<PathVectorField>, IoError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    let doc: ModelDocument = serde_json::from_str(&text)?;
    let field = PathVectorField::from_raw_state(doc.into())?;
    Ok(Some(field))
}

/// Persists a trained field to `path` as JSON.
pub fn save_model(path: impl AsRef<Path>, field: &PathVectorField) -> Result<(), IoError> {
    let doc: ModelDocument = field.to_raw_state().into();
    let text = serde_json::to_string_pretty(&doc)?;
    fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_trajectory_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.txt");
        let traj = vec![Point2::new(1.0, 2.0), Point2::new(3.5, -4.25)];
        write_trajectory(&path, &traj).unwrap();
        let read_back = read_trajectory(&path).unwrap();
        assert_eq!(read_back, traj);
    }

    #[test]
    fn rejects_trailing_blank_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.txt");
        fs::write(&path, "1.0 2.0\n3.0 4.0\n\n").unwrap();
        assert!(matches!(read_trajectory(&path), Err(IoError::TrailingBlankLine(_))));
    }

    #[test]
    fn rejects_malformed_line() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("traj.txt");
        fs::write(&path, "1.0 2.0\nnot-a-number 4.0\n").unwrap();
        assert!(matches!(read_trajectory(&path), Err(IoError::MalformedLine(2))));
    }

    #[test]
    fn grid_space_round_trips_to_task_space() {
        let traj = vec![Point2::new(-5.0, -3.0), Point2::new(2.0, 4.0)];
        let gs = to_grid_space(&traj, 1.0).unwrap();
        assert!(gs.traj.iter().all(|p| p.x > 0.0 && p.y > 0.0));
        let back = to_task_space(&gs.traj, gs.shift);
        for (a, b) in back.iter().zip(traj.iter()) {
            assert!((a.x - b.x).abs() < 1e-9);
            assert!((a.y - b.y).abs() < 1e-9);
        }
    }

    #[test]
    fn check_extents_drops_consecutive_duplicates() {
        let traj = vec![
            Point2::new(1.0, 1.0),
            Point2::new(1.0, 1.0),
            Point2::new(2.0, 2.0),
        ];
        let fixed = check_extents(&traj, (10.0, 10.0)).unwrap();
        assert_eq!(fixed.len(), 2);
    }

    #[test]
    fn check_extents_rejects_out_of_bounds_point() {
        let traj = vec![Point2::new(1.0, 1.0), Point2::new(20.0, 1.0)];
        assert!(matches!(
            check_extents(&traj, (10.0, 10.0)),
            Err(IoError::Input(InputError::OutOfExtents { .. }))
        ));
    }

    #[test]
    fn model_document_round_trips_through_json() {
        let mut field = PathVectorField::new(1.0).unwrap();
        field.set_extents((5.0, 5.0)).unwrap();
        field
            .update_grid(&[Point2::new(1.0, 1.0), Point2::new(1.0, 2.0), Point2::new(2.0, 3.0)])
            .unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("model.json");
        save_model(&path, &field).unwrap();
        let restored = open_model(&path).unwrap().expect("model file exists");
        assert_eq!(restored.to_raw_state(), field.to_raw_state());
    }

    #[test]
    fn open_model_returns_none_for_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("does-not-exist.json");
        assert!(open_model(&path).unwrap().is_none());
    }
}
