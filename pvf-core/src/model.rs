//! Components C and D: the grid trainer and the trajectory synthesizer,
//! combined into a single [`PathVectorField`], the way the original
//! `BuildGrid` class bundles both `update_grid` and `av_traj` onto one grid.

use grid::Grid;
use log::{debug, warn};
use nalgebra::{Point2, Vector2};

use crate::error::{ConfigurationError, InputError};
use crate::geometry::{coord_from_ind, dist2node, find_trident, grid_dims, GridIndex};
use crate::metrics::traj_metrics;

/// Error surfaced by [`PathVectorField::update_grid`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrainError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// The complete on-disk-shaped state of a trained field, used by `pvf-io`
/// to build its serializable document without pulling `serde` into
/// `pvf-core`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawState {
    pub node_spacing: f64,
    pub grid_extents: (f64, f64),
    /// `grid[i][j]` is the `(vx, vy)` pair stored at lattice node `(i, j)`.
    pub grid: Vec<Vec<(f64, f64)>>,
    pub average_path_length: f64,
    pub grid_update_count: u64,
    pub max_coord_count: usize,
    pub shortest_segment: f64,
    /// Task-space offset of the grid-space origin, so a caller that derived
    /// extents automatically can still round-trip task-space coordinates.
    pub task_shift: (f64, f64),
}

/// A trained path vector field: the triangular grid of vectors plus the
/// training statistics that drive the synthesizer's termination policy.
#[derive(Debug, Clone)]
pub struct PathVectorField {
    spacing: f64,
    extents: Option<(f64, f64)>,
    dims: (usize, usize),
    grid: Grid<Vector2<f64>>,
    update_count: u64,
    average_path_length: f64,
    max_coord_count: usize,
    shortest_segment: f64,
    task_shift: Vector2<f64>,
}

impl PathVectorField {
    /// Constructs an untrained field with the given node spacing. Extents
    /// must be set with [`Self::set_extents`] before training or synthesis.
    pub fn new(node_spacing: f64) -> Result<Self, ConfigurationError> {
        if !(node_spacing > 0.0) {
            return Err(ConfigurationError::NonPositiveSpacing(node_spacing));
        }
        Ok(Self {
            spacing: node_spacing,
            extents: None,
            dims: (0, 0),
            grid: Grid::new(0, 0),
            update_count: 0,
            average_path_length: 0.0,
            max_coord_count: 0,
            shortest_segment: node_spacing,
            task_shift: Vector2::zeros(),
        })
    }

    /// Allocates the grid for extents `(Ex, Ey)`, ceilinged to integers.
    /// Must be called once, before any training.
    pub fn set_extents(&mut self, upper_corner: (f64, f64)) -> Result<(), ConfigurationError> {
        let (ex, ey) = upper_corner;
        if !(ex > 0.0 && ey > 0.0) {
            return Err(ConfigurationError::NonPositiveExtents(ex, ey));
        }
        let extents = (ex.ceil(), ey.ceil());
        let dims = grid_dims(Vector2::new(extents.0, extents.1), self.spacing);
        self.extents = Some(extents);
        self.dims = dims;
        self.grid = Grid::new(dims.1, dims.0); // rows = Ny, cols = Nx
        Ok(())
    }

    pub fn node_spacing(&self) -> f64 {
        self.spacing
    }

    pub fn extents(&self) -> Option<(f64, f64)> {
        self.extents
    }

    pub fn dims(&self) -> (usize, usize) {
        self.dims
    }

    pub fn average_path_length(&self) -> f64 {
        self.average_path_length
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn max_coord_count(&self) -> usize {
        self.max_coord_count
    }

    pub fn shortest_segment(&self) -> f64 {
        self.shortest_segment
    }

    /// Task-space offset of the grid-space origin (see [`Self::set_task_shift`]).
    pub fn task_shift(&self) -> Vector2<f64> {
        self.task_shift
    }

    /// Records the task-space↔grid-space shift a caller applied before
    /// training, so it can be recovered after a save/load round-trip.
    /// Grid contents are unaffected; this is bookkeeping for the caller.
    pub fn set_task_shift(&mut self, shift: Vector2<f64>) {
        self.task_shift = shift;
    }

    /// The vector stored at node `(i, j)`, or `None` if out of range.
    pub fn node_vector(&self, idx: GridIndex) -> Option<Vector2<f64>> {
        if idx.0 >= self.dims.0 || idx.1 >= self.dims.1 {
            return None;
        }
        Some(self.grid[(idx.1, idx.0)])
    }

    fn get_node(&self, idx: GridIndex) -> Vector2<f64> {
        self.grid[(idx.1, idx.0)]
    }

    fn set_node(&mut self, idx: GridIndex, v: Vector2<f64>) {
        self.grid[(idx.1, idx.0)] = v;
    }

    /// The convex-combination update rule: biases a node toward longer
    /// incoming suggestions while never fully discarding history.
    fn update_node(&mut self, v: Vector2<f64>, idx: GridIndex) {
        let h = self.get_node(idx);
        let updated = if h == Vector2::zeros() {
            v
        } else {
            let len_v = v.norm();
            let len_h = h.norm();
            let alpha = len_v / (len_v + len_h);
            h + alpha * (v - h)
        };
        self.set_node(idx, updated);
    }

    /// Exports the complete persisted-state layout (spec §6).
    pub fn to_raw_state(&self) -> RawState {
        let extents = self.extents.expect("to_raw_state requires configured extents");
        let mut grid = vec![vec![(0.0, 0.0); self.dims.1]; self.dims.0];
        for i in 0..self.dims.0 {
            for j in 0..self.dims.1 {
                let v = self.grid[(j, i)];
                grid[i][j] = (v.x, v.y);
            }
        }
        RawState {
            node_spacing: self.spacing,
            grid_extents: extents,
            grid,
            average_path_length: self.average_path_length,
            grid_update_count: self.update_count,
            max_coord_count: self.max_coord_count,
            shortest_segment: self.shortest_segment,
            task_shift: (self.task_shift.x, self.task_shift.y),
        }
    }

    /// Reconstructs a field from a previously exported [`RawState`].
    pub fn from_raw_state(raw: RawState) -> Result<Self, ConfigurationError> {
        let mut field = Self::new(raw.node_spacing)?;
        field.set_extents(raw.grid_extents)?;
        assert_eq!(raw.grid.len(), field.dims.0, "raw state grid width does not match spacing/extents");
        assert!(
            raw.grid.iter().all(|col| col.len() == field.dims.1),
            "raw state grid height does not match spacing/extents"
        );
        for i in 0..field.dims.0 {
            for j in 0..field.dims.1 {
                let (vx, vy) = raw.grid[i][j];
                field.set_node((i, j), Vector2::new(vx, vy));
            }
        }
        field.update_count = raw.grid_update_count;
        field.average_path_length = raw.average_path_length;
        field.max_coord_count = raw.max_coord_count;
        field.shortest_segment = raw.shortest_segment;
        field.task_shift = Vector2::new(raw.task_shift.0, raw.task_shift.1);
        Ok(field)
    }

    /// Ingests one trajectory, already in grid-space and already validated
    /// against extents by the caller (spec §4.C Input precondition).
    pub fn update_grid(&mut self, traj: &[Point2<f64>]) -> Result<(), TrainError> {
        if self.extents.is_none() {
            return Err(ConfigurationError::ExtentsNotSet.into());
        }
        if traj.is_empty() {
            return Err(InputError::Empty.into());
        }
        if traj.len() < 2 {
            return Err(InputError::TooShort(traj.len()).into());
        }

        let metrics = traj_metrics(traj);

        // A zero-length segment rejects the whole trajectory before any
        // aggregate counter is touched, so a rejected trajectory never
        // tightens shortest_segment to 0 (see DESIGN.md, Open Question 3).
        if let Some(zero_idx) = traj
            .windows(2)
            .position(|pair| (pair[1] - pair[0]).norm() == 0.0)
        {
            warn!("rejecting trajectory with zero-length segment at index {zero_idx}");
            return Err(InputError::ZeroLengthSegment(zero_idx).into());
        }

        self.update_count += 1;
        self.average_path_length = self.average_path_length * (self.update_count - 1) as f64
            / self.update_count as f64
            + metrics.path_length / self.update_count as f64;
        self.shortest_segment = self.shortest_segment.min(metrics.shortest_segment);
        self.max_coord_count = self.max_coord_count.max(metrics.coord_count);

        'traj: for k in 0..traj.len() - 1 {
            let p_k = traj[k];
            let p_next = traj[k + 1];
            let d = (p_next - p_k).norm();

            if d < self.spacing {
                let trident = find_trident(p_k, self.spacing);
                let Some(idxs) = trident.to_grid_indices(self.dims) else {
                    warn!("trident at {p_k:?} out of grid range, stopping trajectory ingestion");
                    break 'traj;
                };
                for idx in idxs {
                    let v = p_next - coord_from_ind(idx, self.spacing);
                    self.update_node(v, idx);
                }
            } else {
                let n_inc = (d / self.spacing).floor() as usize;
                let dir = (p_next - p_k) / d;
                for j in 0..n_inc {
                    let q = p_k + dir * (j as f64 * self.spacing);
                    let trident = find_trident(q, self.spacing);
                    let Some(idxs) = trident.to_grid_indices(self.dims) else {
                        warn!("trident at {q:?} out of grid range, stopping trajectory ingestion");
                        break 'traj;
                    };
                    for idx in idxs {
                        let v = p_next - coord_from_ind(idx, self.spacing);
                        self.update_node(v, idx);
                    }
                }
            }
        }

        if self.av_traj(traj[0]).is_none() {
            debug!("post-training coverage probe from trajectory origin found an unvisited trident");
        }

        Ok(())
    }

    /// Grows a pseudo-average trajectory from `start` by walking the grid.
    /// Returns `None` only when the start trident's three nodes are all
    /// unvisited (model coverage exhausted); any other termination yields
    /// `Some` with the trajectory accumulated so far.
    pub fn av_traj(&mut self, start: Point2<f64>) -> Option<Vec<Point2<f64>>> {
        debug_assert!(self.extents.is_some(), "av_traj called before set_extents");
        if self.extents.is_none() {
            return None;
        }

        let mut path = vec![start];
        let mut length = 0.0_f64;

        loop {
            let p = *path.last().expect("path always has at least the start point");
            let trident = find_trident(p, self.spacing);
            let Some([left, right, center]) = trident.to_grid_indices(self.dims) else {
                break;
            };

            let v_left = self.get_node(left);
            let v_right = self.get_node(right);
            let v_center = self.get_node(center);
            let visited_count = [v_left, v_right, v_center]
                .iter()
                .filter(|v| **v != Vector2::zeros())
                .count();

            let p_next = match visited_count {
                0 => return None,
                1 => {
                    let (n_idx, v_n) = [(left, v_left), (right, v_right), (center, v_center)]
                        .into_iter()
                        .find(|(_, v)| *v != Vector2::zeros())
                        .expect("exactly one node visited");
                    let target = coord_from_ind(n_idx, self.spacing) + v_n;
                    let v_left = target - coord_from_ind(left, self.spacing);
                    let v_right = target - coord_from_ind(right, self.spacing);
                    let v_center = target - coord_from_ind(center, self.spacing);
                    self.update_node(v_left, left);
                    self.update_node(v_right, right);
                    self.update_node(v_center, center);
                    // All three now share a target; the choice of which to
                    // step along is arbitrary.
                    p + v_left
                }
                2 => {
                    let entries = [(left, v_left), (right, v_right), (center, v_center)];
                    let empty_idx = entries
                        .iter()
                        .find(|(_, v)| *v == Vector2::zeros())
                        .expect("exactly one node unvisited")
                        .0;
                    let mut visited = entries.into_iter().filter(|(_, v)| *v != Vector2::zeros());
                    let (idx_a, v_a) = visited.next().expect("two nodes visited");
                    let (idx_b, v_b) = visited.next().expect("two nodes visited");

                    // Weighting is by distance to the node, not proximity:
                    // nearer nodes get less weight (preserved per spec §4.D).
                    let d_a = dist2node(p, idx_a, self.spacing);
                    let d_b = dist2node(p, idx_b, self.spacing);
                    let denom = d_a + d_b;
                    let w_a = d_a / denom;
                    let w_b = d_b / denom;
                    let step = v_a * w_a + v_b * w_b;
                    let p_next = p + step;

                    let v_empty = p_next - coord_from_ind(empty_idx, self.spacing);
                    self.update_node(v_empty, empty_idx);
                    p_next
                }
                3 => {
                    let d_left = dist2node(p, left, self.spacing);
                    let d_right = dist2node(p, right, self.spacing);
                    let d_center = dist2node(p, center, self.spacing);
                    let denom = d_left + d_right + d_center;
                    let w_left = (d_center + d_right - d_left) / denom;
                    let w_right = (d_center + d_left - d_right) / denom;
                    let w_center = (d_left + d_right - d_center) / denom;
                    p + v_left * w_left + v_right * w_right + v_center * w_center
                }
                _ => unreachable!("visited_count is in 0..=3"),
            };

            let delta = (p_next - p).norm();
            length += delta;

            if p_next == p {
                break;
            }
            if path.len() as f64 > self.max_coord_count as f64 * 1.5 {
                break;
            }
            if self.shortest_segment > delta * 1.5 {
                break;
            }
            if length > self.average_path_length {
                break;
            }

            path.push(p_next);
        }

        Some(path)
    }
}
