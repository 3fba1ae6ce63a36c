//! Component A: triangular lattice geometry.
//!
//! Nodes live on a flat `(i, j)` address space where `i` packs two lattice
//! columns per row (`i ≡ j (mod 2)` for populated sites) so the whole
//! lattice fits a single dense rectangular array. The grid is bounded by
//! extents, not periodic, so there is no wraparound.

use nalgebra::{Point2, Vector2};

/// Scales a node spacing to the height of the equilateral triangles it forms.
pub const Y_FACT: f64 = 0.866_025_403_784_438_6; // sqrt(3) / 2

/// A signed lattice address. Signed because [`find_trident`] is a pure
/// function over all of `f64`-space and may compute indices outside any
/// particular grid's allocation; callers bounds-check separately.
pub type NodeIndex = (i64, i64);

/// A validated, in-range lattice address.
pub type GridIndex = (usize, usize);

/// The three nodes of the smallest lattice triangle enclosing a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trident {
    /// Lower-left vertex (apex-up triangles) — the smaller-`i` member of the
    /// same-row pair.
    pub left: NodeIndex,
    /// Lower-right vertex — the larger-`i` member of the same-row pair.
    pub right: NodeIndex,
    /// The third vertex: above for an apex-up triangle, below for apex-down.
    pub center: NodeIndex,
}

impl Trident {
    /// The three vertices, in `(left, right, center)` order.
    pub fn nodes(&self) -> [NodeIndex; 3] {
        [self.left, self.right, self.center]
    }

    /// Converts every vertex to a validated [`GridIndex`], returning `None`
    /// if any vertex falls outside `dims = (Nx, Ny)`.
    pub fn to_grid_indices(&self, dims: (usize, usize)) -> Option<[GridIndex; 3]> {
        let mut out = [(0usize, 0usize); 3];
        for (slot, &(i, j)) in out.iter_mut().zip(self.nodes().iter()) {
            if i < 0 || j < 0 {
                return None;
            }
            let (i, j) = (i as usize, j as usize);
            if i >= dims.0 || j >= dims.1 {
                return None;
            }
            *slot = (i, j);
        }
        Some(out)
    }
}

/// Cartesian position of lattice node `(i, j)` given node spacing `s`.
pub fn coord_from_ind((i, j): NodeIndex, s: f64) -> Point2<f64> {
    Point2::new(i as f64 * s / 2.0, j as f64 * s * Y_FACT)
}

/// Euclidean distance from `p` to the node at `node_ind`.
pub fn dist2node(p: Point2<f64>, node_ind: NodeIndex, s: f64) -> f64 {
    (p - coord_from_ind(node_ind, s)).norm()
}

/// Locates the smallest equilateral lattice triangle containing `p`.
///
/// Deterministic tie-break: a point exactly on a lattice edge or vertex
/// rounds `i` and `j` down (the underlying `floor` used for the linear
/// change of basis below), so identical inputs always return the same
/// trident.
pub fn find_trident(p: Point2<f64>, s: f64) -> Trident {
    // Linear change of basis into a sheared unit-square lattice: each row
    // `row` has its column origin shifted by half a spacing relative to the
    // row below, folded away here so the remaining `(u, v)` fractional part
    // just needs comparing against the unit-square diagonal.
    let v = p.y / (s * Y_FACT);
    let u = p.x / s - 0.5 * v;

    let row = v.floor() as i64;
    let col = u.floor() as i64;
    let u_frac = u - col as f64;
    let v_frac = v - row as f64;

    if u_frac + v_frac < 1.0 {
        // Apex-up: left/right share row `row`, center is above in `row + 1`.
        let left = (2 * col + row, row);
        let right = (left.0 + 2, row);
        let center = (2 * col + row + 1, row + 1);
        Trident { left, right, center }
    } else {
        // Apex-down: left/right share row `row + 1`, center is below in `row`.
        let left = (2 * col + row + 1, row + 1);
        let right = (left.0 + 2, row + 1);
        let center = (2 * (col + 1) + row, row);
        Trident { left, right, center }
    }
}

/// Number of lattice nodes needed along each axis to cover extents
/// `(Ex, Ey)` at spacing `s`.
pub fn grid_dims(extents: Vector2<f64>, s: f64) -> (usize, usize) {
    let nx = (2.0 * extents.x / s).ceil() as usize + 1;
    let ny = (extents.y / (s * Y_FACT)).ceil() as usize + 1;
    (nx, ny)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Barycentric containment test, with a small outward tolerance since
    /// [`find_trident`]'s tie-break can place `p` exactly on an edge.
    fn point_in_triangle(p: Point2<f64>, a: Point2<f64>, b: Point2<f64>, c: Point2<f64>) -> bool {
        let area2 = |a: Point2<f64>, b: Point2<f64>, c: Point2<f64>| (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        let total = area2(a, b, c).abs();
        let u = area2(p, b, c).abs();
        let v = area2(a, p, c).abs();
        let w = area2(a, b, p).abs();
        (u + v + w - total).abs() < 1e-6 * total.max(1.0)
    }

    proptest! {
        #[test]
        fn trident_is_equilateral_distinct_and_contains_point(
            x in -50.0_f64..50.0,
            y in -50.0_f64..50.0,
            s in 0.1_f64..5.0,
        ) {
            let p = Point2::new(x, y);
            let t = find_trident(p, s);
            let nodes = t.nodes();
            prop_assert_ne!(nodes[0], nodes[1]);
            prop_assert_ne!(nodes[1], nodes[2]);
            prop_assert_ne!(nodes[0], nodes[2]);

            let [a, b, c] = nodes.map(|n| coord_from_ind(n, s));
            for d in [(a - b).norm(), (b - c).norm(), (c - a).norm()] {
                prop_assert!((d - s).abs() < 1e-6);
            }
            prop_assert!(point_in_triangle(p, a, b, c), "p={p:?} not inside trident {a:?},{b:?},{c:?}");
        }

        #[test]
        fn triangle_weights_are_nonnegative_and_sum_to_one(
            x in -50.0_f64..50.0,
            y in -50.0_f64..50.0,
            s in 0.1_f64..5.0,
        ) {
            let p = Point2::new(x, y);
            let t = find_trident(p, s);
            let d_left = dist2node(p, t.left, s);
            let d_right = dist2node(p, t.right, s);
            let d_center = dist2node(p, t.center, s);
            let denom = d_left + d_right + d_center;
            prop_assume!(denom > 1e-9);

            let w_left = (d_center + d_right - d_left) / denom;
            let w_right = (d_center + d_left - d_right) / denom;
            let w_center = (d_left + d_right - d_center) / denom;

            prop_assert!((w_left + w_right + w_center - 1.0).abs() < 1e-6);
            // A point inside its own trident is never farther from one
            // vertex than the sum of its distances to the other two.
            prop_assert!(w_left >= -1e-6);
            prop_assert!(w_right >= -1e-6);
            prop_assert!(w_center >= -1e-6);
        }
    }

    #[test]
    fn s6_canonical_trident() {
        let s = 1.0_f64;
        let p = Point2::new(0.5 * s, 0.25 * s * 3f64.sqrt());
        let t = find_trident(p, s);
        let coords: Vec<_> = t.nodes().iter().map(|&n| coord_from_ind(n, s)).collect();
        assert!(coords.contains(&Point2::new(0.0, 0.0)));
        assert!(coords.contains(&Point2::new(s, 0.0)));
        assert!(coords.contains(&Point2::new(0.5 * s, 0.5 * s * 3f64.sqrt())));
    }

    #[test]
    fn trident_is_equilateral_of_side_s() {
        let s = 0.73_f64;
        for (x, y) in [(1.1, 1.3), (0.2, 0.05), (2.9, 4.4), (5.0, 0.9)] {
            let p = Point2::new(x, y);
            let t = find_trident(p, s);
            let [a, b, c] = t.nodes().map(|n| coord_from_ind(n, s));
            let d_ab = (a - b).norm();
            let d_bc = (b - c).norm();
            let d_ca = (c - a).norm();
            for d in [d_ab, d_bc, d_ca] {
                assert!((d - s).abs() < 1e-9, "side {d} != spacing {s}");
            }
            assert!(point_in_triangle(p, a, b, c), "p={p:?} not inside trident {a:?},{b:?},{c:?}");
        }
    }

    #[test]
    fn find_trident_matches_concrete_higher_row_examples() {
        let t = find_trident(Point2::new(1.0, 1.5), 1.0);
        assert_eq!(t.nodes(), [(1, 1), (3, 1), (2, 2)]);

        let t = find_trident(Point2::new(2.9, 4.4), 0.73);
        assert_eq!(t.nodes(), [(7, 7), (9, 7), (8, 6)]);
    }

    #[test]
    fn trident_vertices_are_distinct() {
        let s = 1.0;
        let t = find_trident(Point2::new(3.3, 2.7), s);
        let nodes = t.nodes();
        assert_ne!(nodes[0], nodes[1]);
        assert_ne!(nodes[1], nodes[2]);
        assert_ne!(nodes[0], nodes[2]);
    }

    #[test]
    fn deterministic_on_repeated_calls() {
        let s = 1.0;
        let p = Point2::new(1.0, 1.0); // exactly on a lattice node
        let a = find_trident(p, s);
        let b = find_trident(p, s);
        assert_eq!(a, b);
    }

    #[test]
    fn coord_from_ind_matches_formula() {
        let s = 2.5;
        let c = coord_from_ind((4, 3), s);
        assert!((c.x - 4.0 * s / 2.0).abs() < 1e-12);
        assert!((c.y - 3.0 * s * Y_FACT).abs() < 1e-12);
    }

    #[test]
    fn dist2node_is_euclidean() {
        let s = 1.0;
        let p = Point2::new(0.0, 0.0);
        let d = dist2node(p, (2, 0), s);
        assert!((d - s).abs() < 1e-12);
    }
}
