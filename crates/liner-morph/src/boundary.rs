//! Boundary (rim) loop extraction.
//!
//! A liner or cut anatomical surface is open along exactly one rim. This
//! module finds the free edges of such a surface, chains them into a single
//! cycle, and classifies the resulting node sequence:
//!
//! - **Free edges**: edges belonging to exactly one face
//! - **Ordered nodes**: a cyclic walk of the rim, each consecutive pair
//!   sharing a free edge
//! - **Boundary faces**: faces touching at least one rim node
//! - **Corner nodes**: rim nodes whose angle is at or below a threshold
//!
//! The result is an immutable [`BoundaryState`]. It is recomputed from the
//! mesh on every call; nothing is cached on the mesh.
//!
//! # Example
//!
//! ```
//! use liner_morph::{Mesh, Units, Vertex, extract_boundary};
//!
//! // A unit square made of two triangles has a single 4-node rim.
//! let mut mesh = Mesh::new("square", Units::Millimeter);
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(1.0, 1.0, 0.0));
//! mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
//! mesh.faces.push([0, 1, 2]);
//! mesh.faces.push([0, 2, 3]);
//!
//! let boundary = extract_boundary(&mesh).unwrap();
//! assert_eq!(boundary.nodes().len(), 4);
//! assert_eq!(boundary.corner_count(), 4); // every 90 degree turn is a corner
//! ```

use crate::adjacency::MeshAdjacency;
use crate::tracing_ext::{OperationTimer, log_boundary_stats};
use crate::{Mesh, MorphError, MorphResult};
use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use tracing::debug;

/// Default corner angle threshold in degrees.
pub const DEFAULT_CORNER_THRESHOLD_DEG: f64 = 140.0;

/// Parameters for boundary extraction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryOptions {
    /// Rim nodes whose angle (in degrees) is at or below this value are
    /// marked as corners.
    pub corner_threshold_deg: f64,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            corner_threshold_deg: DEFAULT_CORNER_THRESHOLD_DEG,
        }
    }
}

impl BoundaryOptions {
    /// Set the corner angle threshold in degrees.
    pub fn with_corner_threshold(mut self, degrees: f64) -> Self {
        self.corner_threshold_deg = degrees;
        self
    }
}

/// Evenly spaced rim coordinates attached to a [`BoundaryState`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledBoundary {
    coords: Vec<Point3<f64>>,
}

impl ResampledBoundary {
    /// Wrap resampled coordinates.
    pub fn new(coords: Vec<Point3<f64>>) -> Self {
        Self { coords }
    }

    /// The resampled coordinates.
    pub fn coords(&self) -> &[Point3<f64>] {
        &self.coords
    }

    /// Number of resampled points.
    pub fn count(&self) -> usize {
        self.coords.len()
    }
}

/// The single open boundary of a mesh, ordered and classified.
#[derive(Debug, Clone)]
pub struct BoundaryState {
    free_edges: Vec<(u32, u32)>,
    nodes: Vec<u32>,
    edges: Vec<(u32, u32)>,
    coords: Vec<Point3<f64>>,
    boundary_faces: Vec<usize>,
    corner_nodes: Vec<u32>,
    corner_threshold_deg: f64,
    resampled: Option<ResampledBoundary>,
}

impl BoundaryState {
    /// Free edges in the order they were discovered (sorted by vertex pair).
    pub fn free_edges(&self) -> &[(u32, u32)] {
        &self.free_edges
    }

    /// Rim vertex indices as a cyclic walk.
    pub fn nodes(&self) -> &[u32] {
        &self.nodes
    }

    /// Free edges reordered so that `edges()[i] == (nodes[i], nodes[i + 1])`
    /// cyclically.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Positions of [`nodes`](Self::nodes), in the same order.
    pub fn coords(&self) -> &[Point3<f64>] {
        &self.coords
    }

    /// Sorted indices of faces that touch at least one rim node.
    pub fn boundary_faces(&self) -> &[usize] {
        &self.boundary_faces
    }

    /// Rim nodes classified as corners, in walk order.
    pub fn corner_nodes(&self) -> &[u32] {
        &self.corner_nodes
    }

    /// Number of corner nodes.
    pub fn corner_count(&self) -> usize {
        self.corner_nodes.len()
    }

    /// Whether `node` was classified as a corner.
    pub fn is_corner(&self, node: u32) -> bool {
        self.corner_nodes.contains(&node)
    }

    /// Threshold (degrees) the corners were classified with.
    pub fn corner_threshold_deg(&self) -> f64 {
        self.corner_threshold_deg
    }

    /// Resampled coordinates, if attached.
    pub fn resampled(&self) -> Option<&ResampledBoundary> {
        self.resampled.as_ref()
    }

    /// Attach resampled coordinates, returning the updated state.
    pub fn with_resampled(mut self, resampled: ResampledBoundary) -> Self {
        self.resampled = Some(resampled);
        self
    }

    /// Total length of the closed rim polyline.
    pub fn perimeter(&self) -> f64 {
        closed_length(&self.coords)
    }

    /// Mean position of the rim nodes.
    pub fn centroid(&self) -> Point3<f64> {
        centroid(&self.coords)
    }
}

/// Extract the boundary with the default 140 degree corner threshold.
///
/// # Errors
///
/// See [`extract_boundary_with`].
pub fn extract_boundary(mesh: &Mesh) -> MorphResult<BoundaryState> {
    extract_boundary_with(mesh, &BoundaryOptions::default())
}

/// Extract, order and classify the single boundary loop of `mesh`.
///
/// # Errors
///
/// - `InvalidArgument` if the mesh has no faces or the threshold is outside
///   `[0, 180]`
/// - `InvalidVertexIndex` if a face references a missing vertex
/// - `Topology` if the mesh is closed, its Euler characteristic is not 1, or
///   its free edges do not form one simple cycle
/// - `NonManifoldEdge` if an edge is shared by more than two faces
/// - `Numerical` if a rim edge has zero length
pub fn extract_boundary_with(
    mesh: &Mesh,
    options: &BoundaryOptions,
) -> MorphResult<BoundaryState> {
    let _timer =
        OperationTimer::with_context("extract_boundary", mesh.face_count(), mesh.vertex_count());

    let threshold = options.corner_threshold_deg;
    if !(0.0..=180.0).contains(&threshold) {
        return Err(MorphError::invalid_argument(format!(
            "corner threshold must be within [0, 180] degrees, got {}",
            threshold
        )));
    }
    if mesh.faces.is_empty() {
        return Err(MorphError::invalid_argument(format!(
            "mesh '{}' has no faces",
            mesh.name()
        )));
    }
    mesh.validate_faces()?;

    let adjacency = MeshAdjacency::build(&mesh.faces);

    if adjacency.is_watertight() {
        return Err(MorphError::boundary_count(
            0,
            "mesh is closed and has no boundary loop",
        ));
    }

    let euler = adjacency.vertex_count() as i64 - adjacency.edge_count() as i64
        + mesh.faces.len() as i64;
    let free_edges = adjacency.free_edges();
    debug!(
        target: "liner_morph::boundary",
        euler,
        free_edges = free_edges.len(),
        "Checked boundary topology"
    );

    if euler != 1 {
        let loops = count_loops(&free_edges);
        return Err(MorphError::boundary_count(
            loops as i64,
            format!(
                "expected exactly one boundary loop, found {} (Euler characteristic {})",
                loops, euler
            ),
        ));
    }

    if let Some(&((a, b), count)) = adjacency.non_manifold_edges().first() {
        return Err(MorphError::NonManifoldEdge {
            vertex_a: a,
            vertex_b: b,
            face_count: count,
        });
    }

    let edges = chain_edges(&free_edges)?;
    let nodes: Vec<u32> = edges.iter().map(|&(a, _)| a).collect();

    let endpoint_set = adjacency.free_edge_vertices();
    let node_set: HashSet<u32> = nodes.iter().copied().collect();
    if node_set.len() != nodes.len() || node_set != endpoint_set {
        return Err(MorphError::boundary_order(format!(
            "ordered rim has {} nodes ({} distinct) but free edges touch {} vertices",
            nodes.len(),
            node_set.len(),
            endpoint_set.len()
        )));
    }

    let coords: Vec<Point3<f64>> = nodes
        .iter()
        .map(|&n| mesh.vertices[n as usize].position)
        .collect();

    let mut boundary_faces: Vec<usize> = nodes
        .iter()
        .flat_map(|&n| adjacency.faces_for_vertex(n).iter().copied())
        .collect::<HashSet<usize>>()
        .into_iter()
        .collect();
    boundary_faces.sort_unstable();

    let corner_nodes = detect_corners(&nodes, &coords, threshold)?;

    let state = BoundaryState {
        free_edges,
        nodes,
        edges,
        coords,
        boundary_faces,
        corner_nodes,
        corner_threshold_deg: threshold,
        resampled: None,
    };
    log_boundary_stats(&state, mesh.name());

    Ok(state)
}

/// Chain free edges into one closed cycle, flipping edges where needed.
fn chain_edges(free_edges: &[(u32, u32)]) -> MorphResult<Vec<(u32, u32)>> {
    let mut incident: HashMap<u32, Vec<usize>> = HashMap::new();
    for (i, &(a, b)) in free_edges.iter().enumerate() {
        incident.entry(a).or_default().push(i);
        incident.entry(b).or_default().push(i);
    }

    if let Some((&v, list)) = incident.iter().find(|(_, list)| list.len() != 2) {
        return Err(MorphError::boundary_order(format!(
            "rim vertex {} touches {} free edges, expected 2",
            v,
            list.len()
        )));
    }

    let Some(&first) = free_edges.first() else {
        return Err(MorphError::boundary_order("mesh has no free edges"));
    };

    let mut used = vec![false; free_edges.len()];
    let mut ordered = Vec::with_capacity(free_edges.len());
    used[0] = true;
    ordered.push(first);
    let start = first.0;
    let mut end = first.1;

    while ordered.len() < free_edges.len() {
        if end == start {
            return Err(MorphError::boundary_order(format!(
                "rim closed after {} of {} free edges; free edges form more than one loop",
                ordered.len(),
                free_edges.len()
            )));
        }

        let next = incident
            .get(&end)
            .and_then(|list| list.iter().copied().find(|&i| !used[i]));
        let Some(i) = next else {
            return Err(MorphError::boundary_order(format!(
                "rim walk dead-ends at vertex {}",
                end
            )));
        };

        used[i] = true;
        let (a, b) = free_edges[i];
        let edge = if a == end { (a, b) } else { (b, a) };
        ordered.push(edge);
        end = edge.1;
    }

    if end != start {
        return Err(MorphError::boundary_order(format!(
            "rim walk ends at vertex {} instead of returning to {}",
            end, start
        )));
    }

    Ok(ordered)
}

/// Mark nodes whose angle between (prev -> cur) and (next -> cur) is at most
/// `threshold_deg`.
fn detect_corners(
    nodes: &[u32],
    coords: &[Point3<f64>],
    threshold_deg: f64,
) -> MorphResult<Vec<u32>> {
    let k = coords.len();
    let mut corners = Vec::new();

    for i in 0..k {
        let prev = coords[(i + k - 1) % k];
        let cur = coords[i];
        let next = coords[(i + 1) % k];

        let angle = angle_between(cur - prev, cur - next).ok_or_else(|| {
            MorphError::numerical(format!("zero-length rim edge at vertex {}", nodes[i]))
        })?;

        if angle.to_degrees() <= threshold_deg {
            corners.push(nodes[i]);
        }
    }

    Ok(corners)
}

/// Angle in radians between two vectors, or None if either has zero length.
fn angle_between(u: Vector3<f64>, v: Vector3<f64>) -> Option<f64> {
    let denom = u.norm() * v.norm();
    if denom <= f64::EPSILON || !denom.is_finite() {
        return None;
    }
    Some((u.dot(&v) / denom).clamp(-1.0, 1.0).acos())
}

/// Number of connected components of the free-edge graph.
fn count_loops(free_edges: &[(u32, u32)]) -> usize {
    let mut neighbors: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in free_edges {
        neighbors.entry(a).or_default().push(b);
        neighbors.entry(b).or_default().push(a);
    }

    let mut seen: HashSet<u32> = HashSet::new();
    let mut loops = 0;
    for &start in neighbors.keys() {
        if !seen.insert(start) {
            continue;
        }
        loops += 1;
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            for &w in &neighbors[&v] {
                if seen.insert(w) {
                    stack.push(w);
                }
            }
        }
    }
    loops
}

/// Length of a polyline closed back to its first point.
pub(crate) fn closed_length(coords: &[Point3<f64>]) -> f64 {
    if coords.len() < 2 {
        return 0.0;
    }
    let open: f64 = coords.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    open + (coords[0] - coords[coords.len() - 1]).norm()
}

pub(crate) fn centroid(coords: &[Point3<f64>]) -> Point3<f64> {
    if coords.is_empty() {
        return Point3::origin();
    }
    let sum: Vector3<f64> = coords.iter().map(|p| p.coords).sum();
    Point3::from(sum / coords.len() as f64)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Units, Vertex};

    /// Unit square in the XY plane, two triangles.
    pub(crate) fn unit_square() -> Mesh {
        let mut mesh = Mesh::new("square", Units::Millimeter);
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh.faces.push([0, 2, 3]);
        mesh
    }

    /// Axis-aligned cube (10 units) as 8 vertices and up to 12 triangles.
    fn cube_faces() -> (Vec<Vertex>, Vec<[u32; 3]>) {
        let vertices = vec![
            Vertex::from_coords(0.0, 0.0, 0.0),
            Vertex::from_coords(10.0, 0.0, 0.0),
            Vertex::from_coords(10.0, 10.0, 0.0),
            Vertex::from_coords(0.0, 10.0, 0.0),
            Vertex::from_coords(0.0, 0.0, 10.0),
            Vertex::from_coords(10.0, 0.0, 10.0),
            Vertex::from_coords(10.0, 10.0, 10.0),
            Vertex::from_coords(0.0, 10.0, 10.0),
        ];
        let faces = vec![
            [0, 2, 1], // Bottom
            [0, 3, 2],
            [4, 5, 6], // Top
            [4, 6, 7],
            [0, 1, 5], // Front
            [0, 5, 4],
            [2, 3, 7], // Back
            [2, 7, 6],
            [0, 4, 7], // Left
            [0, 7, 3],
            [1, 2, 6], // Right
            [1, 6, 5],
        ];
        (vertices, faces)
    }

    fn closed_cube() -> Mesh {
        let (vertices, faces) = cube_faces();
        let mut mesh = Mesh::new("cube", Units::Millimeter);
        mesh.vertices = vertices;
        mesh.faces = faces;
        mesh
    }

    /// Cube with the top removed: one square rim at z = 10.
    pub(crate) fn open_box() -> Mesh {
        let mut mesh = closed_cube();
        mesh.faces.drain(2..4);
        mesh
    }

    /// Cube with top and bottom removed: two separate rims.
    fn open_tube() -> Mesh {
        let mut mesh = closed_cube();
        mesh.faces.drain(0..4);
        mesh
    }

    fn assert_consecutive_share_free_edge(boundary: &BoundaryState) {
        let free: HashSet<(u32, u32)> = boundary
            .free_edges()
            .iter()
            .map(|&(a, b)| crate::adjacency::normalize_edge(a, b))
            .collect();
        let nodes = boundary.nodes();
        for i in 0..nodes.len() {
            let a = nodes[i];
            let b = nodes[(i + 1) % nodes.len()];
            assert!(
                free.contains(&crate::adjacency::normalize_edge(a, b)),
                "nodes {} and {} do not share a free edge",
                a,
                b
            );
            assert_eq!(boundary.edges()[i], (a, b));
        }
    }

    #[test]
    fn test_unit_square_boundary() {
        let boundary = extract_boundary(&unit_square()).unwrap();

        assert_eq!(boundary.free_edges().len(), 4);
        let mut sorted = boundary.nodes().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        assert_consecutive_share_free_edge(&boundary);

        assert!((boundary.perimeter() - 4.0).abs() < 1e-12);
        assert_eq!(boundary.boundary_faces(), &[0, 1]);
        assert_eq!(boundary.corner_count(), 4);
        assert!(boundary.resampled().is_none());
    }

    #[test]
    fn test_open_box_boundary() {
        let mesh = open_box();
        assert_eq!(mesh.euler_characteristic(), 1);

        let boundary = extract_boundary(&mesh).unwrap();
        let mut sorted = boundary.nodes().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![4, 5, 6, 7]);
        assert_consecutive_share_free_edge(&boundary);
        assert!((boundary.perimeter() - 40.0).abs() < 1e-9);

        // Every side face touches the top rim
        assert_eq!(boundary.boundary_faces().len(), 8);
        assert!(!boundary.boundary_faces().contains(&0));
    }

    #[test]
    fn test_closed_mesh_rejected() {
        let err = extract_boundary(&closed_cube()).unwrap_err();
        assert!(matches!(
            err,
            MorphError::Topology {
                hole_count: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn test_two_holes_rejected() {
        let mesh = open_tube();
        assert_eq!(mesh.euler_characteristic(), 0);

        let err = extract_boundary(&mesh).unwrap_err();
        assert!(matches!(
            err,
            MorphError::Topology {
                hole_count: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_non_manifold_rejected() {
        let mut mesh = Mesh::new("fan", Units::Millimeter);
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, -1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.5, 0.0, 1.0));
        mesh.faces = vec![[0, 1, 2], [0, 1, 3], [0, 1, 4]];

        assert_eq!(mesh.euler_characteristic(), 1);
        let err = extract_boundary(&mesh).unwrap_err();
        assert!(matches!(
            err,
            MorphError::NonManifoldEdge {
                vertex_a: 0,
                vertex_b: 1,
                face_count: 3
            }
        ));
    }

    #[test]
    fn test_corner_threshold() {
        let square = unit_square();

        let options = |deg: f64| BoundaryOptions::default().with_corner_threshold(deg);

        // Right angles are corners at any threshold above 90
        let b = extract_boundary_with(&square, &options(91.0)).unwrap();
        assert_eq!(b.corner_count(), 4);
        assert_eq!(b.corner_threshold_deg(), 91.0);

        let b = extract_boundary_with(&square, &options(89.0)).unwrap();
        assert_eq!(b.corner_count(), 0);

        let err = extract_boundary_with(&square, &options(200.0)).unwrap_err();
        assert!(matches!(err, MorphError::InvalidArgument { .. }));
    }

    #[test]
    fn test_collinear_rim_nodes_are_not_corners() {
        // Strip of two squares: vertex 1 and 4 sit mid-edge on the rim.
        let mut mesh = Mesh::new("strip", Units::Millimeter);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (1.0, 1.0), (0.0, 1.0)] {
            mesh.vertices.push(Vertex::from_coords(x, y, 0.0));
        }
        mesh.faces = vec![[0, 1, 4], [0, 4, 5], [1, 2, 3], [1, 3, 4]];

        let boundary = extract_boundary(&mesh).unwrap();
        assert_eq!(boundary.nodes().len(), 6);
        assert!(!boundary.is_corner(1));
        assert!(!boundary.is_corner(4));
        assert!(boundary.is_corner(0));
        assert_eq!(boundary.corner_count(), 4);
    }

    #[test]
    fn test_zero_length_rim_edge() {
        let mut mesh = unit_square();
        // Collapse vertex 1 onto vertex 0
        mesh.vertices[1].position = mesh.vertices[0].position;

        let err = extract_boundary(&mesh).unwrap_err();
        assert!(matches!(err, MorphError::Numerical { .. }));
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let mesh = Mesh::new("empty", Units::Millimeter);
        assert!(matches!(
            extract_boundary(&mesh),
            Err(MorphError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_bowtie_rejected() {
        // Two triangles sharing only vertex 0: Euler 5 - 6 + 2 = 1 but the
        // rim pinches at vertex 0.
        let mut mesh = Mesh::new("bowtie", Units::Millimeter);
        for (x, y) in [(0.0, 0.0), (1.0, 1.0), (-1.0, 1.0), (1.0, -1.0), (-1.0, -1.0)] {
            mesh.vertices.push(Vertex::from_coords(x, y, 0.0));
        }
        mesh.faces = vec![[0, 1, 2], [0, 4, 3]];

        let err = extract_boundary(&mesh).unwrap_err();
        assert!(matches!(
            err,
            MorphError::Topology {
                hole_count: None,
                ..
            }
        ));
    }

    #[test]
    fn test_with_resampled() {
        let boundary = extract_boundary(&unit_square()).unwrap();
        let resampled = ResampledBoundary::new(boundary.coords().to_vec());
        let boundary = boundary.with_resampled(resampled);
        assert_eq!(boundary.resampled().map(ResampledBoundary::count), Some(4));
    }
}
