//! Core mesh data types.

use crate::{MorphError, MorphResult};
use nalgebra::{Matrix4, Point3, Vector3};

/// Length units a mesh is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum Units {
    /// Millimeters (the default for scanned and FE liner geometry).
    #[default]
    Millimeter,
    /// Meters.
    Meter,
}

impl Units {
    /// Factor that converts a length in `self` to a length in `to`.
    pub fn factor_to(self, to: Units) -> f64 {
        match (self, to) {
            (Units::Millimeter, Units::Meter) => 0.001,
            (Units::Meter, Units::Millimeter) => 1000.0,
            _ => 1.0,
        }
    }

    /// Short name used in diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Units::Millimeter => "mm",
            Units::Meter => "m",
        }
    }
}

/// A vertex in the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,

    /// Node identifier from a finite-element file (1-based), if the mesh came
    /// from one.
    pub node_id: Option<u32>,
}

impl Vertex {
    /// Create a new vertex with only position set.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            node_id: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Create a vertex carrying a finite-element node id.
    #[inline]
    pub fn with_node_id(position: Point3<f64>, node_id: u32) -> Self {
        Self {
            position,
            node_id: Some(node_id),
        }
    }
}

/// A triangle mesh with a fixed identity (name and units) and indexed
/// vertices and faces.
///
/// The vertex and face arrays are owned by the mesh. Morphing never edits a
/// mesh in place: it produces a new one with the same connectivity via
/// [`Mesh::with_vertex_positions`]. Changing units is the only in-place edit.
#[derive(Debug, Clone)]
pub struct Mesh {
    name: String,
    units: Units,

    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new(name: impl Into<String>, units: Units) -> Self {
        Self {
            name: name.into(),
            units,
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Create a mesh from raw positions and faces.
    pub fn from_positions(
        name: impl Into<String>,
        units: Units,
        positions: &[Point3<f64>],
        faces: Vec<[u32; 3]>,
    ) -> Self {
        Self {
            name: name.into(),
            units,
            vertices: positions.iter().copied().map(Vertex::new).collect(),
            faces,
        }
    }

    /// Mesh name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Units the coordinates are expressed in.
    pub fn units(&self) -> Units {
        self.units
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Vertex positions in index order.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh is empty.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let (mut min, mut max) = (first, first);

        for vertex in &self.vertices[1..] {
            let p = &vertex.position;
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            min.z = min.z.min(p.z);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
            max.z = max.z.max(p.z);
        }

        Some((min, max))
    }

    /// Convert the mesh to `units`, rescaling every coordinate.
    ///
    /// Converting to the units the mesh already uses is a no-op.
    pub fn set_units(&mut self, units: Units) {
        let factor = self.units.factor_to(units);
        if factor != 1.0 {
            for vertex in &mut self.vertices {
                vertex.position.coords *= factor;
            }
        }
        self.units = units;
    }

    /// Build a new mesh with the same name, units, node ids and faces but new
    /// vertex positions.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `positions` has a different length than the
    /// vertex array.
    pub fn with_vertex_positions(&self, positions: &[Point3<f64>]) -> MorphResult<Mesh> {
        if positions.len() != self.vertices.len() {
            return Err(MorphError::invalid_argument(format!(
                "expected {} positions for mesh '{}', got {}",
                self.vertices.len(),
                self.name,
                positions.len()
            )));
        }

        let vertices = self
            .vertices
            .iter()
            .zip(positions)
            .map(|(v, &position)| Vertex {
                position,
                node_id: v.node_id,
            })
            .collect();

        Ok(Mesh {
            name: self.name.clone(),
            units: self.units,
            vertices,
            faces: self.faces.clone(),
        })
    }

    /// Copy the mesh under a new name.
    pub fn renamed(&self, name: impl Into<String>) -> Mesh {
        Mesh {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Apply a 4x4 homogeneous transform, returning a new mesh.
    pub fn transformed(&self, matrix: &Matrix4<f64>) -> Mesh {
        let vertices = self
            .vertices
            .iter()
            .map(|v| Vertex {
                position: matrix.transform_point(&v.position),
                node_id: v.node_id,
            })
            .collect();

        Mesh {
            name: self.name.clone(),
            units: self.units,
            vertices,
            faces: self.faces.clone(),
        }
    }

    /// Check that every face references an existing vertex.
    ///
    /// # Errors
    ///
    /// Returns `InvalidVertexIndex` for the first out-of-range reference.
    pub fn validate_faces(&self) -> MorphResult<()> {
        let count = self.vertices.len();
        for (face_index, face) in self.faces.iter().enumerate() {
            for &v in face {
                if v as usize >= count {
                    return Err(MorphError::invalid_vertex_index(
                        format!("face {}", face_index),
                        v,
                        count,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Find the index of the vertex at exactly `point`.
    pub fn find_vertex_index(&self, point: &Point3<f64>) -> Option<u32> {
        self.vertices
            .iter()
            .position(|v| v.position == *point)
            .map(|i| i as u32)
    }

    /// Find the index of the vertex closest to `point`.
    ///
    /// Ties go to the lowest index. Returns `None` for a mesh without vertices.
    pub fn nearest_vertex_index(&self, point: &Point3<f64>) -> Option<u32> {
        let mut best: Option<(usize, f64)> = None;
        for (i, v) in self.vertices.iter().enumerate() {
            let d = (v.position - point).norm_squared();
            if best.is_none_or(|(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i as u32)
    }

    /// Find the vertex carrying finite-element node id `node_id`.
    pub fn index_of_node_id(&self, node_id: u32) -> Option<u32> {
        self.vertices
            .iter()
            .position(|v| v.node_id == Some(node_id))
            .map(|i| i as u32)
    }

    /// Euler characteristic V - E + F over the vertices referenced by faces.
    ///
    /// A connected, orientable surface with one boundary loop and genus zero
    /// has characteristic 1; a closed sphere-like surface has 2.
    pub fn euler_characteristic(&self) -> i64 {
        let adjacency = crate::MeshAdjacency::build(&self.faces);
        adjacency.vertex_count() as i64 - adjacency.edge_count() as i64
            + self.faces.len() as i64
    }

    /// Centroid of all vertex positions, or None if the mesh has no vertices.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.vertices.is_empty() {
            return None;
        }
        let sum: Vector3<f64> = self.vertices.iter().map(|v| v.position.coords).sum();
        Some(Point3::from(sum / self.vertices.len() as f64))
    }
}
