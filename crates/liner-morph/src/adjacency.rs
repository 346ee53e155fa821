//! Edge and vertex adjacency for triangle meshes.
//!
//! Free edges (edges with exactly one adjacent face) are what the boundary
//! extraction chains into the rim loop.

use hashbrown::{HashMap, HashSet};

/// Adjacency information for a mesh.
///
/// Provides lookups for:
/// - Faces adjacent to an edge
/// - Faces adjacent to a vertex
/// - Free edges (edges with only one adjacent face)
/// - Non-manifold edges (edges with more than two adjacent faces)
#[derive(Debug, Clone)]
pub struct MeshAdjacency {
    /// Maps edge (v0, v1) to list of face indices. v0 < v1.
    edge_to_faces: HashMap<(u32, u32), Vec<usize>>,
    /// Maps vertex index to list of face indices.
    vertex_to_faces: HashMap<u32, Vec<usize>>,
    /// Directed copy of every edge as it appears in its first face.
    directed: HashMap<(u32, u32), (u32, u32)>,
}

impl MeshAdjacency {
    /// Build adjacency information from a list of faces.
    ///
    /// # Example
    ///
    /// ```
    /// use liner_morph::MeshAdjacency;
    ///
    /// let faces = vec![[0, 1, 2], [1, 3, 2]];
    /// let adj = MeshAdjacency::build(&faces);
    ///
    /// assert_eq!(adj.free_edge_count(), 4);
    /// ```
    #[must_use]
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<usize>> = HashMap::new();
        let mut vertex_to_faces: HashMap<u32, Vec<usize>> = HashMap::new();
        let mut directed = HashMap::new();

        for (face_idx, face) in faces.iter().enumerate() {
            for &v in face {
                vertex_to_faces.entry(v).or_default().push(face_idx);
            }

            for (a, b) in [(face[0], face[1]), (face[1], face[2]), (face[2], face[0])] {
                let key = normalize_edge(a, b);
                edge_to_faces.entry(key).or_default().push(face_idx);
                directed.entry(key).or_insert((a, b));
            }
        }

        Self {
            edge_to_faces,
            vertex_to_faces,
            directed,
        }
    }

    /// Get faces adjacent to an edge.
    ///
    /// Returns `None` if the edge doesn't exist in the mesh.
    #[must_use]
    pub fn faces_for_edge(&self, v0: u32, v1: u32) -> Option<&[usize]> {
        self.edge_to_faces
            .get(&normalize_edge(v0, v1))
            .map(Vec::as_slice)
    }

    /// Get faces adjacent to a vertex.
    #[must_use]
    pub fn faces_for_vertex(&self, v: u32) -> &[usize] {
        self.vertex_to_faces.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Free edges in their owning face's direction, sorted by normalized key.
    ///
    /// The sort makes every downstream ordering independent of hash order.
    #[must_use]
    pub fn free_edges(&self) -> Vec<(u32, u32)> {
        let mut keys: Vec<(u32, u32)> = self
            .edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
            .collect();
        keys.sort_unstable();
        keys.into_iter()
            .map(|key| self.directed.get(&key).copied().unwrap_or(key))
            .collect()
    }

    /// Count the number of free edges.
    #[must_use]
    pub fn free_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() == 1)
            .count()
    }

    /// Distinct vertices that lie on a free edge.
    #[must_use]
    pub fn free_edge_vertices(&self) -> HashSet<u32> {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .flat_map(|(&(a, b), _)| [a, b])
            .collect()
    }

    /// Non-manifold edges (more than two adjacent faces) with their face
    /// counts, sorted.
    #[must_use]
    pub fn non_manifold_edges(&self) -> Vec<((u32, u32), usize)> {
        let mut edges: Vec<_> = self
            .edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() > 2)
            .map(|(&edge, faces)| (edge, faces.len()))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Check if the mesh is manifold (all edges have at most 2 adjacent faces).
    #[must_use]
    pub fn is_manifold(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() <= 2)
    }

    /// Check if the mesh is watertight (no free edges).
    #[must_use]
    pub fn is_watertight(&self) -> bool {
        self.edge_to_faces.values().all(|faces| faces.len() >= 2)
    }

    /// Get the total number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edge_to_faces.len()
    }

    /// Get the number of vertices referenced by at least one face.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertex_to_faces.len()
    }
}

/// Normalize edge direction so v0 < v1.
#[inline]
pub(crate) fn normalize_edge(v0: u32, v1: u32) -> (u32, u32) {
    if v0 < v1 { (v0, v1) } else { (v1, v0) }
}
