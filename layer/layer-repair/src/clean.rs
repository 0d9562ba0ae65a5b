//! Post-operator cleanup.
//!
//! Every carving and offsetting step leaves seams, slivers and inconsistent
//! winding behind. [`clean_mesh`] runs the fixed sequence
//!
//! 1. weld vertices closer than the merge distance
//! 2. collapse repeated indices inside faces
//! 3. drop degenerate faces (fewer than three distinct indices or zero area)
//! 4. drop duplicate faces (same vertex cycle in either direction)
//! 5. drop unreferenced vertices
//! 6. make winding consistent per component, then outward
//!
//! and is idempotent: cleaning a cleaned mesh with the same parameters
//! changes nothing.

use std::collections::VecDeque;

use hashbrown::{HashMap, HashSet};
use layer_types::{face_edges, flip_face, Aabb, Face, Mesh, Point3, Vector3};
use tracing::debug;

use crate::adjacency::{normalize_edge, MeshAdjacency};
use crate::error::{RepairError, RepairResult};

/// Configuration for [`clean_mesh`].
///
/// # Example
///
/// ```
/// use layer_repair::CleanParams;
///
/// let params = CleanParams::default().with_merge_distance(0.001);
/// assert!((params.merge_distance - 0.001).abs() < 1e-12);
/// ```
#[derive(Debug, Clone)]
pub struct CleanParams {
    /// Vertices closer than this are merged. `0` disables welding.
    ///
    /// Default: `0.0005`
    pub merge_distance: f64,

    /// Relative zero-area tolerance: a face is degenerate when twice its area
    /// is at most `area_tolerance * longest_edge²`.
    ///
    /// Default: `1e-12`
    pub area_tolerance: f64,

    /// Whether to repair winding.
    ///
    /// Default: `true`
    pub fix_winding: bool,
}

impl Default for CleanParams {
    fn default() -> Self {
        Self {
            merge_distance: 0.0005,
            area_tolerance: 1e-12,
            fix_winding: true,
        }
    }
}

impl CleanParams {
    /// Params with a given merge distance and default tolerances.
    #[must_use]
    pub fn new(merge_distance: f64) -> Self {
        Self::default().with_merge_distance(merge_distance)
    }

    /// Cleanup without welding, for meshes whose vertices must keep their identity.
    #[must_use]
    pub fn topology_only() -> Self {
        Self {
            merge_distance: 0.0,
            ..Self::default()
        }
    }

    /// Set the weld distance.
    #[must_use]
    pub fn with_merge_distance(mut self, distance: f64) -> Self {
        self.merge_distance = distance;
        self
    }

    /// Set the relative zero-area tolerance.
    #[must_use]
    pub fn with_area_tolerance(mut self, tolerance: f64) -> Self {
        self.area_tolerance = tolerance;
        self
    }

    /// Enable or disable winding repair.
    #[must_use]
    pub fn with_fix_winding(mut self, fix: bool) -> Self {
        self.fix_winding = fix;
        self
    }

    /// Check parameter ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::InvalidParameter`] for a negative or non-finite
    /// merge distance or area tolerance.
    pub fn validate(&self) -> RepairResult<()> {
        if !self.merge_distance.is_finite() || self.merge_distance < 0.0 {
            return Err(RepairError::InvalidParameter {
                name: "merge_distance",
                value: self.merge_distance,
                reason: "must be finite and >= 0",
            });
        }
        if !self.area_tolerance.is_finite() || self.area_tolerance < 0.0 {
            return Err(RepairError::InvalidParameter {
                name: "area_tolerance",
                value: self.area_tolerance,
                reason: "must be finite and >= 0",
            });
        }
        Ok(())
    }
}

/// Cleanup as a reusable operator.
///
/// # Example
///
/// ```
/// use layer_repair::MeshCleaner;
/// use layer_types::{box_mesh, Point3};
///
/// let mut cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// cube.flip_faces();
///
/// let (cleaned, summary) = MeshCleaner::new(0.0005).clean(&cube).unwrap();
/// assert!(cleaned.signed_volume() > 0.0);
/// assert_eq!(summary.faces_flipped, 6);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MeshCleaner {
    params: CleanParams,
}

impl MeshCleaner {
    /// Cleaner with the given merge distance.
    #[must_use]
    pub fn new(merge_distance: f64) -> Self {
        Self::with_params(CleanParams::new(merge_distance))
    }

    /// Cleaner with explicit params.
    #[must_use]
    pub fn with_params(params: CleanParams) -> Self {
        Self { params }
    }

    /// Configured params.
    #[must_use]
    pub fn params(&self) -> &CleanParams {
        &self.params
    }

    /// Return a cleaned copy of `mesh`.
    ///
    /// # Errors
    ///
    /// Invalid params or a mesh that fails [`Mesh::validate`].
    pub fn clean(&self, mesh: &Mesh) -> RepairResult<(Mesh, CleanSummary)> {
        let mut out = mesh.clone();
        let summary = clean_mesh(&mut out, &self.params)?;
        Ok((out, summary))
    }
}

/// Clean a mesh in place.
///
/// # Errors
///
/// Returns [`RepairError::InvalidParameter`] for invalid params and
/// [`RepairError::InvalidMesh`] when the input breaks its buffer invariants.
/// The mesh is untouched on error.
pub fn clean_mesh(mesh: &mut Mesh, params: &CleanParams) -> RepairResult<CleanSummary> {
    params.validate()?;
    mesh.validate()?;

    let initial_vertices = mesh.vertex_count();
    let initial_faces = mesh.face_count();

    let vertices_welded = if params.merge_distance > 0.0 {
        weld_vertices(mesh, params.merge_distance)
    } else {
        0
    };
    let degenerate_removed = remove_degenerate_faces(mesh, params.area_tolerance);
    let duplicates_removed = remove_duplicate_faces(mesh);
    let unreferenced_removed = remove_unreferenced_vertices(mesh);
    let faces_flipped = if params.fix_winding {
        fix_winding(mesh)
    } else {
        0
    };

    let summary = CleanSummary {
        initial_vertices,
        initial_faces,
        final_vertices: mesh.vertex_count(),
        final_faces: mesh.face_count(),
        vertices_welded,
        unreferenced_removed,
        degenerate_removed,
        duplicates_removed,
        faces_flipped,
    };
    debug!("{summary}");
    Ok(summary)
}

/// Merge vertices closer than `epsilon`, keeping the lowest index of each
/// cluster. Faces are remapped; no face is removed here.
///
/// Uses a spatial hash with cells of `2 * epsilon` and a 3×3×3 neighbourhood.
/// Returns the number of vertices merged away (they become unreferenced).
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() || epsilon <= 0.0 {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, p) in mesh.vertices.iter().enumerate() {
        spatial_hash
            .entry(pos_to_cell(p, cell_size))
            .or_default()
            .push(idx as u32);
    }

    let mut remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged = 0;

    for (idx, p) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if remap[idx as usize] != idx {
            continue;
        }
        let cell = pos_to_cell(p, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || remap[other as usize] != other {
                            continue;
                        }
                        if (p - mesh.vertices[other as usize]).norm() < epsilon {
                            remap[other as usize] = idx;
                            merged += 1;
                        }
                    }
                }
            }
        }
    }

    if merged == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for i in face.iter_mut() {
            *i = remap[*i as usize];
        }
    }
    merged
}

#[allow(clippy::cast_possible_truncation)]
// Truncation: coordinates / cell size fit in i64 for any sane mesh
fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

/// Collapse cyclically repeated consecutive indices, then drop faces with
/// fewer than three indices, a repeated index, or zero area.
///
/// Returns the number of faces removed.
pub fn remove_degenerate_faces(mesh: &mut Mesh, area_tolerance: f64) -> usize {
    for face in &mut mesh.faces {
        collapse_repeats(face);
    }

    let vertices = &mesh.vertices;
    let before = mesh.faces.len();
    let mut keep = Vec::with_capacity(before);
    for face in &mesh.faces {
        keep.push(!is_degenerate(face, vertices, area_tolerance));
    }
    mesh.retain_faces(|fi, _| keep[fi]);
    before - mesh.faces.len()
}

fn collapse_repeats(face: &mut Face) {
    face.dedup();
    while face.len() > 1 && face.first() == face.last() {
        face.pop();
    }
}

fn is_degenerate(face: &Face, vertices: &[Point3<f64>], area_tolerance: f64) -> bool {
    if face.len() < 3 {
        return true;
    }
    let mut seen: HashSet<u32> = HashSet::with_capacity(face.len());
    if !face.iter().all(|&i| seen.insert(i)) {
        return true;
    }

    let mut normal = Vector3::<f64>::zeros();
    let mut max_edge_sq = 0.0_f64;
    for (a, b) in face_edges(face) {
        let p = &vertices[a as usize];
        let q = &vertices[b as usize];
        normal.x += (p.y - q.y) * (p.z + q.z);
        normal.y += (p.z - q.z) * (p.x + q.x);
        normal.z += (p.x - q.x) * (p.y + q.y);
        max_edge_sq = max_edge_sq.max((q - p).norm_squared());
    }
    max_edge_sq <= 0.0 || normal.norm() <= area_tolerance * max_edge_sq
}

/// Drop faces whose vertex cycle repeats an earlier face, in either winding
/// and from any starting vertex. The first occurrence is kept.
///
/// Returns the number of faces removed.
pub fn remove_duplicate_faces(mesh: &mut Mesh) -> usize {
    let mut seen: HashSet<Vec<u32>> = HashSet::with_capacity(mesh.faces.len());
    let keep: Vec<bool> = mesh
        .faces
        .iter()
        .map(|face| {
            let fwd = canonical_cycle(face.iter().copied());
            let rev = canonical_cycle(face.iter().rev().copied());
            let key = fwd.min(rev);
            seen.insert(key)
        })
        .collect();
    mesh.retain_faces(|fi, _| keep[fi])
}

/// Rotate a cycle so the smallest index comes first.
fn canonical_cycle(cycle: impl Iterator<Item = u32>) -> Vec<u32> {
    let cycle: Vec<u32> = cycle.collect();
    let start = cycle
        .iter()
        .enumerate()
        .min_by_key(|&(_, &v)| v)
        .map_or(0, |(i, _)| i);
    cycle[start..].iter().chain(&cycle[..start]).copied().collect()
}

/// Drop vertices no face references, compacting attributes alongside.
///
/// Returns the number of vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let mut referenced = vec![false; mesh.vertices.len()];
    for face in &mesh.faces {
        for &i in face {
            referenced[i as usize] = true;
        }
    }
    mesh.compact_vertices(&referenced)
}

/// Make winding consistent per component and outward.
///
/// Each component is traversed breadth-first from its lowest face index,
/// visiting neighbours in ascending face order and propagating orientation
/// only across manifold edges. A face is compared with the face it was
/// reached from on their lowest shared manifold edge. A component whose
/// signed volume about its own centroid is clearly negative is then flipped
/// as a whole.
///
/// Returns the number of faces whose winding changed.
pub fn fix_winding(mesh: &mut Mesh) -> usize {
    if mesh.faces.is_empty() {
        return 0;
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    let neighbors = adjacency.face_neighbors(&mesh.faces, true);
    let mut flipped = vec![false; mesh.faces.len()];
    let mut visited = vec![false; mesh.faces.len()];
    let mut queue = VecDeque::new();

    for seed in 0..mesh.faces.len() {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);
        let mut component = vec![seed];

        while let Some(current) = queue.pop_front() {
            for &next in &neighbors[current] {
                if visited[next] {
                    continue;
                }
                visited[next] = true;
                if !consistent(&adjacency, &mesh.faces[current], &mesh.faces[next]) {
                    flip_face(&mut mesh.faces[next]);
                    flipped[next] = !flipped[next];
                }
                component.push(next);
                queue.push_back(next);
            }
        }

        let (volume, scale) = component_volume(mesh, &component);
        // Near-flat components carry no sign and keep their winding.
        if volume < -1e-9 * scale {
            for &fi in &component {
                flip_face(&mut mesh.faces[fi]);
                flipped[fi] = !flipped[fi];
            }
        }
    }

    flipped.iter().filter(|&&f| f).count()
}

/// Two faces are consistent when they traverse their lowest shared manifold
/// edge in opposite directions.
fn consistent(adjacency: &MeshAdjacency, a: &Face, b: &Face) -> bool {
    let shared = face_edges(a)
        .filter(|&(u, v)| {
            adjacency.faces_for_edge(u, v).is_some_and(|f| f.len() == 2)
                && face_edges(b).any(|(x, y)| (x, y) == (u, v) || (x, y) == (v, u))
        })
        .min_by_key(|&(u, v)| normalize_edge(u, v));
    match shared {
        Some(edge) => face_edges(b).all(|other| other != edge),
        None => true,
    }
}

/// Signed volume of a face set about its centroid, plus the cube of its
/// bounding-box diagonal as a scale reference.
fn component_volume(mesh: &Mesh, faces: &[usize]) -> (f64, f64) {
    if faces.is_empty() {
        return (0.0, 0.0);
    }
    let mut sum = Vector3::zeros();
    let mut count = 0.0;
    let mut bounds = Aabb::empty();
    for &fi in faces {
        for &i in &mesh.faces[fi] {
            let p = &mesh.vertices[i as usize];
            sum += p.coords;
            count += 1.0;
            bounds.expand_to_include(p);
        }
    }
    let center = Point3::from(sum / count);

    let mut volume = 0.0;
    for &fi in faces {
        let face = &mesh.faces[fi];
        let p0 = mesh.vertices[face[0] as usize] - center;
        for k in 1..face.len().saturating_sub(1) {
            let p1 = mesh.vertices[face[k] as usize] - center;
            let p2 = mesh.vertices[face[k + 1] as usize] - center;
            volume += p0.dot(&p1.cross(&p2));
        }
    }
    (volume / 6.0, bounds.diagonal().powi(3))
}

/// Result of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanSummary {
    /// Number of vertices before cleanup.
    pub initial_vertices: usize,
    /// Number of faces before cleanup.
    pub initial_faces: usize,
    /// Number of vertices after cleanup.
    pub final_vertices: usize,
    /// Number of faces after cleanup.
    pub final_faces: usize,
    /// Number of vertices merged by welding.
    pub vertices_welded: usize,
    /// Number of unreferenced vertices removed (includes welded ones).
    pub unreferenced_removed: usize,
    /// Number of degenerate faces removed.
    pub degenerate_removed: usize,
    /// Number of duplicate faces removed.
    pub duplicates_removed: usize,
    /// Number of faces whose winding was reversed.
    pub faces_flipped: usize,
}

impl CleanSummary {
    /// Check if cleanup changed anything.
    #[must_use]
    pub fn had_changes(&self) -> bool {
        self.vertices_welded > 0
            || self.unreferenced_removed > 0
            || self.degenerate_removed > 0
            || self.duplicates_removed > 0
            || self.faces_flipped > 0
    }
}

impl std::fmt::Display for CleanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Clean: {} verts ({} welded, {} unreferenced), {} faces ({} degenerate, {} duplicate, {} flipped)",
            self.final_vertices,
            self.vertices_welded,
            self.unreferenced_removed,
            self.final_faces,
            self.degenerate_removed,
            self.duplicates_removed,
            self.faces_flipped
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use layer_types::{box_mesh, uv_sphere};

    fn face(indices: &[u32]) -> Face {
        Face::from_slice(indices)
    }

    fn unit_cube() -> Mesh {
        box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn weld_merges_near_duplicates() {
        let mut mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0001, 0.0, 0.0),
            ],
            vec![face(&[0, 1, 2]), face(&[0, 3, 2])],
        );
        let summary = clean_mesh(&mut mesh, &CleanParams::new(0.001)).unwrap();
        assert_eq!(summary.vertices_welded, 1);
        assert_eq!(summary.duplicates_removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn zero_merge_distance_keeps_coincident_vertices() {
        let mut mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
            ],
            vec![face(&[0, 1, 2]), face(&[0, 3, 2])],
        );
        let summary = clean_mesh(&mut mesh, &CleanParams::topology_only()).unwrap();
        assert_eq!(summary.vertices_welded, 0);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn collapse_repeats_keeps_valid_polygon() {
        let mut f = face(&[3, 3, 4, 5, 5, 3]);
        collapse_repeats(&mut f);
        assert_eq!(f.as_slice(), &[3, 4, 5]);
    }

    #[test]
    fn degenerate_faces_removed() {
        let mut mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![
                face(&[0, 1, 2]),    // collinear
                face(&[0, 1, 1, 3]), // collapses to a valid triangle
                face(&[0, 1, 0, 3]), // non-consecutive repeat
            ],
        );
        mesh.face_materials = vec![1, 2, 3];
        let removed = remove_degenerate_faces(&mut mesh, 1e-12);
        assert_eq!(removed, 2);
        assert_eq!(mesh.faces[0].as_slice(), &[0, 1, 3]);
        assert_eq!(mesh.face_materials, vec![2]);
    }

    #[test]
    fn duplicate_detection_ignores_rotation_and_winding() {
        let mut mesh = unit_cube();
        let mut dup = mesh.faces[0].clone();
        dup.rotate_left(1);
        mesh.faces.push(dup);
        let mut rev = mesh.faces[1].clone();
        rev.reverse();
        mesh.faces.push(rev);

        assert_eq!(remove_duplicate_faces(&mut mesh), 2);
        assert_eq!(mesh.face_count(), 6);
    }

    #[test]
    fn winding_made_consistent_and_outward() {
        let mut mesh = uv_sphere(1.0, 16, 8);
        for fi in (0..mesh.face_count()).step_by(3) {
            mesh.faces[fi].reverse();
        }
        let flipped = fix_winding(&mut mesh);
        assert!(flipped > 0);
        assert!(mesh.signed_volume() > 0.0);

        let adjacency = MeshAdjacency::build(&mesh.faces);
        let neighbors = adjacency.face_neighbors(&mesh.faces, true);
        for (fi, ns) in neighbors.iter().enumerate() {
            for &n in ns {
                assert!(consistent(&adjacency, &mesh.faces[fi], &mesh.faces[n]));
            }
        }
    }

    #[test]
    fn each_component_oriented_independently() {
        let mut a = unit_cube();
        let mut b = box_mesh(Point3::new(3.0, 0.0, 0.0), Point3::new(4.0, 1.0, 1.0));
        b.flip_faces();
        a.append(&b);

        fix_winding(&mut a);
        assert_relative_eq!(a.signed_volume(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn non_planar_quad_settles_after_one_pass() {
        let mut mesh = Mesh::from_parts(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, -0.25),
                Point3::new(0.0, 0.25, 0.0),
                Point3::new(0.25, 0.0, 0.0),
            ],
            vec![face(&[2, 3, 0, 1])],
        );
        let params = CleanParams::new(0.1);

        clean_mesh(&mut mesh, &params).unwrap();
        let once = mesh.clone();
        for _ in 0..2 {
            let summary = clean_mesh(&mut mesh, &params).unwrap();
            assert_eq!(summary.faces_flipped, 0, "{summary}");
            assert_eq!(mesh, once);
        }
    }

    #[test]
    fn flipping_negates_fan_volume() {
        let mut mesh = uv_sphere(1.0, 8, 4);
        let before = component_volume(&mesh, &(0..mesh.face_count()).collect::<Vec<_>>()).0;
        mesh.flip_faces();
        let after = component_volume(&mesh, &(0..mesh.face_count()).collect::<Vec<_>>()).0;
        assert_relative_eq!(before, -after, epsilon = 1e-12);
    }

    #[test]
    fn clean_is_idempotent_on_fixture() {
        let mut mesh = uv_sphere(1.0, 12, 6);
        mesh.faces[3].reverse();
        mesh.vertices.push(Point3::new(5.0, 5.0, 5.0));
        let params = CleanParams::new(0.01);

        clean_mesh(&mut mesh, &params).unwrap();
        let once = mesh.clone();
        let summary = clean_mesh(&mut mesh, &params).unwrap();
        assert!(!summary.had_changes(), "{summary}");
        assert_eq!(mesh, once);
    }

    #[test]
    fn invalid_input_rejected_untouched() {
        let mut mesh = unit_cube();
        mesh.faces.push(face(&[0, 1, 42]));
        let before = mesh.clone();
        assert!(matches!(
            clean_mesh(&mut mesh, &CleanParams::default()),
            Err(RepairError::InvalidMesh(_))
        ));
        assert_eq!(mesh, before);

        assert!(matches!(
            clean_mesh(&mut mesh, &CleanParams::new(-1.0)),
            Err(RepairError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn summary_display() {
        let summary = CleanSummary {
            final_vertices: 10,
            vertices_welded: 2,
            unreferenced_removed: 3,
            final_faces: 8,
            degenerate_removed: 1,
            duplicates_removed: 0,
            faces_flipped: 4,
            ..CleanSummary::default()
        };
        assert_eq!(
            summary.to_string(),
            "Clean: 10 verts (2 welded, 3 unreferenced), 8 faces (1 degenerate, 0 duplicate, 4 flipped)"
        );
    }
}
