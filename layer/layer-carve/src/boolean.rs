//! Solid difference `candidate - reference`.
//!
//! # Algorithm
//!
//! 1. Express the reference in the candidate's frame
//! 2. Find crossing triangle pairs through the reference BVH
//! 3. Without crossings, decide containment by ray-cast vote
//! 4. Split every crossing polygon of both meshes by the planes of the
//!    triangles it crosses
//! 5. Classify each fragment by its centroid
//! 6. Keep candidate fragments outside the reference and reference
//!    fragments inside the candidate (inverted), then weld the seam

use std::fmt;

use layer_repair::{
    remove_degenerate_faces, remove_unreferenced_vertices, weld_vertices, CleanParams,
    MeshAdjacency,
};
use layer_spatial::FaceIndex;
use layer_types::{flip_face, Face, Mesh, Point3, Vector3};
use rayon::prelude::*;
use tracing::debug;

use crate::carver::{CarveOutcome, LayerCarver};
use crate::config::BooleanConfig;
use crate::error::{CarveError, CarveResult};
use crate::intersect::triangles_intersect;
use crate::split::{split_polygons, Fragment, Plane, SplitMesh};
use crate::warning::QualityWarning;

const STAGE: &str = "boolean";

/// Statistics about a boolean difference.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanStats {
    /// Crossing triangle pairs found.
    pub intersecting_pairs: usize,
    /// Polygons cut into more than one fragment, both operands.
    pub faces_split: usize,
    /// Vertices created by cutting.
    pub new_vertices: usize,
    /// Faces kept from the candidate.
    pub faces_from_candidate: usize,
    /// Inverted faces kept from the reference.
    pub faces_from_reference: usize,
    /// Seam vertices merged by welding.
    pub vertices_welded: usize,
}

impl fmt::Display for BooleanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Boolean: {} crossing pairs, {} faces split, {} new vertices, kept {} + {} faces",
            self.intersecting_pairs,
            self.faces_split,
            self.new_vertices,
            self.faces_from_candidate,
            self.faces_from_reference
        )?;
        if self.vertices_welded > 0 {
            write!(f, ", welded {}", self.vertices_welded)?;
        }
        Ok(())
    }
}

/// Output of [`BooleanCarver::difference`].
#[derive(Debug, Clone)]
pub struct BooleanOutput {
    /// Result mesh in the candidate's frame.
    pub mesh: Mesh,
    /// Operation statistics.
    pub stats: BooleanStats,
    /// Quality issues with the operands or the result.
    pub warnings: Vec<QualityWarning>,
}

/// Carves by exact solid difference against the dressed surface.
///
/// # Example
///
/// ```
/// use layer_carve::BooleanCarver;
/// use layer_types::{box_mesh, Point3};
///
/// let a = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 2.0));
/// let b = box_mesh(Point3::new(1.0, 1.0, 1.0), Point3::new(3.0, 3.0, 3.0));
///
/// let out = BooleanCarver::default().difference(&a, &b).unwrap();
/// assert!((out.mesh.signed_volume() - 7.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BooleanCarver {
    config: BooleanConfig,
}

impl BooleanCarver {
    /// Carver with the given configuration.
    #[must_use]
    pub fn new(config: BooleanConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &BooleanConfig {
        &self.config
    }

    /// Compute `candidate - reference`.
    ///
    /// An empty candidate gives an empty result and an empty reference
    /// leaves the candidate unchanged. When the surfaces never cross, the
    /// result is empty if the candidate lies inside the reference and the
    /// unchanged candidate otherwise.
    ///
    /// # Errors
    ///
    /// - [`CarveError::Solver`] if either operand has a non-finite coordinate
    /// - [`CarveError::InvalidMesh`] if either operand breaks its buffer invariants
    /// - [`CarveError::InvalidParameter`] for a bad tolerance
    pub fn difference(&self, candidate: &Mesh, reference: &Mesh) -> CarveResult<BooleanOutput> {
        self.config.validate()?;
        ensure_finite(candidate, "candidate")?;
        ensure_finite(reference, "reference")?;
        candidate.validate()?;
        reference.validate()?;

        let mut warnings = Vec::new();
        if candidate.faces.is_empty() {
            return Ok(BooleanOutput {
                mesh: Mesh::new().with_transform(candidate.transform),
                stats: BooleanStats::default(),
                warnings,
            });
        }
        if reference.faces.is_empty() {
            return Ok(BooleanOutput {
                mesh: candidate.clone(),
                stats: BooleanStats::default(),
                warnings,
            });
        }

        for (label, mesh) in [("candidate", candidate), ("reference", reference)] {
            let open = MeshAdjacency::build(&mesh.faces).boundary_edge_count();
            if open > 0 {
                warnings.push(QualityWarning::new(
                    STAGE,
                    format!("{label} is not closed ({open} boundary edges), inside/outside is approximate"),
                ));
            }
        }

        let reference = reference.expressed_in(&candidate.transform);
        let index_a = FaceIndex::new(candidate);
        let index_b = FaceIndex::new(&reference);
        let (bounds_a, bounds_b) = (index_a.bounds(), index_b.bounds());
        let mut combined = bounds_a;
        combined.merge(&bounds_b);
        let scale = combined.diagonal().max(f64::MIN_POSITIVE);
        let edge_tolerance = self.config.edge_tolerance * scale;

        let mut stats = BooleanStats::default();
        if !bounds_a.intersects(&bounds_b, edge_tolerance) {
            debug!("boolean operands are disjoint");
            stats.faces_from_candidate = candidate.face_count();
            return Ok(finish(candidate, candidate.clone(), stats, warnings));
        }

        let pairs = self.intersecting_pairs(&index_a, &index_b, edge_tolerance);
        stats.intersecting_pairs = pairs.len();
        if pairs.is_empty() {
            let inside = candidate_inside(candidate, &index_b);
            debug!(inside, "boolean operands never cross");
            if inside {
                return Ok(finish(
                    candidate,
                    Mesh::new().with_transform(candidate.transform),
                    stats,
                    warnings,
                ));
            }
            stats.faces_from_candidate = candidate.face_count();
            return Ok(finish(candidate, candidate.clone(), stats, warnings));
        }

        let mut cutters_a = vec![Vec::new(); candidate.faces.len()];
        let mut cutters_b = vec![Vec::new(); reference.faces.len()];
        for &(ta, tb) in &pairs {
            cutters_a[index_a.triangle_face(ta as usize)].push(tb);
            cutters_b[index_b.triangle_face(tb as usize)].push(ta);
        }
        for list in cutters_a.iter_mut().chain(cutters_b.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        let plane_tolerance = self.config.plane_tolerance * scale;
        let split_a = split_polygons(
            &candidate.vertices,
            &candidate.faces,
            &cutters_a,
            &supporting_planes(&index_b),
            plane_tolerance,
        );
        let split_b = split_polygons(
            &reference.vertices,
            &reference.faces,
            &cutters_b,
            &supporting_planes(&index_a),
            plane_tolerance,
        );
        stats.faces_split = split_a.faces_split + split_b.faces_split;
        stats.new_vertices = split_a.new_vertices + split_b.new_vertices;

        let keep_a = self.classify(&split_a, &index_b, false);
        let keep_b = self.classify(&split_b, &index_a, true);

        let mut result = assemble(&split_a, &keep_a, &candidate.face_materials, false);
        result.transform = candidate.transform;
        let from_reference = assemble(&split_b, &keep_b, &reference.face_materials, true);
        stats.faces_from_candidate = result.face_count();
        stats.faces_from_reference = from_reference.face_count();
        result.append(&from_reference);

        stats.vertices_welded = weld_vertices(&mut result, self.config.weld_tolerance * scale);
        remove_degenerate_faces(&mut result, CleanParams::default().area_tolerance);
        remove_unreferenced_vertices(&mut result);

        Ok(finish(candidate, result, stats, warnings))
    }

    /// Crossing `(candidate triangle, reference triangle)` pairs.
    fn intersecting_pairs(&self, a: &FaceIndex, b: &FaceIndex, tolerance: f64) -> Vec<(u32, u32)> {
        let crossing = |ta: usize| -> Vec<(u32, u32)> {
            let tri = a.triangle(ta);
            b.query(&tri.bounds(), tolerance)
                .into_iter()
                .filter(|&tb| triangles_intersect(&tri, &b.triangle(tb as usize), tolerance))
                .map(|tb| (ta as u32, tb))
                .collect()
        };
        let count = a.triangles().len();
        if self.config.parallel {
            (0..count).into_par_iter().flat_map_iter(crossing).collect()
        } else {
            (0..count).flat_map(crossing).collect()
        }
    }

    /// Whether each fragment should be kept: inside `other` when
    /// `keep_inside`, outside otherwise.
    fn classify(&self, split: &SplitMesh, other: &FaceIndex, keep_inside: bool) -> Vec<bool> {
        let keep = |fragment: &Fragment| {
            other.contains(&centroid(&split.vertices, &fragment.face)) == keep_inside
        };
        if self.config.parallel {
            split.fragments.par_iter().map(keep).collect()
        } else {
            split.fragments.iter().map(keep).collect()
        }
    }
}

impl LayerCarver for BooleanCarver {
    fn name(&self) -> &'static str {
        STAGE
    }

    fn carve(&self, body_candidate: &Mesh, reference: &Mesh) -> CarveResult<CarveOutcome> {
        let out = self.difference(body_candidate, reference)?;
        Ok(CarveOutcome {
            mesh: out.mesh,
            warnings: out.warnings,
        })
    }
}

/// `candidate - reference` with the default configuration.
///
/// # Errors
///
/// See [`BooleanCarver::difference`].
pub fn difference(candidate: &Mesh, reference: &Mesh) -> CarveResult<Mesh> {
    BooleanCarver::default()
        .difference(candidate, reference)
        .map(|out| out.mesh)
}

fn finish(
    candidate: &Mesh,
    mesh: Mesh,
    stats: BooleanStats,
    mut warnings: Vec<QualityWarning>,
) -> BooleanOutput {
    if mesh.faces.is_empty() && !candidate.faces.is_empty() {
        warnings.push(QualityWarning::new(
            STAGE,
            format!(
                "non-empty candidate ({} faces) produced an empty result",
                candidate.face_count()
            ),
        ));
    }
    debug!("{stats}");
    BooleanOutput {
        mesh,
        stats,
        warnings,
    }
}

fn ensure_finite(mesh: &Mesh, label: &str) -> CarveResult<()> {
    match mesh
        .vertices
        .iter()
        .position(|v| !v.coords.iter().all(|c| c.is_finite()))
    {
        Some(index) => Err(CarveError::Solver {
            details: format!("{label} vertex {index} has a non-finite coordinate"),
        }),
        None => Ok(()),
    }
}

/// Majority vote over three sample faces spread through the candidate.
fn candidate_inside(candidate: &Mesh, reference: &FaceIndex) -> bool {
    let n = candidate.faces.len();
    let votes = [0, n / 2, n - 1]
        .iter()
        .filter(|&&f| reference.contains(&candidate.face_centroid(f)))
        .count();
    votes >= 2
}

fn supporting_planes(index: &FaceIndex) -> Vec<Option<Plane>> {
    (0..index.triangles().len())
        .map(|t| Plane::from_triangle(&index.triangle(t)))
        .collect()
}

fn centroid(vertices: &[Point3<f64>], face: &Face) -> Point3<f64> {
    let sum: Vector3<f64> = face.iter().map(|&i| vertices[i as usize].coords).sum();
    Point3::from(sum / face.len().max(1) as f64)
}

/// Kept fragments as a mesh over the split vertex buffer.
fn assemble(split: &SplitMesh, keep: &[bool], materials: &[u32], invert: bool) -> Mesh {
    let mut mesh = Mesh::from_parts(split.vertices.clone(), Vec::new());
    for (fragment, &kept) in split.fragments.iter().zip(keep) {
        if !kept {
            continue;
        }
        let mut face = fragment.face.clone();
        if invert {
            flip_face(&mut face);
        }
        mesh.faces.push(face);
        if let Some(&slot) = materials.get(fragment.source) {
            mesh.face_materials.push(slot);
        }
    }
    mesh
}
