//! Voxel remeshing followed by Laplacian smoothing.

use std::fmt;

use layer_types::Mesh;
use tracing::debug;

use crate::error::{VolumeError, VolumeResult};
use crate::sdf::SignedDistanceField;
use crate::smooth::{smooth_laplacian, SmoothParams, SmoothResult};
use crate::surface_nets::extract_surface;

/// Cells of padding around the surface bounds.
const GRID_PADDING: usize = 2;

/// Default cap on sampled grid points (2^27, about 1 GiB of samples).
pub const DEFAULT_MAX_CELLS: usize = 1 << 27;

/// Parameters for volume regularization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegularizeParams {
    /// Voxel edge length in world units. Smaller voxels keep more detail
    /// and produce more vertices.
    pub voxel_size: f64,
    /// Laplacian passes after remeshing.
    pub smooth_iterations: u32,
    /// Diffusion factor per pass, in `(0, 1]`.
    pub smooth_lambda: f64,
    /// Diffusion factor for boundary vertices. `None` uses `smooth_lambda`.
    pub border_lambda: Option<f64>,
    /// Largest sampling grid allowed, in points.
    pub max_cells: usize,
}

impl Default for RegularizeParams {
    fn default() -> Self {
        Self {
            voxel_size: 0.0075,
            smooth_iterations: 12,
            smooth_lambda: 0.2,
            border_lambda: None,
            max_cells: DEFAULT_MAX_CELLS,
        }
    }
}

impl RegularizeParams {
    /// Parameters with the given voxel size and smoothing.
    #[must_use]
    pub fn new(voxel_size: f64, smooth_iterations: u32, smooth_lambda: f64) -> Self {
        Self {
            voxel_size,
            smooth_iterations,
            smooth_lambda,
            ..Self::default()
        }
    }

    /// Set the grid cap.
    #[must_use]
    pub fn with_max_cells(mut self, max_cells: usize) -> Self {
        self.max_cells = max_cells;
        self
    }

    /// Smoothing part of these parameters.
    #[must_use]
    pub fn smoothing(&self) -> SmoothParams {
        SmoothParams {
            iterations: self.smooth_iterations,
            lambda: self.smooth_lambda,
            border_lambda: self.border_lambda,
        }
    }

    /// Check every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::InvalidParameter`] for a non-positive or
    /// non-finite voxel size, or smoothing factors out of range.
    pub fn validate(&self) -> VolumeResult<()> {
        validate_voxel_size(self.voxel_size)?;
        self.smoothing().validate()
    }
}

pub(crate) fn validate_voxel_size(voxel_size: f64) -> VolumeResult<()> {
    if voxel_size.is_finite() && voxel_size > 0.0 {
        Ok(())
    } else {
        Err(VolumeError::invalid(
            "voxel_size",
            voxel_size,
            "must be positive and finite",
        ))
    }
}

/// Statistics from a regularization run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegularizeSummary {
    /// Input vertex count.
    pub input_vertices: usize,
    /// Input face count.
    pub input_faces: usize,
    /// Output vertex count.
    pub output_vertices: usize,
    /// Output face count.
    pub output_faces: usize,
    /// Smoothing statistics.
    pub smoothing: SmoothResult,
}

impl fmt::Display for RegularizeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Regularize: {} verts / {} faces -> {} verts / {} faces ({} smoothing passes, max move {:.3e})",
            self.input_vertices,
            self.input_faces,
            self.output_vertices,
            self.output_faces,
            self.smoothing.iterations_performed,
            self.smoothing.max_displacement,
        )
    }
}

/// Rebuilds a surface as a uniform-density approximation of its volume.
///
/// The mesh's signed distance is sampled on a voxel grid, the zero level set
/// is extracted as quads and the result is smoothed. Disconnected shells are
/// all kept. The output keeps the input transform; attributes and material
/// slots do not survive remeshing.
///
/// # Example
///
/// ```
/// use layer_volume::{RegularizeParams, VolumeRegularizer};
/// use layer_types::uv_sphere;
///
/// let sphere = uv_sphere(1.0, 24, 12);
/// let regularizer = VolumeRegularizer::new(RegularizeParams::new(0.2, 2, 0.2));
///
/// let (remeshed, summary) = regularizer.regularize(&sphere).unwrap();
/// assert!(remeshed.face_count() > 0);
/// assert_eq!(summary.output_vertices, remeshed.vertex_count());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct VolumeRegularizer {
    params: RegularizeParams,
}

impl VolumeRegularizer {
    /// Regularizer with the given parameters.
    #[must_use]
    pub fn new(params: RegularizeParams) -> Self {
        Self { params }
    }

    /// Parameters in use.
    #[must_use]
    pub fn params(&self) -> &RegularizeParams {
        &self.params
    }

    /// Remesh and smooth a copy of `mesh`.
    ///
    /// Empty or zero-area input yields an empty mesh.
    ///
    /// # Errors
    ///
    /// - [`VolumeError::InvalidParameter`] if the parameters are invalid
    /// - [`VolumeError::InvalidMesh`] if the input buffers are inconsistent
    /// - [`VolumeError::NonFiniteVertex`] for NaN or infinite coordinates
    /// - [`VolumeError::GridTooLarge`] if the grid exceeds `max_cells`
    pub fn regularize(&self, mesh: &Mesh) -> VolumeResult<(Mesh, RegularizeSummary)> {
        self.params.validate()?;

        let mut out = voxel_remesh(mesh, self.params.voxel_size, 0.0, self.params.max_cells)?;
        let smoothing = smooth_laplacian(&mut out, &self.params.smoothing())?;

        let summary = RegularizeSummary {
            input_vertices: mesh.vertex_count(),
            input_faces: mesh.face_count(),
            output_vertices: out.vertex_count(),
            output_faces: out.face_count(),
            smoothing,
        };
        debug!("{summary}");
        Ok((out, summary))
    }
}

/// Regularize with default boundary handling and grid cap.
///
/// # Errors
///
/// See [`VolumeRegularizer::regularize`].
pub fn regularize(
    mesh: &Mesh,
    voxel_size: f64,
    smooth_iterations: u32,
    smooth_lambda: f64,
) -> VolumeResult<Mesh> {
    VolumeRegularizer::new(RegularizeParams::new(voxel_size, smooth_iterations, smooth_lambda))
        .regularize(mesh)
        .map(|(mesh, _)| mesh)
}

/// Extract the `level` set of a mesh's signed distance as a new surface.
///
/// `voxel_size` and `level` are in world units; sampling happens in the
/// mesh's local frame, scaled by the transform. Negative levels lie inside.
/// Empty or zero-area input yields an empty mesh carrying the input
/// transform.
///
/// # Errors
///
/// Same as [`VolumeRegularizer::regularize`], minus smoothing.
pub fn voxel_remesh(
    mesh: &Mesh,
    voxel_size: f64,
    level: f64,
    max_cells: usize,
) -> VolumeResult<Mesh> {
    validate_voxel_size(voxel_size)?;
    mesh.validate()?;

    let empty = Mesh::new().with_transform(mesh.transform);
    let bounds = mesh.bounds();
    let diagonal = bounds.diagonal();
    let zero_area = mesh.surface_area() <= 1e-12 * diagonal * diagonal;
    if mesh.faces.is_empty() || bounds.is_empty() || zero_area {
        debug!("zero-area input, remesh is empty");
        return Ok(empty);
    }

    let scale = mesh.transform.scaling();
    let local_voxel = voxel_size / scale;
    let local_level = level / scale;
    let padding = GRID_PADDING + (local_level.max(0.0) / local_voxel).ceil() as usize;

    let sdf = SignedDistanceField::new(mesh)?;
    let grid = sdf.sample(local_voxel, padding, max_cells)?;

    let mut out = extract_surface(&grid, local_level);
    out.transform = mesh.transform;
    Ok(out)
}
