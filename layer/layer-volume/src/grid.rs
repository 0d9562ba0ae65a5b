//! 3D scalar grid for storing sampled distance values.

use layer_types::{Aabb, Point3};
use rayon::prelude::*;

use crate::error::{VolumeError, VolumeResult};

/// A 3D grid of scalar samples at lattice points.
///
/// Values are stored with x varying fastest, then y, then z.
#[derive(Debug, Clone)]
pub struct ScalarGrid {
    values: Vec<f64>,
    dimensions: (usize, usize, usize),
    origin: Point3<f64>,
    cell_size: f64,
}

impl ScalarGrid {
    /// Create a grid with every sample set to zero.
    ///
    /// # Example
    ///
    /// ```
    /// use layer_volume::ScalarGrid;
    /// use layer_types::Point3;
    ///
    /// let grid = ScalarGrid::new((10, 10, 10), Point3::new(-5.0, -5.0, -5.0), 1.0);
    /// assert_eq!(grid.dimensions(), (10, 10, 10));
    /// assert_eq!(grid.len(), 1000);
    /// ```
    #[must_use]
    pub fn new(dimensions: (usize, usize, usize), origin: Point3<f64>, cell_size: f64) -> Self {
        let (nx, ny, nz) = dimensions;
        Self {
            values: vec![0.0; nx * ny * nz],
            dimensions,
            origin,
            cell_size,
        }
    }

    /// Size a grid to cover `bounds` plus `padding` cells on every side.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeError::GridTooLarge`] when the point count would
    /// exceed `max_cells`, before anything is allocated.
    pub fn from_bounds(
        bounds: &Aabb,
        cell_size: f64,
        padding: usize,
        max_cells: usize,
    ) -> VolumeResult<Self> {
        let extent = bounds.size();
        let pad = padding as f64 * cell_size;
        let origin = Point3::new(
            bounds.min.x - pad,
            bounds.min.y - pad,
            bounds.min.z - pad,
        );

        let axis = |len: f64| ((len + 2.0 * pad) / cell_size).ceil() + 1.0;
        let (fx, fy, fz) = (axis(extent.x), axis(extent.y), axis(extent.z));
        let too_large = fx * fy * fz > max_cells as f64;
        if too_large || !(fx.is_finite() && fy.is_finite() && fz.is_finite()) {
            return Err(VolumeError::GridTooLarge {
                nx: fx.min(usize::MAX as f64) as usize,
                ny: fy.min(usize::MAX as f64) as usize,
                nz: fz.min(usize::MAX as f64) as usize,
                max_cells,
            });
        }

        Ok(Self::new(
            (fx as usize, fy as usize, fz as usize),
            origin,
            cell_size,
        ))
    }

    /// Grid dimensions in points.
    #[must_use]
    pub fn dimensions(&self) -> (usize, usize, usize) {
        self.dimensions
    }

    /// Position of point `(0, 0, 0)`.
    #[must_use]
    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Spacing between neighbouring points.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Sample at grid coordinates.
    ///
    /// Returns `f64::INFINITY` (outside) for out-of-range coordinates.
    #[must_use]
    pub fn get(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        if self.in_range(ix, iy, iz) {
            self.values[self.index(ix, iy, iz)]
        } else {
            f64::INFINITY
        }
    }

    /// Set the sample at grid coordinates. Out-of-range writes are ignored.
    pub fn set(&mut self, ix: usize, iy: usize, iz: usize, value: f64) {
        if self.in_range(ix, iy, iz) {
            let idx = self.index(ix, iy, iz);
            self.values[idx] = value;
        }
    }

    /// Position of a grid point.
    #[must_use]
    pub fn position(&self, ix: usize, iy: usize, iz: usize) -> Point3<f64> {
        Point3::new(
            self.origin.x + ix as f64 * self.cell_size,
            self.origin.y + iy as f64 * self.cell_size,
            self.origin.z + iz as f64 * self.cell_size,
        )
    }

    /// Cell containing a position, `None` outside the grid.
    #[must_use]
    pub fn grid_coords(&self, point: &Point3<f64>) -> Option<(usize, usize, usize)> {
        let offset = (point - self.origin) / self.cell_size;
        if offset.iter().any(|c| !c.is_finite() || *c < 0.0) {
            return None;
        }
        let (ix, iy, iz) = (
            offset.x.floor() as usize,
            offset.y.floor() as usize,
            offset.z.floor() as usize,
        );
        self.in_range(ix, iy, iz).then_some((ix, iy, iz))
    }

    /// Evaluate `f` at every grid point in parallel.
    pub fn fill<F>(&mut self, f: F)
    where
        F: Fn(Point3<f64>) -> f64 + Sync,
    {
        let (nx, ny, _) = self.dimensions;
        let origin = self.origin;
        let cell = self.cell_size;
        self.values.par_iter_mut().enumerate().for_each(|(i, v)| {
            let ix = i % nx;
            let iy = (i / nx) % ny;
            let iz = i / (nx * ny);
            let p = Point3::new(
                origin.x + ix as f64 * cell,
                origin.y + iy as f64 * cell,
                origin.z + iz as f64 * cell,
            );
            *v = f(p);
        });
    }

    /// Raw samples, x fastest.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Total number of grid points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the grid has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Linear index of grid coordinates.
    #[must_use]
    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        let (nx, ny, _) = self.dimensions;
        ix + iy * nx + iz * nx * ny
    }

    fn in_range(&self, ix: usize, iy: usize, iz: usize) -> bool {
        ix < self.dimensions.0 && iy < self.dimensions.1 && iz < self.dimensions.2
    }
}
