//! Splitting polygons along cutter planes.
//!
//! A polygon that crosses the other operand is cut by the supporting plane
//! of every triangle it intersects. Each resulting fragment is convex and
//! lies on one side of all of those planes, so no piece of the other surface
//! passes through its interior: one centroid test classifies it.
//!
//! Cut points created on a source edge are also inserted into every other
//! polygon using that edge, so fragments stay edge-connected across polygon
//! borders.

use hashbrown::HashMap;
use layer_types::{face_edges, Face, Point3, Triangle, Vector3};
use smallvec::SmallVec;

/// Edge parameters this close to an end point are treated as the end point.
const PARAM_EPS: f64 = 1e-9;

/// Oriented plane `normal . p = offset` with a unit normal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Plane {
    normal: Vector3<f64>,
    offset: f64,
}

impl Plane {
    /// Supporting plane of a triangle, `None` if it is degenerate.
    pub(crate) fn from_triangle(tri: &Triangle) -> Option<Self> {
        let normal = tri.normal()?;
        Some(Self {
            normal,
            offset: normal.dot(&tri.v0.coords),
        })
    }

    fn distance(&self, p: &Point3<f64>) -> f64 {
        self.normal.dot(&p.coords) - self.offset
    }
}

/// A piece of a source polygon.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Fragment {
    /// Index of the polygon it was cut from.
    pub source: usize,
    /// Vertex cycle, same winding as the source.
    pub face: Face,
}

/// Polygons after splitting, over one shared vertex buffer that starts with
/// the source vertices.
#[derive(Debug, Default)]
pub(crate) struct SplitMesh {
    pub vertices: Vec<Point3<f64>>,
    pub fragments: Vec<Fragment>,
    pub faces_split: usize,
    pub new_vertices: usize,
}

/// Where a vertex sits relative to the source polygons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Source,
    /// Created on source edge `(a, b)` with `a < b`.
    OnEdge(u32, u32),
    /// Created on a cut line inside a polygon.
    Interior,
}

struct Splitter {
    vertices: Vec<Point3<f64>>,
    source_count: usize,
    origins: Vec<Origin>,
    cut_cache: HashMap<(u32, u32, u32), u32>,
    edge_points: HashMap<(u32, u32), SmallVec<[u32; 4]>>,
}

/// Cut every polygon by the planes listed for it.
///
/// `cutters[f]` lists indices into `planes` for polygon `f`; polygons past
/// the end of `cutters` are kept whole. Vertices within `tolerance` of a
/// plane count as on it and go to both halves.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn split_polygons(
    vertices: &[Point3<f64>],
    faces: &[Face],
    cutters: &[Vec<u32>],
    planes: &[Option<Plane>],
    tolerance: f64,
) -> SplitMesh {
    let mut splitter = Splitter {
        vertices: vertices.to_vec(),
        source_count: vertices.len(),
        origins: Vec::new(),
        cut_cache: HashMap::new(),
        edge_points: HashMap::new(),
    };

    let mut fragments = Vec::with_capacity(faces.len());
    let mut faces_split = 0;
    for (fi, face) in faces.iter().enumerate() {
        let mut pieces = vec![face.clone()];
        for &c in cutters.get(fi).map_or(&[][..], Vec::as_slice) {
            let Some(plane) = planes.get(c as usize).copied().flatten() else {
                continue;
            };
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for piece in pieces {
                match splitter.split(&piece, c, &plane, tolerance) {
                    Some((front, back)) => {
                        next.push(front);
                        next.push(back);
                    }
                    None => next.push(piece),
                }
            }
            pieces = next;
        }
        if pieces.len() > 1 {
            faces_split += 1;
        }
        fragments.extend(pieces.into_iter().map(|face| Fragment { source: fi, face }));
    }

    for fragment in &mut fragments {
        fragment.face = splitter.conform(&fragment.face);
    }

    SplitMesh {
        new_vertices: splitter.vertices.len() - vertices.len(),
        vertices: splitter.vertices,
        fragments,
        faces_split,
    }
}

impl Splitter {
    fn origin(&self, v: u32) -> Origin {
        (v as usize)
            .checked_sub(self.source_count)
            .map_or(Origin::Source, |k| self.origins[k])
    }

    /// Source edge that the segment `(u, v)` lies on, if any.
    fn edge_root(&self, u: u32, v: u32) -> Option<(u32, u32)> {
        match (self.origin(u), self.origin(v)) {
            (Origin::Source, Origin::Source) => Some((u.min(v), u.max(v))),
            (Origin::Source, Origin::OnEdge(a, b)) => (u == a || u == b).then_some((a, b)),
            (Origin::OnEdge(a, b), Origin::Source) => (v == a || v == b).then_some((a, b)),
            (Origin::OnEdge(a, b), Origin::OnEdge(c, d)) => (a == c && b == d).then_some((a, b)),
            _ => None,
        }
    }

    /// Split a convex polygon in two, `None` unless it has vertices strictly
    /// on both sides of the plane.
    fn split(
        &mut self,
        polygon: &Face,
        plane_id: u32,
        plane: &Plane,
        tolerance: f64,
    ) -> Option<(Face, Face)> {
        let distances: SmallVec<[f64; 8]> = polygon
            .iter()
            .map(|&i| plane.distance(&self.vertices[i as usize]))
            .collect();
        let sides: SmallVec<[i8; 8]> = distances
            .iter()
            .map(|&d| {
                if d > tolerance {
                    1
                } else if d < -tolerance {
                    -1
                } else {
                    0
                }
            })
            .collect();
        if !(sides.contains(&1) && sides.contains(&-1)) {
            return None;
        }

        let n = polygon.len();
        let mut front = Face::new();
        let mut back = Face::new();
        for k in 0..n {
            let next = (k + 1) % n;
            let i = polygon[k];
            match sides[k] {
                1 => front.push(i),
                -1 => back.push(i),
                _ => {
                    front.push(i);
                    back.push(i);
                }
            }
            if sides[k] * sides[next] < 0 {
                let x = self.cut_edge(i, polygon[next], distances[k], distances[next], plane_id);
                front.push(x);
                back.push(x);
            }
        }
        Some((front, back))
    }

    /// Vertex where the plane crosses edge `(i, j)`, shared by every polygon
    /// that cuts the same edge with the same plane.
    #[allow(clippy::cast_possible_truncation)]
    fn cut_edge(&mut self, i: u32, j: u32, di: f64, dj: f64, plane_id: u32) -> u32 {
        let (a, b, da, db) = if i < j { (i, j, di, dj) } else { (j, i, dj, di) };
        if let Some(&x) = self.cut_cache.get(&(a, b, plane_id)) {
            return x;
        }

        let t = da / (da - db);
        let (pa, pb) = (self.vertices[a as usize], self.vertices[b as usize]);
        let x = self.vertices.len() as u32;
        self.vertices.push(pa + (pb - pa) * t);

        let origin = match self.edge_root(a, b) {
            Some(root) => {
                self.edge_points.entry(root).or_default().push(x);
                Origin::OnEdge(root.0, root.1)
            }
            None => Origin::Interior,
        };
        self.origins.push(origin);
        self.cut_cache.insert((a, b, plane_id), x);
        x
    }

    /// Re-insert cut points made by neighbouring polygons on shared edges.
    fn conform(&self, face: &Face) -> Face {
        let mut out = Face::with_capacity(face.len());
        for (u, v) in face_edges(face) {
            out.push(u);
            self.push_between(u, v, &mut out);
        }
        out
    }

    fn push_between(&self, u: u32, v: u32, out: &mut Face) {
        let Some(points) = self
            .edge_root(u, v)
            .and_then(|root| self.edge_points.get(&root))
        else {
            return;
        };
        let pu = self.vertices[u as usize];
        let dir = self.vertices[v as usize] - pu;
        let len_sq = dir.norm_squared();
        if len_sq <= 0.0 {
            return;
        }

        let mut between: SmallVec<[(f64, u32); 4]> = points
            .iter()
            .filter(|&&x| x != u && x != v)
            .map(|&x| ((self.vertices[x as usize] - pu).dot(&dir) / len_sq, x))
            .filter(|&(t, _)| t > PARAM_EPS && t < 1.0 - PARAM_EPS)
            .collect();
        between.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));
        out.extend(between.into_iter().map(|(_, x)| x));
    }
}
