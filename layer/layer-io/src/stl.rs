//! STL (Stereolithography) file format support.
//!
//! Both ASCII and binary STL are read. STL stores an unindexed triangle
//! soup; the loader merges corners with bit-identical coordinates so the
//! result has shared vertices and usable topology.
//!
//! # Binary Format
//!
//! ```text
//! UINT8[80]    - Header (ignored)
//! UINT32       - Number of triangles
//! foreach triangle
//!     REAL32[3] - Normal vector (ignored, recomputed from winding)
//!     REAL32[3] - Vertex 1
//!     REAL32[3] - Vertex 2
//!     REAL32[3] - Vertex 3
//!     UINT16    - Attribute byte count
//! end
//! ```
//!
//! # ASCII Format
//!
//! ```text
//! solid name
//!   facet normal ni nj nk
//!     outer loop
//!       vertex v1x v1y v1z
//!       vertex v2x v2y v2z
//!       vertex v3x v3y v3z
//!     endloop
//!   endfacet
//!   ...
//! endsolid name
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use hashbrown::HashMap;
use layer_types::{Face, Mesh, Point3, Vector3};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle in binary STL (normal + 3 vertices + attribute).
const TRIANGLE_SIZE: usize = 50;

/// Load a mesh from an STL file.
///
/// Automatically detects ASCII vs binary format. The mesh gets an identity
/// transform.
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist ([`IoError::FileNotFound`])
/// - The file cannot be read
/// - The file content is not valid STL
///
/// # Example
///
/// ```no_run
/// use layer_io::load_stl;
///
/// let mesh = load_stl("character.stl").unwrap();
/// println!("Loaded {} faces", mesh.face_count());
/// ```
pub fn load_stl<P: AsRef<Path>>(path: P) -> IoResult<Mesh> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::opening(path, e))?;
    let mut reader = BufReader::new(file);

    // Read enough to determine format
    let mut header = [0u8; HEADER_SIZE + 4];
    let bytes_read = read_up_to(&mut reader, &mut header)?;
    if bytes_read < 6 {
        return Err(IoError::invalid_content("file too small to be valid STL"));
    }

    let header_str = String::from_utf8_lossy(&header[..bytes_read.min(HEADER_SIZE)]);
    let mesh = if header_str.trim_start().starts_with("solid")
        && !has_binary_header(&header[..bytes_read])
    {
        // ASCII format - re-read from start
        drop(reader);
        let file = File::open(path)?;
        read_stl_ascii(BufReader::new(file))?
    } else {
        read_stl_binary(&header[..bytes_read], reader)?
    };

    debug!(
        path = %path.display(),
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "loaded STL"
    );
    Ok(mesh)
}

/// Fill `buf` as far as the reader allows, returning the byte count.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> IoResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Binary files that happen to start with "solid" usually carry NUL bytes
/// in the rest of the header.
fn has_binary_header(header: &[u8]) -> bool {
    header.len() >= HEADER_SIZE + 4 && header[..HEADER_SIZE].contains(&0)
}

/// Collects triangle corners and merges bit-identical positions.
#[derive(Default)]
struct SoupBuilder {
    vertices: Vec<Point3<f64>>,
    faces: Vec<Face>,
    lookup: HashMap<[u64; 3], u32>,
}

impl SoupBuilder {
    fn vertex(&mut self, p: Point3<f64>) -> u32 {
        // +0.0 folds -0.0 onto 0.0 so both hash alike
        let key = [
            (p.x + 0.0).to_bits(),
            (p.y + 0.0).to_bits(),
            (p.z + 0.0).to_bits(),
        ];
        *self.lookup.entry(key).or_insert_with(|| {
            self.vertices.push(p);
            (self.vertices.len() - 1) as u32
        })
    }

    fn triangle(&mut self, corners: [Point3<f64>; 3]) {
        let idx = corners.map(|p| self.vertex(p));
        self.faces.push(Face::from_slice(&idx));
    }

    fn finish(self) -> Mesh {
        Mesh::from_parts(self.vertices, self.faces)
    }
}

/// Read a binary STL given the already-read header.
fn read_stl_binary<R: Read>(header: &[u8], mut reader: R) -> IoResult<Mesh> {
    if header.len() < HEADER_SIZE + 4 {
        return Err(IoError::InvalidHeader {
            expected: HEADER_SIZE + 4,
            got: header.len(),
        });
    }

    let face_count = u32::from_le_bytes([
        header[HEADER_SIZE],
        header[HEADER_SIZE + 1],
        header[HEADER_SIZE + 2],
        header[HEADER_SIZE + 3],
    ]);

    let mut soup = SoupBuilder::default();
    let mut triangle_buf = [0u8; TRIANGLE_SIZE];
    for i in 0..face_count {
        if read_up_to(&mut reader, &mut triangle_buf)? < TRIANGLE_SIZE {
            return Err(IoError::InvalidFaceCount {
                expected: face_count,
                got: i,
            });
        }
        // Skip the stored normal (12 bytes)
        soup.triangle([
            read_point(&triangle_buf[12..24]),
            read_point(&triangle_buf[24..36]),
            read_point(&triangle_buf[36..48]),
        ]);
    }

    Ok(soup.finish())
}

/// Read a point from 12 bytes (3 little-endian f32s).
fn read_point(buf: &[u8]) -> Point3<f64> {
    let x = f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    let y = f32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let z = f32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]);
    Point3::new(f64::from(x), f64::from(y), f64::from(z))
}

/// Read an ASCII STL.
fn read_stl_ascii<R: BufRead>(reader: R) -> IoResult<Mesh> {
    let mut soup = SoupBuilder::default();
    let mut in_facet = false;
    let mut in_loop = false;
    let mut corners: Vec<Point3<f64>> = Vec::with_capacity(3);

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword.to_ascii_lowercase().as_str() {
            "facet" => {
                in_facet = true;
                corners.clear();
            }
            "outer" => {
                in_loop = parts.next().is_some_and(|w| w.eq_ignore_ascii_case("loop"));
            }
            "vertex" if in_loop => {
                let mut coord = || -> IoResult<f64> {
                    let token = parts
                        .next()
                        .ok_or_else(|| IoError::parse(number + 1, "vertex needs 3 coordinates"))?;
                    token
                        .parse()
                        .map_err(|_| IoError::parse(number + 1, format!("bad coordinate '{token}'")))
                };
                let p = Point3::new(coord()?, coord()?, coord()?);
                corners.push(p);
            }
            "endloop" => in_loop = false,
            "endfacet" => {
                if in_facet && corners.len() == 3 {
                    soup.triangle([corners[0], corners[1], corners[2]]);
                }
                in_facet = false;
            }
            "endsolid" => break,
            _ => {}
        }
    }

    Ok(soup.finish())
}

/// Save a mesh as binary STL.
///
/// Polygons are fan-triangulated and written in world space.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_stl<P: AsRef<Path>>(mesh: &Mesh, path: P) -> IoResult<()> {
    let file = File::create(path)?;
    write_stl_binary(mesh, BufWriter::new(file))
}

fn write_stl_binary<W: Write>(mesh: &Mesh, mut writer: W) -> IoResult<()> {
    let mut header = [b' '; HEADER_SIZE];
    let text = b"Binary STL generated by layer-io";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;

    let world = mesh.world_positions();
    let triangles: Vec<[u32; 3]> = mesh.triangles().collect();
    writer.write_all(&(triangles.len() as u32).to_le_bytes())?;

    for [a, b, c] in triangles {
        let (v0, v1, v2) = (world[a as usize], world[b as usize], world[c as usize]);
        let normal = (v1 - v0)
            .cross(&(v2 - v0))
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros);
        write_f32s(&mut writer, [normal.x, normal.y, normal.z])?;
        for v in [v0, v1, v2] {
            write_f32s(&mut writer, [v.x, v.y, v.z])?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    writer.flush()?;
    Ok(())
}

fn write_f32s<W: Write>(writer: &mut W, values: [f64; 3]) -> IoResult<()> {
    for v in values {
        writer.write_all(&(v as f32).to_le_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use layer_types::{box_mesh, Transform};

    const TETRA_ASCII: &[u8] = b"solid tetra
  facet normal 0 0 -1
    outer loop
      vertex 0 0 0
      vertex 0 1 0
      vertex 1 0 0
    endloop
  endfacet
  facet normal 0 -1 0
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 0 0 1
    endloop
  endfacet
  facet normal -1 0 0
    outer loop
      vertex 0 0 0
      vertex 0 0 1
      vertex 0 1 0
    endloop
  endfacet
  facet normal 1 1 1
    outer loop
      vertex 1 0 0
      vertex 0 1 0
      vertex 0 0 1
    endloop
  endfacet
endsolid tetra
";

    #[test]
    fn ascii_corners_are_shared() {
        let mesh = read_stl_ascii(BufReader::new(TETRA_ASCII)).unwrap();
        assert_eq!(mesh.face_count(), 4);
        assert_eq!(mesh.vertex_count(), 4);
        assert_relative_eq!(mesh.signed_volume(), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn ascii_bad_coordinate_reports_line() {
        let text = b"solid x\nfacet normal 0 0 1\nouter loop\nvertex 0 zero 0\n";
        let err = read_stl_ascii(BufReader::new(&text[..])).unwrap_err();
        assert!(matches!(err, IoError::Parse { line: 4, .. }), "{err}");
    }

    #[test]
    fn binary_roundtrip_in_world_space() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.stl");
        let t = Transform::new(Vector3::new(0.0, 0.0, 5.0), Vector3::zeros(), 1.0);
        let cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)).with_transform(t);

        save_stl(&cube, &path).unwrap();
        let loaded = load_stl(&path).unwrap();

        assert_eq!(loaded.face_count(), 12);
        assert_eq!(loaded.vertex_count(), 8);
        assert_relative_eq!(loaded.signed_volume(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(loaded.bounds().min.z, 5.0, epsilon = 1e-6);
    }

    #[test]
    fn truncated_binary_reports_face_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.stl");
        let mut bytes = vec![0u8; HEADER_SIZE];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(&[0u8; TRIANGLE_SIZE]);
        std::fs::write(&path, bytes).unwrap();

        let err = load_stl(&path).unwrap_err();
        assert!(matches!(
            err,
            IoError::InvalidFaceCount {
                expected: 3,
                got: 1
            }
        ));
    }

    #[test]
    fn load_nonexistent_file() {
        let err = load_stl("nonexistent_file_12345.stl").unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
