//! Wavefront OBJ and MTL support.
//!
//! Loading turns every `o` block into a scene object. OBJ numbers vertices
//! globally across the file; each object is compacted so it only holds the
//! vertices its faces use. Texture coordinates, normals, groups, smoothing
//! and material statements are skipped.
//!
//! Saving writes several named objects into one file, positions in world
//! space, each optionally bound to a material from a shared MTL library.
//!
//! ```text
//! mtllib SeparatedCharacter.mtl
//! o BodyMesh
//! usemtl BodyMaterial
//! v 0.1 0.2 0.3
//! ...
//! f 1 2 3 4
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use hashbrown::HashMap;
use layer_types::{Face, Material, Mesh, Point3, Rgb, Scene, SceneObject};
use tracing::debug;

use crate::error::{IoError, IoResult};

/// One named mesh to write with [`write_obj`].
#[derive(Debug, Clone, Copy)]
pub struct ObjObject<'a> {
    /// Object name (`o` statement).
    pub name: &'a str,
    /// Geometry, written in world space.
    pub mesh: &'a Mesh,
    /// Material name for a `usemtl` statement.
    pub material: Option<&'a str>,
}

impl<'a> ObjObject<'a> {
    /// Object without a material binding.
    #[must_use]
    pub fn new(name: &'a str, mesh: &'a Mesh) -> Self {
        Self {
            name,
            mesh,
            material: None,
        }
    }

    /// Bind a material by name.
    #[must_use]
    pub fn with_material(mut self, material: &'a str) -> Self {
        self.material = Some(material);
        self
    }
}

/// Faces of one `o` block, still in file-global vertex numbering.
struct PendingObject {
    name: String,
    faces: Vec<Face>,
}

impl PendingObject {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            faces: Vec::new(),
        }
    }

    fn finish(self, vertices: &[Point3<f64>]) -> IoResult<SceneObject> {
        if self.faces.is_empty() {
            return Ok(SceneObject::mesh(self.name, Mesh::new()));
        }

        let mut remap: HashMap<u32, u32> = HashMap::new();
        let mut local = Vec::new();
        let mut faces = Vec::with_capacity(self.faces.len());
        for face in &self.faces {
            let mut out = Face::new();
            for &global in face {
                let p = vertices.get(global as usize).ok_or_else(|| {
                    IoError::invalid_content(format!(
                        "object '{}' references vertex {} of {}",
                        self.name,
                        u64::from(global) + 1,
                        vertices.len()
                    ))
                })?;
                let index = *remap.entry(global).or_insert_with(|| {
                    local.push(*p);
                    (local.len() - 1) as u32
                });
                out.push(index);
            }
            faces.push(out);
        }

        let mesh = Mesh::from_parts(local, faces);
        mesh.validate()?;
        Ok(SceneObject::mesh(self.name, mesh))
    }
}

/// Parse OBJ text into a scene.
///
/// Faces that appear before any `o` statement go into an object called
/// `default_name`. Named objects without faces load as empty meshes, so a
/// saved empty layer reads back as the same layer.
/// No object is marked active.
///
/// # Errors
///
/// [`IoError::Parse`] for malformed statements, [`IoError::InvalidContent`]
/// for indices past the end of the vertex list.
pub fn read_obj<R: BufRead>(reader: R, default_name: &str) -> IoResult<Scene> {
    let mut vertices: Vec<Point3<f64>> = Vec::new();
    let mut current = PendingObject::new(default_name);
    let mut finished = Vec::new();
    let mut named = false;

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = number + 1;
        let statement = line.split('#').next().unwrap_or_default();
        let mut parts = statement.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };

        match keyword {
            "v" => {
                let mut coord = || -> IoResult<f64> {
                    let token = parts
                        .next()
                        .ok_or_else(|| IoError::parse(line_no, "vertex needs 3 coordinates"))?;
                    token
                        .parse()
                        .map_err(|_| IoError::parse(line_no, format!("bad coordinate '{token}'")))
                };
                vertices.push(Point3::new(coord()?, coord()?, coord()?));
            }
            "f" => {
                let mut face = Face::new();
                for token in parts {
                    face.push(resolve_index(token, vertices.len(), line_no)?);
                }
                if face.len() < 3 {
                    return Err(IoError::parse(line_no, "face needs at least 3 vertices"));
                }
                current.faces.push(face);
            }
            "o" => {
                let name = statement.trim_start()[1..].trim();
                let name = if name.is_empty() { default_name } else { name };
                let previous = std::mem::replace(&mut current, PendingObject::new(name));
                // An unnamed leading block only counts if it holds faces
                if named || !previous.faces.is_empty() {
                    finished.push(previous);
                }
                named = true;
            }
            _ => {}
        }
    }
    if named || !current.faces.is_empty() {
        finished.push(current);
    }

    let mut scene = Scene::new();
    for pending in finished {
        scene.add_object(pending.finish(&vertices)?);
    }
    Ok(scene)
}

/// Turn an `f` corner (`i`, `i/t`, `i//n`, `i/t/n`) into a zero-based
/// index. Negative indices count back from the last vertex read so far.
fn resolve_index(token: &str, vertex_count: usize, line: usize) -> IoResult<u32> {
    let head = token.split('/').next().unwrap_or_default();
    let index: i64 = head
        .parse()
        .map_err(|_| IoError::parse(line, format!("bad face index '{token}'")))?;
    let resolved = match index {
        0 => return Err(IoError::parse(line, "face index 0 is not allowed")),
        i if i > 0 => i - 1,
        i => vertex_count as i64 + i,
    };
    u32::try_from(resolved)
        .map_err(|_| IoError::parse(line, format!("face index '{token}' out of range")))
}

/// Load an OBJ file as a scene.
///
/// Faces outside any `o` block land in an object named after the file stem.
///
/// # Errors
///
/// [`IoError::FileNotFound`] for a missing file, otherwise as [`read_obj`].
///
/// # Example
///
/// ```no_run
/// use layer_io::load_obj;
///
/// let scene = load_obj("character.obj").unwrap();
/// for (object, mesh) in scene.meshes() {
///     println!("{}: {} vertices", object.name, mesh.vertex_count());
/// }
/// ```
pub fn load_obj<P: AsRef<Path>>(path: P) -> IoResult<Scene> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::opening(path, e))?;
    let scene = read_obj(BufReader::new(file), &file_stem(path))?;
    debug!(
        path = %path.display(),
        objects = scene.objects.len(),
        "loaded OBJ"
    );
    Ok(scene)
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "Mesh".to_string(), |s| s.to_string_lossy().into_owned())
}

/// Write objects as OBJ text.
///
/// Vertex indices continue across objects as OBJ requires. With `mtllib`
/// set, a `mtllib` statement heads the file.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_obj<W: Write>(
    mut writer: W,
    objects: &[ObjObject<'_>],
    mtllib: Option<&str>,
) -> IoResult<()> {
    writeln!(writer, "# layer-io OBJ")?;
    if let Some(lib) = mtllib {
        writeln!(writer, "mtllib {lib}")?;
    }

    let mut offset: u64 = 1;
    for object in objects {
        writeln!(writer, "o {}", object.name)?;
        if let Some(material) = object.material {
            writeln!(writer, "usemtl {material}")?;
        }
        for v in object.mesh.world_positions() {
            writeln!(writer, "v {} {} {}", v.x, v.y, v.z)?;
        }
        for face in &object.mesh.faces {
            write!(writer, "f")?;
            for &i in face {
                write!(writer, " {}", offset + u64::from(i))?;
            }
            writeln!(writer)?;
        }
        offset += object.mesh.vertex_count() as u64;
    }
    writer.flush()?;
    Ok(())
}

/// Save objects to an OBJ file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_obj<P: AsRef<Path>>(
    path: P,
    objects: &[ObjObject<'_>],
    mtllib: Option<&str>,
) -> IoResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_obj(BufWriter::new(file), objects, mtllib)?;
    debug!(path = %path.display(), objects = objects.len(), "saved OBJ");
    Ok(())
}

/// Write a material library with one flat diffuse colour per material.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_mtl<W: Write>(mut writer: W, materials: &[Material]) -> IoResult<()> {
    writeln!(writer, "# layer-io MTL")?;
    for material in materials {
        let Rgb { r, g, b } = material.color;
        writeln!(writer)?;
        writeln!(writer, "newmtl {}", material.name)?;
        writeln!(writer, "Ka 0 0 0")?;
        writeln!(writer, "Kd {r} {g} {b}")?;
        writeln!(writer, "Ks 0 0 0")?;
        writeln!(writer, "d 1")?;
        writeln!(writer, "illum 1")?;
    }
    writer.flush()?;
    Ok(())
}

/// Save a material library.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn save_mtl<P: AsRef<Path>>(path: P, materials: &[Material]) -> IoResult<()> {
    let file = File::create(path)?;
    write_mtl(BufWriter::new(file), materials)
}

/// Parse a material library. Only names and diffuse colours are kept;
/// a material without `Kd` is white.
///
/// # Errors
///
/// [`IoError::Parse`] for a malformed `newmtl` or `Kd` statement.
pub fn read_mtl<R: BufRead>(reader: R) -> IoResult<Vec<Material>> {
    let mut materials: Vec<Material> = Vec::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = number + 1;
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("newmtl") => {
                let name = parts.collect::<Vec<_>>().join(" ");
                if name.is_empty() {
                    return Err(IoError::parse(line_no, "newmtl needs a name"));
                }
                materials.push(Material::new(name, Rgb::new(1.0, 1.0, 1.0)));
            }
            Some("Kd") => {
                let current = materials
                    .last_mut()
                    .ok_or_else(|| IoError::parse(line_no, "Kd before any newmtl"))?;
                let mut channel = || -> IoResult<f32> {
                    let token = parts
                        .next()
                        .ok_or_else(|| IoError::parse(line_no, "Kd needs 3 components"))?;
                    token
                        .parse()
                        .map_err(|_| IoError::parse(line_no, format!("bad colour '{token}'")))
                };
                current.color = Rgb::new(channel()?, channel()?, channel()?);
            }
            _ => {}
        }
    }
    Ok(materials)
}

/// Load a material library file.
///
/// # Errors
///
/// [`IoError::FileNotFound`] for a missing file, otherwise as [`read_mtl`].
pub fn load_mtl<P: AsRef<Path>>(path: P) -> IoResult<Vec<Material>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| IoError::opening(path, e))?;
    read_mtl(BufReader::new(file))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use layer_types::{box_mesh, uv_sphere, Transform, Vector3};

    fn scene_from(text: &str) -> Scene {
        read_obj(BufReader::new(text.as_bytes()), "Default").unwrap()
    }

    #[test]
    fn objects_are_compacted() {
        let scene = scene_from(
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 5 5 5\nv 6 5 5\nv 5 6 5\n\
             o First\nf 1 2 3\n\
             o Second\nf 4/1 5/2/3 6//4\n",
        );
        assert_eq!(scene.objects.len(), 2);
        let second = scene.get("Second").unwrap().as_mesh().unwrap();
        assert_eq!(second.vertex_count(), 3);
        assert_eq!(second.faces[0].as_slice(), &[0, 1, 2]);
        assert_relative_eq!(second.vertices[0].x, 5.0);
        assert!(scene.active.is_none());
    }

    #[test]
    fn negative_indices_are_relative() {
        let scene = scene_from("o Tri\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n");
        let mesh = scene.get("Tri").unwrap().as_mesh().unwrap();
        assert_eq!(mesh.faces[0].as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn leading_faces_use_default_name() {
        let scene = scene_from("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\no Marker\n");
        assert_eq!(scene.objects[0].name, "Default");
        assert!(scene.objects[0].as_mesh().is_some());
        let marker = scene.objects[1].as_mesh().unwrap();
        assert_eq!(marker.vertex_count(), 0);
        assert_eq!(marker.face_count(), 0);
    }

    #[test]
    fn empty_object_roundtrips_as_empty_mesh() {
        let empty = Mesh::new();
        let mut buffer = Vec::new();
        let object = ObjObject::new("BodyMesh", &empty).with_material("BodyMaterial");
        write_obj(&mut buffer, &[object], None).unwrap();

        let scene = read_obj(BufReader::new(&buffer[..]), "x").unwrap();
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].name, "BodyMesh");
        let mesh = scene.objects[0].as_mesh().unwrap();
        assert!(mesh.vertices.is_empty());
        assert!(mesh.faces.is_empty());
    }

    #[test]
    fn comments_and_unknown_statements_are_skipped() {
        let scene = scene_from(
            "# exported\nmtllib x.mtl\no Quad # trailing\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvn 0 0 1\ns off\nusemtl Skin\nf 1 2 3 4\n",
        );
        let mesh = scene.get("Quad").unwrap().as_mesh().unwrap();
        assert_eq!(mesh.faces[0].len(), 4);
    }

    #[test]
    fn malformed_statements_report_line() {
        let bad = [
            ("v 0 0\n", 1),
            ("v 0 0 0\nv 1 0 0\nf 1 2\n", 3),
            ("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n", 4),
            ("v 0 0 0\nf a b c\n", 2),
        ];
        for (text, line) in bad {
            let err = read_obj(BufReader::new(text.as_bytes()), "x").unwrap_err();
            assert!(
                matches!(err, IoError::Parse { line: l, .. } if l == line),
                "{text:?}: {err}"
            );
        }
    }

    #[test]
    fn dangling_index_is_invalid_content() {
        let err = read_obj(BufReader::new(&b"v 0 0 0\nf 1 2 3\n"[..]), "x").unwrap_err();
        assert!(matches!(err, IoError::InvalidContent { .. }));
    }

    #[test]
    fn write_then_read_keeps_world_geometry() {
        let t = Transform::new(Vector3::new(1.0, 2.0, 3.0), Vector3::zeros(), 0.5);
        let sphere = uv_sphere(1.0, 12, 6).with_transform(t);
        let cube = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let objects = [
            ObjObject::new("Sphere", &sphere).with_material("BodyMaterial"),
            ObjObject::new("Cube", &cube),
        ];

        let mut buffer = Vec::new();
        write_obj(&mut buffer, &objects, Some("lib.mtl")).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert!(text.contains("mtllib lib.mtl"));
        assert!(text.contains("usemtl BodyMaterial"));

        let scene = read_obj(BufReader::new(&buffer[..]), "x").unwrap();
        let loaded = scene.get("Sphere").unwrap().as_mesh().unwrap();
        assert_eq!(loaded.faces, sphere.faces);
        for (a, b) in loaded.vertices.iter().zip(sphere.world_positions()) {
            assert_relative_eq!(*a, b, epsilon = 1e-12);
        }
        let cube_back = scene.get("Cube").unwrap().as_mesh().unwrap();
        assert_relative_eq!(cube_back.signed_volume(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn mtl_roundtrip() {
        let materials = [Material::body(), Material::dressed(), Material::clothing()];
        let mut buffer = Vec::new();
        write_mtl(&mut buffer, &materials).unwrap();
        let back = read_mtl(BufReader::new(&buffer[..])).unwrap();
        assert_eq!(back, materials);
    }

    #[test]
    fn files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mesh = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0));
        let obj = dir.path().join("Crate.obj");
        save_obj(&obj, &[ObjObject::new("Crate", &mesh)], None).unwrap();
        save_mtl(dir.path().join("Crate.mtl"), &[Material::body()]).unwrap();

        let scene = load_obj(&obj).unwrap();
        assert_eq!(scene.objects.len(), 1);
        assert_eq!(scene.objects[0].name, "Crate");
        let materials = load_mtl(dir.path().join("Crate.mtl")).unwrap();
        assert_eq!(materials[0].name, "BodyMaterial");

        assert!(matches!(
            load_obj(dir.path().join("missing.obj")),
            Err(IoError::FileNotFound { .. })
        ));
    }
}
