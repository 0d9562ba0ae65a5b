//! The layer-separation run.
//!
//! ```text
//! Init -> SourceLoaded -> BodyCandidateReady -> BodyLayered
//!      -> ClothingPreserved | ClothingCarved [-> SkinStripped] [-> Split]
//!      -> MaterialsAssigned -> Saved
//! ```
//!
//! Settings and the target are checked before any mesh is copied. Every
//! stage works on owned copies; the output set is handed to the store only
//! after all stages succeeded, so a failed run persists nothing.

use std::fmt;

use layer_carve::{BooleanCarver, LayerCarver, ProximityCarver, QualityWarning, SkinStripper};
use layer_repair::{clean_mesh, ComponentSplitter};
use layer_types::{Mesh, Scene};
use layer_volume::{smooth_laplacian, SignedOffsetter, VolumeRegularizer};
use tracing::{debug, info, warn};

use crate::error::LayerResult;
use crate::output::{Layer, LayerKind, OutputSet};
use crate::repository::MeshRepository;
use crate::settings::{ClothingMode, LayerSettings, Strategy};
use crate::store::OutputStore;
use crate::target::TargetSelector;

/// Stages of a run, in the order they can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing done yet.
    Init,
    /// Target resolved.
    SourceLoaded,
    /// Body candidate remeshed, smoothed and shrunk.
    BodyCandidateReady,
    /// Body carved, smoothed and cleaned.
    BodyLayered,
    /// Dressed copy kept as is.
    ClothingPreserved,
    /// Clothing shell extracted from the dressed copy.
    ClothingCarved,
    /// Skin patches removed from the clothing shell.
    SkinStripped,
    /// Clothing shell split into loose parts.
    Split,
    /// Layers tagged (or tagging skipped).
    MaterialsAssigned,
    /// Output handed to the store.
    Saved,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "Init",
            Self::SourceLoaded => "SourceLoaded",
            Self::BodyCandidateReady => "BodyCandidateReady",
            Self::BodyLayered => "BodyLayered",
            Self::ClothingPreserved => "ClothingPreserved",
            Self::ClothingCarved => "ClothingCarved",
            Self::SkinStripped => "SkinStripped",
            Self::Split => "Split",
            Self::MaterialsAssigned => "MaterialsAssigned",
            Self::Saved => "Saved",
        };
        f.write_str(name)
    }
}

/// Vertex counts along a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerStats {
    /// Source mesh.
    pub source_vertices: usize,
    /// Body candidate after remeshing and shrinking, before carving.
    pub candidate_vertices: usize,
    /// Final body.
    pub body_vertices: usize,
    /// Dressed or clothing layers combined.
    pub clothing_vertices: usize,
    /// Clothing parts kept by splitting.
    pub parts_kept: usize,
    /// Clothing parts discarded as too small.
    pub parts_discarded: usize,
}

impl fmt::Display for LayerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Layers: source {} verts, candidate {}, body {}, clothing {}",
            self.source_vertices,
            self.candidate_vertices,
            self.body_vertices,
            self.clothing_vertices
        )?;
        if self.parts_kept + self.parts_discarded > 0 {
            write!(
                f,
                " ({} parts kept, {} discarded)",
                self.parts_kept, self.parts_discarded
            )?;
        }
        Ok(())
    }
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The layers.
    pub output: OutputSet,
    /// States visited, starting at [`PipelineState::Init`].
    pub states: Vec<PipelineState>,
    /// Quality warnings, also carried by `output`.
    pub warnings: Vec<QualityWarning>,
    /// Vertex counts.
    pub stats: LayerStats,
}

impl RunReport {
    /// Whether the run visited `state`.
    #[must_use]
    pub fn visited(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }
}

fn enter(states: &mut Vec<PipelineState>, state: PipelineState) {
    info!(%state, "pipeline state");
    states.push(state);
}

/// Separates a dressed character into body and clothing layers.
///
/// # Example
///
/// ```
/// use layer_pipeline::{LayerPipeline, LayerSettings, MemoryStore, Strategy, TargetSelector};
/// use layer_types::{uv_sphere, Scene};
///
/// let mut scene = Scene::new();
/// scene.add_mesh("Character", uv_sphere(0.2, 24, 12));
///
/// let settings = LayerSettings::for_strategy(Strategy::Proximity).with_voxel_size(0.02);
/// let mut store = MemoryStore::new();
/// let report = LayerPipeline::new(settings)
///     .run(&scene, &TargetSelector::Largest, &mut store)
///     .unwrap();
///
/// assert!(report.output.get("DressedMesh").is_some());
/// assert_eq!(store.saved().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct LayerPipeline {
    settings: LayerSettings,
}

impl LayerPipeline {
    /// Pipeline with the given settings.
    #[must_use]
    pub fn new(settings: LayerSettings) -> Self {
        Self { settings }
    }

    /// Settings in use.
    #[must_use]
    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    /// Run every stage and hand the output to `store`.
    ///
    /// # Errors
    ///
    /// See [`LayerPipeline::separate`]; additionally
    /// [`LayerError::Io`](crate::LayerError::Io) from the store.
    pub fn run<S>(
        &self,
        scene: &Scene,
        target: &TargetSelector,
        store: &mut S,
    ) -> LayerResult<RunReport>
    where
        S: OutputStore + ?Sized,
    {
        let mut report = self.separate(scene, target)?;
        store.save(&report.output)?;
        enter(&mut report.states, PipelineState::Saved);
        Ok(report)
    }

    /// Run every stage up to and including material assignment, without
    /// persisting anything.
    ///
    /// # Errors
    ///
    /// - [`LayerError::Config`](crate::LayerError::Config) for invalid
    ///   settings, before anything else
    /// - [`LayerError::Resolution`](crate::LayerError::Resolution) when
    ///   the target cannot be resolved
    /// - [`LayerError::Solver`](crate::LayerError::Solver) when a geometry
    ///   operator fails hard
    pub fn separate(&self, scene: &Scene, target: &TargetSelector) -> LayerResult<RunReport> {
        let settings = &self.settings;
        let mut states = Vec::new();
        enter(&mut states, PipelineState::Init);
        settings.validate()?;

        let (object, source) = target.resolve(scene)?;
        info!(
            object = %object.name,
            vertices = source.vertex_count(),
            strategy = %settings.strategy,
            "processing {target}"
        );
        enter(&mut states, PipelineState::SourceLoaded);

        let repository = MeshRepository::new(source);
        let dressed = repository.duplicate();
        let body_copy = repository.duplicate();
        let mut warnings = Vec::new();
        let mut stats = LayerStats {
            source_vertices: source.vertex_count(),
            ..LayerStats::default()
        };

        let candidate = self.body_candidate(&body_copy, &mut warnings)?;
        stats.candidate_vertices = candidate.vertex_count();
        enter(&mut states, PipelineState::BodyCandidateReady);

        let body = self.carve_body(&candidate, &dressed, &mut warnings)?;
        stats.body_vertices = body.vertex_count();
        enter(&mut states, PipelineState::BodyLayered);

        let mut output = OutputSet::new(settings.collection.clone(), object.name.clone());
        output.layers.push(Layer::new(LayerKind::Body, body));

        match settings.clothing_mode() {
            ClothingMode::Preserve => {
                if settings.split_loose {
                    debug!("splitting applies to extracted clothing only, skipped");
                }
                output.layers.push(Layer::new(LayerKind::Dressed, dressed));
                enter(&mut states, PipelineState::ClothingPreserved);
            }
            ClothingMode::Extract => {
                self.extract_clothing(
                    &dressed,
                    &candidate,
                    &mut output,
                    &mut states,
                    &mut warnings,
                    &mut stats,
                )?;
            }
        }
        stats.clothing_vertices = output
            .layers
            .iter()
            .filter(|l| l.kind != LayerKind::Body)
            .map(|l| l.mesh.vertex_count())
            .sum();

        if settings.assign_materials {
            output.assign_materials();
        } else {
            debug!("material assignment disabled");
        }
        enter(&mut states, PipelineState::MaterialsAssigned);

        output.source_visible = settings.keep_original_visible;
        for warning in &warnings {
            warn!("{warning}");
        }
        output.warnings.clone_from(&warnings);
        info!("{stats}");

        Ok(RunReport {
            output,
            states,
            warnings,
            stats,
        })
    }

    /// Remesh, smooth and shrink a copy of the source.
    fn body_candidate(
        &self,
        body_copy: &Mesh,
        warnings: &mut Vec<QualityWarning>,
    ) -> LayerResult<Mesh> {
        let settings = &self.settings;
        let (remeshed, summary) =
            VolumeRegularizer::new(settings.regularize_params()).regularize(body_copy)?;
        if remeshed.is_empty() && !body_copy.is_empty() {
            warnings.push(QualityWarning::new(
                "regularize",
                format!(
                    "remeshing {} faces at voxel {} produced an empty surface",
                    summary.input_faces, settings.voxel_size
                ),
            ));
        }
        let candidate = SignedOffsetter::default().offset(&remeshed, settings.shrink())?;
        debug!(
            vertices = candidate.vertex_count(),
            shrink = settings.shrink(),
            "body candidate ready"
        );
        Ok(candidate)
    }

    /// Carve the candidate against the dressed copy, then finish it.
    fn carve_body(
        &self,
        candidate: &Mesh,
        dressed: &Mesh,
        warnings: &mut Vec<QualityWarning>,
    ) -> LayerResult<Mesh> {
        let settings = &self.settings;
        let carver: Box<dyn LayerCarver> = match settings.strategy {
            Strategy::Boolean => Box::new(BooleanCarver::default()),
            Strategy::Proximity => Box::new(ProximityCarver::new(settings.proximity_params())),
        };
        let outcome = carver.carve(candidate, dressed)?;
        warnings.extend(outcome.warnings);

        let mut body = outcome.mesh;
        smooth_laplacian(&mut body, &settings.strategy.finishing_smooth())?;
        let summary = clean_mesh(&mut body, &settings.clean_params())?;
        debug!(carver = carver.name(), "{summary}");
        Ok(body)
    }

    /// Subtract the candidate from the dressed copy, strip skin and split.
    fn extract_clothing(
        &self,
        dressed: &Mesh,
        candidate: &Mesh,
        output: &mut OutputSet,
        states: &mut Vec<PipelineState>,
        warnings: &mut Vec<QualityWarning>,
        stats: &mut LayerStats,
    ) -> LayerResult<()> {
        let settings = &self.settings;
        let extracted = BooleanCarver::default().difference(dressed, candidate)?;
        warnings.extend(extracted.warnings);
        let mut clothing = extracted.mesh;
        let summary = clean_mesh(&mut clothing, &settings.clean_params())?;
        debug!("{summary}");
        enter(states, PipelineState::ClothingCarved);

        if settings.skin_strip > 0.0 {
            clothing = SkinStripper::new(settings.clean_params()).strip(
                &clothing,
                candidate,
                settings.skin_strip,
            )?;
            enter(states, PipelineState::SkinStripped);
        }

        if settings.split_loose {
            let (parts, discarded) = clothing_parts(&clothing, settings.min_part_verts);
            stats.parts_kept = parts.len();
            stats.parts_discarded = discarded;
            if parts.is_empty() && !clothing.is_empty() {
                warnings.push(QualityWarning::new(
                    "split",
                    format!(
                        "all {discarded} clothing parts have fewer than {} vertices",
                        settings.min_part_verts
                    ),
                ));
            }
            output.layers.extend(parts);
            enter(states, PipelineState::Split);
        } else {
            output.layers.push(Layer::new(LayerKind::Clothing, clothing));
        }
        Ok(())
    }
}

/// Split a clothing shell into `ClothingPart_NN` layers.
///
/// Parts are named by discovery index, so the numbering has gaps where
/// parts below `min_part_verts` were dropped. Returns the kept layers and
/// the number of discarded parts.
///
/// # Example
///
/// ```
/// use layer_pipeline::clothing_parts;
/// use layer_types::{box_mesh, Point3};
///
/// let mut clothing = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
/// clothing.append(&box_mesh(Point3::new(2.0, 0.0, 0.0), Point3::new(3.0, 1.0, 1.0)));
///
/// let (parts, discarded) = clothing_parts(&clothing, 8);
/// assert_eq!(parts[1].name, "ClothingPart_01");
/// assert_eq!(discarded, 0);
/// ```
#[must_use]
pub fn clothing_parts(clothing: &Mesh, min_part_verts: usize) -> (Vec<Layer>, usize) {
    let total = layer_repair::find_components(clothing).len();
    let parts: Vec<Layer> = ComponentSplitter::new(min_part_verts)
        .split(clothing)
        .into_iter()
        .map(|c| Layer::new(LayerKind::ClothingPart(c.discovery_index), c.mesh))
        .collect();
    let discarded = total - parts.len();
    for layer in &parts {
        debug!(part = %layer.name, vertices = layer.mesh.vertex_count(), "kept clothing part");
    }
    (parts, discarded)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::{LayerError, ResolutionError};
    use crate::store::MemoryStore;
    use layer_types::{box_mesh, uv_sphere, ObjectKind, Point3, SceneObject};

    fn scene() -> Scene {
        let mut scene = Scene::new();
        scene.add_mesh("Character", uv_sphere(0.2, 24, 12));
        scene
    }

    fn quick(strategy: Strategy) -> LayerSettings {
        LayerSettings::for_strategy(strategy)
            .with_voxel_size(0.02)
            .with_smoothing(2, 0.2)
    }

    #[test]
    fn proximity_states_and_layers() {
        let report = LayerPipeline::new(quick(Strategy::Proximity))
            .separate(&scene(), &TargetSelector::Largest)
            .unwrap();
        assert_eq!(
            report.states,
            [
                PipelineState::Init,
                PipelineState::SourceLoaded,
                PipelineState::BodyCandidateReady,
                PipelineState::BodyLayered,
                PipelineState::ClothingPreserved,
                PipelineState::MaterialsAssigned,
            ]
        );
        let names: Vec<_> = report.output.layer_names().collect();
        assert_eq!(names, ["BodyMesh", "DressedMesh"]);
        assert_eq!(
            report.output.get("DressedMesh").unwrap().mesh,
            *scene().get("Character").unwrap().as_mesh().unwrap()
        );
        assert!(!report.output.source_visible);
    }

    #[test]
    fn boolean_extracts_clothing() {
        let report = LayerPipeline::new(quick(Strategy::Boolean))
            .separate(&scene(), &TargetSelector::Largest)
            .unwrap();
        assert!(report.visited(PipelineState::ClothingCarved));
        assert!(report.visited(PipelineState::SkinStripped));
        assert!(!report.visited(PipelineState::Split));
        assert!(report.output.get("ClothingMesh").is_some());
        assert!(report.output.get("DressedMesh").is_none());
    }

    #[test]
    fn skin_strip_zero_skips_stage() {
        let settings = quick(Strategy::Boolean).with_skin_strip(0.0);
        let report = LayerPipeline::new(settings)
            .separate(&scene(), &TargetSelector::Largest)
            .unwrap();
        assert!(!report.visited(PipelineState::SkinStripped));
    }

    #[test]
    fn materials_and_visibility_flags() {
        let settings = quick(Strategy::Proximity)
            .with_materials(false)
            .with_keep_original_visible(true);
        let report = LayerPipeline::new(settings)
            .separate(&scene(), &TargetSelector::Largest)
            .unwrap();
        assert!(report.output.layers.iter().all(|l| l.material.is_none()));
        assert!(report.output.source_visible);
        assert!(report.visited(PipelineState::MaterialsAssigned));

        let report = LayerPipeline::new(quick(Strategy::Proximity))
            .separate(&scene(), &TargetSelector::Largest)
            .unwrap();
        let body = report.output.body().unwrap();
        assert_eq!(body.material.as_ref().unwrap().name, "BodyMaterial");
    }

    #[test]
    fn invalid_settings_fail_first() {
        let mut store = MemoryStore::new();
        let err = LayerPipeline::new(LayerSettings::default().with_voxel_size(-1.0))
            .run(&Scene::new(), &TargetSelector::Largest, &mut store)
            .unwrap_err();
        assert!(matches!(err, LayerError::Config(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn non_mesh_target() {
        let mut scene = scene();
        scene.add_object(SceneObject {
            name: "Rig".to_string(),
            kind: ObjectKind::Empty,
            visible: true,
        });
        let err = LayerPipeline::default()
            .separate(&scene, &TargetSelector::Named("Rig".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            LayerError::Resolution(ResolutionError::NotAMesh { kind: "empty", .. })
        ));
    }

    #[test]
    fn non_finite_source_is_solver_error() {
        let mut mesh = uv_sphere(0.2, 12, 6);
        mesh.vertices[3].x = f64::NAN;
        let mut scene = Scene::new();
        scene.add_mesh("Broken", mesh);
        let mut store = MemoryStore::new();
        let err = LayerPipeline::new(quick(Strategy::Boolean))
            .run(&scene, &TargetSelector::Largest, &mut store)
            .unwrap_err();
        assert!(matches!(err, LayerError::Solver(_)), "{err}");
        assert!(store.is_empty());
    }

    #[test]
    fn parts_named_by_discovery_index() {
        let mut clothing = box_mesh(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0));
        let mut tiny = Mesh::from_triangles(
            vec![
                Point3::new(5.0, 0.0, 0.0),
                Point3::new(6.0, 0.0, 0.0),
                Point3::new(5.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        tiny.append(&box_mesh(Point3::new(8.0, 0.0, 0.0), Point3::new(9.0, 1.0, 1.0)));
        clothing.append(&tiny);

        let (parts, discarded) = clothing_parts(&clothing, 4);
        let names: Vec<_> = parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["ClothingPart_00", "ClothingPart_02"]);
        assert_eq!(discarded, 1);
    }

    #[test]
    fn stats_display() {
        let stats = LayerStats {
            source_vertices: 10,
            candidate_vertices: 8,
            body_vertices: 6,
            clothing_vertices: 10,
            parts_kept: 2,
            parts_discarded: 1,
        };
        let text = stats.to_string();
        assert!(text.contains("candidate 8"));
        assert!(text.contains("2 parts kept, 1 discarded"));
    }
}
