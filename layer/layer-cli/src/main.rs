//! `layer-separate` - split a dressed character into body and clothing layers.
//!
//! # Usage
//!
//! ```text
//! layer-separate --input hero.obj --output out/
//! layer-separate --input hero.obj --output out/ --strategy proximity --proximity-max 0.01
//! layer-separate --input hero.obj --output out/ --split-loose --min-part-verts 500 -v
//! ```
//!
//! Layers are written to `<output>/<collection>/<Layer>.obj` with a shared
//! `<collection>.mtl`. Set `RUST_LOG` for finer control over logging.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use layer::carve::Falloff;
use layer::io::load_scene;
use layer::pipeline::{
    ClothingMode, DirectoryStore, LayerPipeline, LayerSettings, RunReport, Strategy,
    TargetSelector,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Separate a dressed character mesh into body and clothing layers
#[derive(Parser, Debug)]
#[command(name = "layer-separate")]
#[command(about = "Separate a dressed character mesh into body and clothing layers", long_about = None)]
#[command(version)]
struct Cli {
    /// Input mesh (.obj or .stl)
    #[arg(long, short)]
    input: PathBuf,

    /// Output directory
    #[arg(long, short)]
    output: PathBuf,

    /// Object to process (default: the mesh with the most vertices)
    #[arg(long, conflicts_with = "use_active")]
    object: Option<String>,

    /// Process the active object; files mark none, so the last object is used
    #[arg(long)]
    use_active: bool,

    /// Carving strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::Boolean)]
    strategy: StrategyArg,

    /// Voxel edge for remeshing the body
    #[arg(long)]
    voxel_size: Option<f64>,

    /// Laplacian passes after remeshing
    #[arg(long)]
    smooth_iterations: Option<u32>,

    /// Laplacian factor after remeshing, in (0, 1]
    #[arg(long)]
    smooth_lambda: Option<f64>,

    /// Inward offset of the body candidate (default depends on strategy)
    #[arg(long)]
    shrink: Option<f64>,

    /// Inner edge of the proximity band
    #[arg(long)]
    proximity_min: Option<f64>,

    /// Outer edge of the proximity band
    #[arg(long)]
    proximity_max: Option<f64>,

    /// Weight curve across the proximity band
    #[arg(long, value_enum)]
    falloff: Option<FalloffArg>,

    /// Delete clothing faces closer than this to the body (0 disables)
    #[arg(long)]
    skin_strip: Option<f64>,

    /// Weld distance for cleanup
    #[arg(long)]
    merge_distance: Option<f64>,

    /// Subtract the body and write the remaining clothing shell
    #[arg(long, conflicts_with = "preserve_clothing")]
    extract_clothing: bool,

    /// Write the dressed mesh untouched
    #[arg(long)]
    preserve_clothing: bool,

    /// Split extracted clothing into loose parts
    #[arg(long)]
    split_loose: bool,

    /// Smallest clothing part kept when splitting
    #[arg(long)]
    min_part_verts: Option<usize>,

    /// Output collection name
    #[arg(long)]
    collection: Option<String>,

    /// Keep the source object visible
    #[arg(long)]
    keep_original_visible: bool,

    /// Do not tag layers with materials
    #[arg(long)]
    no_materials: bool,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    /// Exact solid difference
    Boolean,
    /// Delete body vertices near the dressed surface
    Proximity,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FalloffArg {
    Linear,
    Smoothstep,
}

impl Cli {
    fn settings(&self) -> LayerSettings {
        let strategy = match self.strategy {
            StrategyArg::Boolean => Strategy::Boolean,
            StrategyArg::Proximity => Strategy::Proximity,
        };
        let mut settings = LayerSettings::for_strategy(strategy);

        if let Some(voxel) = self.voxel_size {
            settings = settings.with_voxel_size(voxel);
        }
        let iterations = self.smooth_iterations.unwrap_or(settings.smooth_iterations);
        let lambda = self.smooth_lambda.unwrap_or(settings.smooth_lambda);
        settings = settings.with_smoothing(iterations, lambda);
        if let Some(shrink) = self.shrink {
            settings = settings.with_shrink(shrink);
        }
        let min = self.proximity_min.unwrap_or(settings.proximity_min);
        let max = self.proximity_max.unwrap_or(settings.proximity_max);
        settings = settings.with_proximity_band(min, max);
        if let Some(falloff) = self.falloff {
            settings = settings.with_falloff(match falloff {
                FalloffArg::Linear => Falloff::Linear,
                FalloffArg::Smoothstep => Falloff::Smoothstep,
            });
        }
        if let Some(distance) = self.skin_strip {
            settings = settings.with_skin_strip(distance);
        }
        if let Some(distance) = self.merge_distance {
            settings = settings.with_merge_distance(distance);
        }
        if self.extract_clothing {
            settings = settings.with_clothing(ClothingMode::Extract);
        } else if self.preserve_clothing {
            settings = settings.with_clothing(ClothingMode::Preserve);
        }
        if self.split_loose {
            let min_verts = self.min_part_verts.unwrap_or(settings.min_part_verts);
            settings = settings.with_split(min_verts);
        }
        if let Some(collection) = &self.collection {
            settings = settings.with_collection(collection.clone());
        }
        settings
            .with_keep_original_visible(self.keep_original_visible)
            .with_materials(!self.no_materials)
    }

    fn target(&self) -> TargetSelector {
        TargetSelector::from_options(self.object.as_deref(), self.use_active)
    }
}

fn print_report(report: &RunReport, store: &DirectoryStore) {
    println!("{}", report.output);
    println!("{}", report.stats);
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    println!(
        "Wrote {}",
        store.collection_dir(&report.output.collection).display()
    );
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let settings = cli.settings();
    let target = cli.target();

    let mut scene = load_scene(&cli.input)
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;
    if cli.use_active && scene.active.is_none() {
        if let Some(last) = scene.objects.len().checked_sub(1) {
            scene.set_active(last);
        }
    }
    info!(objects = scene.objects.len(), "loaded {}", cli.input.display());

    let mut store = DirectoryStore::new(&cli.output);
    let report = LayerPipeline::new(settings)
        .run(&scene, &target, &mut store)
        .with_context(|| format!("Layer separation of {} failed", cli.input.display()))?;

    print_report(&report, &store);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["layer-separate", "--input", "hero.obj", "--output", "out"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_follow_strategy() {
        let settings = parse(&[]).settings();
        assert_eq!(settings, LayerSettings::default());

        let settings = parse(&["--strategy", "proximity"]).settings();
        assert_eq!(settings.clothing_mode(), ClothingMode::Preserve);
        assert!((settings.shrink() - 0.004).abs() < 1e-12);
    }

    #[test]
    fn flags_map_onto_settings() {
        let settings = parse(&[
            "--voxel-size",
            "0.01",
            "--shrink",
            "0.002",
            "--preserve-clothing",
            "--split-loose",
            "--min-part-verts",
            "300",
            "--collection",
            "Hero",
            "--no-materials",
            "--falloff",
            "smoothstep",
        ])
        .settings();

        assert!((settings.voxel_size - 0.01).abs() < 1e-12);
        assert!((settings.shrink() - 0.002).abs() < 1e-12);
        assert_eq!(settings.clothing_mode(), ClothingMode::Preserve);
        assert!(settings.split_loose);
        assert_eq!(settings.min_part_verts, 300);
        assert_eq!(settings.collection, "Hero");
        assert!(!settings.assign_materials);
        assert_eq!(settings.falloff, Falloff::Smoothstep);
    }

    #[test]
    fn target_selection() {
        assert_eq!(parse(&[]).target(), TargetSelector::Largest);
        assert_eq!(
            parse(&["--object", "Hero"]).target(),
            TargetSelector::Named("Hero".to_string())
        );
        assert_eq!(parse(&["--use-active"]).target(), TargetSelector::Active);
    }

    #[test]
    fn conflicting_flags_rejected() {
        let argv = [
            "layer-separate",
            "--input",
            "a.obj",
            "--output",
            "out",
            "--extract-clothing",
            "--preserve-clothing",
        ];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
