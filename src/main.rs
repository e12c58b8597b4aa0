use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};

use scarp_io::{BoundaryReader, ExperimentName, IncidentReader, RasterReader, ResultWriter};
use scarp_model::{ClassifierConfig, FeatureStack, TrainingSet};
use scarp_raster::{
    CompositeWeights, FactorConfig, FactorKind, FactorSet, FactorSources, PopulationMask, Raster,
    Reducer, SusceptibilityRaster, Zone, ZoneCounts, ZonePopulation, ZoneRaster, build_factors,
};
use scarp_rf::RandomForest;
use scarp_validate::{
    PointSet, ScopeInputs, StudyArea, SyntheticConfig, district_statistics, validate_both,
};

#[derive(Parser)]
#[command(name = "scarp")]
#[command(about = "Landslide susceptibility scoring, validation and classification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for synthetic points and the train/validation split
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

/// Source rasters and grid settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
struct RasterArgs {
    /// Elevation raster (ESRI ASCII grid)
    #[arg(long)]
    elevation: PathBuf,

    /// Land-cover class raster (MODIS IGBP codes)
    #[arg(long)]
    land_cover: PathBuf,

    /// Flow-accumulation raster (upstream cell counts)
    #[arg(long)]
    flow_accumulation: PathBuf,

    /// Soil-texture class raster (USDA classes 1-12)
    #[arg(long)]
    soil_texture: PathBuf,

    /// Clay-fraction raster, one per depth band (repeat the flag)
    #[arg(long, required = true)]
    clay: Vec<PathBuf>,

    /// Population-count raster
    #[arg(long)]
    population: PathBuf,

    /// Common grid resolution in metres
    #[arg(long, default_value_t = 1000.0)]
    resolution_m: f64,

    /// Keep the elevation grid as the common grid
    #[arg(long, default_value_t = false, conflicts_with = "resolution_m")]
    native_grid: bool,

    /// Upstream-cell threshold for the stream mask
    #[arg(long, default_value_t = 50.0)]
    stream_threshold: f64,

    /// Drainage-density neighbourhood radius in metres
    #[arg(long, default_value_t = 5000.0)]
    drainage_radius_m: f64,

    /// Pixel budget for min/max/percentile reductions (exact if not set)
    #[arg(long)]
    max_pixels: Option<usize>,

    /// Composite weight as FACTOR=WEIGHT (repeat; replaces the default table)
    #[arg(long = "weight", value_parser = parse_weight)]
    weights: Vec<(FactorKind, f64)>,
}

/// Incident input and its filters.
#[derive(Args, Debug, Clone)]
struct IncidentArgs {
    /// Incident CSV
    #[arg(long)]
    incidents: PathBuf,

    /// Keep only incidents with casualties, affected people or destroyed infrastructure
    #[arg(long, default_value_t = false)]
    damaging_only: bool,

    /// Keep only incidents from this year onward
    #[arg(long)]
    since_year: Option<i32>,
}

/// Experiment name and output location.
#[derive(Args, Debug, Clone)]
struct OutputArgs {
    /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
    #[arg(long)]
    experiment: String,

    /// Output directory for result files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Build factors, composite and zone the global and populated surfaces
    Susceptibility {
        #[command(flatten)]
        rasters: RasterArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Compare incident zones against seeded synthetic points in both scopes
    Validate {
        #[command(flatten)]
        rasters: RasterArgs,

        #[command(flatten)]
        incidents: IncidentArgs,

        /// Study-area polygon (GeoJSON)
        #[arg(long)]
        study_area: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Train the Random Forest classifier and classify the feature stack
    Train {
        #[command(flatten)]
        rasters: RasterArgs,

        #[command(flatten)]
        incidents: IncidentArgs,

        /// Study-area polygon (GeoJSON)
        #[arg(long)]
        study_area: PathBuf,

        /// Restrict training points and the feature stack to populated pixels
        #[arg(long, default_value_t = false)]
        populated_only: bool,

        /// Number of trees in the Random Forest
        #[arg(long, default_value_t = 50)]
        n_trees: usize,

        /// Share of records drawn into the training partition
        #[arg(long, default_value_t = 0.7)]
        split_ratio: f64,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Classify the feature stack with a saved model
    Classify {
        #[command(flatten)]
        rasters: RasterArgs,

        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Restrict the feature stack to populated pixels
        #[arg(long, default_value_t = false)]
        populated_only: bool,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Per-district susceptibility and incident statistics
    Districts {
        #[command(flatten)]
        rasters: RasterArgs,

        #[command(flatten)]
        incidents: IncidentArgs,

        /// District polygons (GeoJSON FeatureCollection with a `name` property)
        #[arg(long)]
        districts: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct SusceptibilityOutput {
    experiment: String,
    rows: usize,
    cols: usize,
    global_zones: ZoneCounts,
    populated_zones: ZoneCounts,
    populated_cells: usize,
    population_by_zone: ZonePopulation,
}

#[derive(Serialize)]
struct ZoneSummary<'a> {
    weights: &'a [(FactorKind, f64)],
    global_zones: ZoneCounts,
    populated_zones: ZoneCounts,
    population_by_zone: ZonePopulation,
    population_percentages: Vec<(String, f64)>,
}

#[derive(Serialize)]
struct ValidateOutput {
    experiment: String,
    observed: usize,
    observed_populated: usize,
    global_chi_square: f64,
    populated_chi_square: f64,
    global_f1: f64,
    populated_f1: f64,
}

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    train_records: usize,
    validation_records: usize,
    dropped_records: usize,
    accuracy: f64,
    oob_accuracy: Option<f64>,
    n_trees: usize,
}

#[derive(Serialize)]
struct ClassifyOutput {
    experiment: String,
    model_n_trees: usize,
    classified_pixels: usize,
}

#[derive(Serialize)]
struct DistrictsOutput {
    experiment: String,
    n_districts: usize,
    national_mean_susceptibility: Option<f64>,
    total_incidents: usize,
}

/// Every surface the pipeline derives from the source rasters.
struct Surfaces {
    factors: FactorSet,
    mask: PopulationMask,
    global: SusceptibilityRaster,
    global_zones: ZoneRaster,
    populated: SusceptibilityRaster,
    populated_zones: ZoneRaster,
}

fn parse_weight(s: &str) -> Result<(FactorKind, f64), String> {
    let (name, weight) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FACTOR=WEIGHT, got \"{s}\""))?;
    let kind = name.parse::<FactorKind>().map_err(|e| e.to_string())?;
    let weight = weight
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("weight for {kind}: {e}"))?;
    Ok((kind, weight))
}

fn read_raster(path: &Path, what: &str) -> Result<Raster> {
    RasterReader::new(path)
        .read()
        .with_context(|| format!("failed to read {what} raster"))
}

fn composite_weights(args: &RasterArgs) -> Result<CompositeWeights> {
    if args.weights.is_empty() {
        return Ok(CompositeWeights::default());
    }
    CompositeWeights::new(args.weights.clone()).context("invalid composite weights")
}

fn build_surfaces(args: &RasterArgs) -> Result<Surfaces> {
    let reducer = match args.max_pixels {
        Some(n) => Reducer::new().with_max_pixels(n)?,
        None => Reducer::new(),
    };
    let resolution = (!args.native_grid).then_some(args.resolution_m);
    let config = FactorConfig::new()
        .with_target_resolution_m(resolution)?
        .with_stream_threshold(args.stream_threshold)
        .with_drainage_radius_m(args.drainage_radius_m)?
        .with_reducer(reducer);

    let elevation = read_raster(&args.elevation, "elevation")?;
    let land_cover = read_raster(&args.land_cover, "land-cover")?;
    let flow_accumulation = read_raster(&args.flow_accumulation, "flow-accumulation")?;
    let soil_texture = read_raster(&args.soil_texture, "soil-texture")?;
    let clay = args
        .clay
        .iter()
        .map(|p| read_raster(p, "clay"))
        .collect::<Result<Vec<_>>>()?;
    let population = read_raster(&args.population, "population")?;

    let sources = FactorSources {
        elevation: &elevation,
        land_cover: &land_cover,
        flow_accumulation: &flow_accumulation,
        soil_texture: &soil_texture,
        clay: &clay,
    };
    let factors = build_factors(&sources, &config).context("failed to build factor layers")?;

    let global = composite_weights(args)?
        .compose(factors.layers(), &reducer)
        .context("compositing failed")?;
    let global_zones = ZoneRaster::classify(global.raster(), &reducer)?;

    let mask = PopulationMask::from_counts(&population, factors.grid())
        .context("failed to aggregate population onto the common grid")?;
    let populated = mask.gate(&global, &reducer)?;
    let populated_zones = ZoneRaster::classify(populated.raster(), &reducer)
        .context("population mask leaves no valid pixel")?;

    Ok(Surfaces {
        factors,
        mask,
        global,
        global_zones,
        populated,
        populated_zones,
    })
}

fn read_incidents(args: &IncidentArgs) -> Result<PointSet> {
    let incidents = IncidentReader::new(&args.incidents)
        .read()
        .context("failed to read incident CSV")?;
    let mut observed = PointSet::observed(incidents);
    if args.damaging_only {
        observed = observed.damaging();
    }
    if let Some(year) = args.since_year {
        observed = observed.since_year(year);
    }
    info!(n_incidents = observed.len(), "incidents selected");
    Ok(observed)
}

fn read_study_area(path: &Path) -> Result<StudyArea> {
    let polygon = BoundaryReader::new(path)
        .read_polygon()
        .context("failed to read study-area polygon")?;
    Ok(StudyArea::new(polygon)?)
}

fn feature_stack(surfaces: &Surfaces, populated_only: bool) -> Result<FeatureStack> {
    let stack = FeatureStack::from_factors(&surfaces.factors)?;
    Ok(if populated_only {
        stack.masked(&surfaces.mask)?
    } else {
        stack
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Susceptibility { rasters, output } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let surfaces = build_surfaces(&rasters)?;
            let population_by_zone = surfaces.mask.population_by_zone(&surfaces.global_zones)?;

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            writer.write_raster("susceptibility", surfaces.global.raster())?;
            writer.write_raster("susceptibility_populated", surfaces.populated.raster())?;
            writer.write_raster("zones", &surfaces.global_zones.to_raster())?;
            writer.write_raster("zones_populated", &surfaces.populated_zones.to_raster())?;

            let weights = composite_weights(&rasters)?;
            writer.write_json(
                "zones",
                &ZoneSummary {
                    weights: weights.as_slice(),
                    global_zones: surfaces.global_zones.counts(),
                    populated_zones: surfaces.populated_zones.counts(),
                    population_by_zone,
                    population_percentages: Zone::ALL
                        .iter()
                        .map(|&z| (z.to_string(), population_by_zone.percentage(z)))
                        .collect(),
                },
            )?;

            let grid = surfaces.factors.grid();
            let out = SusceptibilityOutput {
                experiment: output.experiment,
                rows: grid.rows(),
                cols: grid.cols(),
                global_zones: surfaces.global_zones.counts(),
                populated_zones: surfaces.populated_zones.counts(),
                populated_cells: surfaces.mask.populated_cells(),
                population_by_zone,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Validate {
            rasters,
            incidents,
            study_area,
            output,
        } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let surfaces = build_surfaces(&rasters)?;
            let area = read_study_area(&study_area)?;
            let observed = read_incidents(&incidents)?;
            let observed_populated = observed.populated(&surfaces.mask);

            let synthetic = area.generate(
                &SyntheticConfig::new(observed.len())
                    .context("no incidents left after filtering")?
                    .with_seed(cli.seed),
            );
            let synthetic_populated = area.generate_populated(
                &SyntheticConfig::new(observed_populated.len())
                    .context("no incident falls on a populated pixel")?
                    .with_seed(cli.seed),
                &surfaces.mask,
            )?;

            let report = validate_both(
                ScopeInputs {
                    susceptibility: surfaces.global.raster(),
                    zones: &surfaces.global_zones,
                    observed: &observed,
                    synthetic: &synthetic,
                },
                ScopeInputs {
                    susceptibility: surfaces.populated.raster(),
                    zones: &surfaces.populated_zones,
                    observed: &observed_populated,
                    synthetic: &synthetic_populated,
                },
            )
            .context("validation failed")?;

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            writer.write_validation(&report)?;

            let out = ValidateOutput {
                experiment: output.experiment,
                observed: observed.len(),
                observed_populated: observed_populated.len(),
                global_chi_square: report.global.chi_square.statistic,
                populated_chi_square: report.populated.chi_square.statistic,
                global_f1: report.global.metrics.f1,
                populated_f1: report.populated.metrics.f1,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Train {
            rasters,
            incidents,
            study_area,
            populated_only,
            n_trees,
            split_ratio,
            output,
        } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let surfaces = build_surfaces(&rasters)?;
            let area = read_study_area(&study_area)?;
            let observed = read_incidents(&incidents)?;

            let (positives, negatives) = if populated_only {
                let positives = observed.populated(&surfaces.mask);
                let config = SyntheticConfig::new(positives.len())
                    .context("no incident falls on a populated pixel")?
                    .with_seed(cli.seed);
                let negatives = area.generate_populated(&config, &surfaces.mask)?;
                (positives, negatives)
            } else {
                let config = SyntheticConfig::new(observed.len())
                    .context("no incidents left after filtering")?
                    .with_seed(cli.seed);
                let negatives = area.generate(&config);
                (observed, negatives)
            };

            let stack = feature_stack(&surfaces, populated_only)?;
            let set = TrainingSet::from_points(&stack, &positives, &negatives);
            if set.dropped() > 0 {
                warn!(dropped = set.dropped(), "records without full feature coverage dropped");
            }

            let config = ClassifierConfig::new()
                .with_n_trees(n_trees)?
                .with_split_ratio(split_ratio)?
                .with_seed(cli.seed);
            let trained = scarp_model::train(&set, &config).context("classifier training failed")?;

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            trained
                .forest
                .save(writer.model_path())
                .context("failed to save model")?;
            info!(path = %writer.model_path().display(), "model saved");
            writer.write_json("evaluation", &trained.evaluation)?;

            let classified = scarp_model::apply(&trained.forest, &stack)?;
            writer.write_raster("probability", &classified.probability)?;
            writer.write_raster("classified", &classified.labels)?;

            let out = TrainOutput {
                experiment: output.experiment,
                train_records: trained.evaluation.train_records,
                validation_records: trained.evaluation.validation_records,
                dropped_records: trained.evaluation.dropped_records,
                accuracy: trained.evaluation.metrics.accuracy,
                oob_accuracy: trained.evaluation.oob.as_ref().map(|o| o.accuracy),
                n_trees: trained.forest.n_trees(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Classify {
            rasters,
            model,
            populated_only,
            output,
        } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let forest = RandomForest::load(&model).context("failed to load model")?;
            info!(
                n_trees = forest.n_trees(),
                n_features = forest.n_features(),
                "model loaded"
            );
            let surfaces = build_surfaces(&rasters)?;
            let stack = feature_stack(&surfaces, populated_only)?;
            let classified =
                scarp_model::apply(&forest, &stack).context("classification failed")?;

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            writer.write_raster("probability", &classified.probability)?;
            writer.write_raster("classified", &classified.labels)?;

            let out = ClassifyOutput {
                experiment: output.experiment,
                model_n_trees: forest.n_trees(),
                classified_pixels: classified.probability.valid_count(),
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Districts {
            rasters,
            incidents,
            districts,
            output,
        } => {
            let experiment_name = ExperimentName::new(output.experiment.clone())?;
            let surfaces = build_surfaces(&rasters)?;
            let observed = read_incidents(&incidents)?;
            let districts = BoundaryReader::new(&districts)
                .read_districts()
                .context("failed to read district polygons")?;

            let (stats, national) = district_statistics(
                &districts,
                surfaces.global.raster(),
                &surfaces.global_zones,
                &observed,
            )?;

            let writer = ResultWriter::new(&output.output_dir, experiment_name)?;
            writer.write_districts(&stats, &national)?;

            let out = DistrictsOutput {
                experiment: output.experiment,
                n_districts: stats.len(),
                national_mean_susceptibility: national.mean_susceptibility,
                total_incidents: national.total_incidents,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }

    Ok(())
}
