//! DGGRID CLI - compile metafiles and drive the DGGRID engine
//!
//! Commands: check, generate, stats, transform, bin-vals, bin-presence
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on configuration errors, 1 on engine failures

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use dggrid_core::{
    construct,
    construct::DEFAULT_PRECISION,
    metafile::{
        compile_bin_point_presence, compile_bin_point_vals, compile_generate_grid,
        compile_output_stats, compile_transform_points,
    },
    select, AddressType, BinningConfig, ClipConfig, ClipSubsetType, ConstructParams, Dggrid,
    DggridError, Dggs, GridType, MetafileLines, OutputConfig, PointTransformConfig, Projection,
    RunnerConfig, SelectOverrides, Topology,
};

#[derive(Parser)]
#[command(name = "dggrid-cli", version)]
#[command(about = "DGGRID CLI - grid configuration compiler and engine runner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Runner configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// DGGRID executable name or path
    #[arg(long, env = "DGGRID_PATH")]
    executable: Option<PathBuf>,

    /// Directory the engine runs in
    #[arg(long, env = "DGGRID_WORKING_DIR")]
    working_dir: Option<PathBuf>,

    /// Do not echo engine output
    #[arg(long)]
    silent: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the engine executable can be found and run
    Check,

    /// Generate grid cells
    Generate {
        #[command(flatten)]
        grid: GridArgs,

        #[arg(long, default_value = "WHOLE_EARTH")]
        clip_subset_type: ClipSubsetType,

        #[arg(long)]
        clip_region_files: Option<String>,

        /// Output directive as key=value, e.g. cell_output_type=TEXT (repeatable)
        #[arg(short, long = "output", value_parser = parse_pair)]
        outputs: Vec<(String, String)>,

        /// Print the metafile instead of running the engine
        #[arg(long)]
        dry_run: bool,
    },

    /// Output the grid statistics table
    Stats {
        #[command(flatten)]
        grid: GridArgs,

        #[arg(long)]
        dry_run: bool,
    },

    /// Convert point addresses
    Transform {
        #[command(flatten)]
        grid: GridArgs,

        #[arg(long)]
        input: String,

        #[arg(long, default_value = "GEO")]
        input_address_type: AddressType,

        #[arg(long)]
        output_file: String,

        #[arg(long, default_value = "SEQNUM")]
        output_address_type: AddressType,

        #[arg(long)]
        dry_run: bool,
    },

    /// Bin point values into cells (mean per cell)
    BinVals {
        #[command(flatten)]
        bin: BinArgs,
    },

    /// Bin point class presence into cells
    BinPresence {
        #[command(flatten)]
        bin: BinArgs,
    },
}

#[derive(Args)]
struct GridArgs {
    /// Grid name: ISEA3H, FULLER4D, SUPERFUND, PLANETRISK, CUSTOM, ...
    #[arg(short, long)]
    grid: String,

    #[arg(short, long)]
    resolution: Option<u32>,

    #[arg(long)]
    precision: Option<u32>,

    #[arg(long)]
    area: Option<f64>,

    #[arg(long)]
    spacing: Option<f64>,

    #[arg(long)]
    cls: Option<f64>,

    /// Number of aperture 4 resolutions for 43H grids
    #[arg(long)]
    mixed_aperture_level: Option<u32>,

    /// CUSTOM grids only
    #[arg(long, default_value = "ISEA")]
    projection: Projection,

    /// CUSTOM grids only
    #[arg(long, default_value = "HEXAGON")]
    topology: Topology,

    /// CUSTOM grids only
    #[arg(long, default_value_t = 3)]
    aperture: u32,
}

impl GridArgs {
    fn build(&self) -> dggrid_core::Result<Dggs> {
        if GridType::parse(&self.grid).ok() == Some(GridType::Custom) {
            return construct(&ConstructParams {
                grid_type: GridType::Custom,
                projection: self.projection,
                topology: self.topology,
                aperture: self.aperture,
                resolution: self.resolution,
                area: self.area,
                spacing: self.spacing,
                cls: self.cls,
                precision: self.precision.unwrap_or(DEFAULT_PRECISION),
                mixed_aperture_level: self.mixed_aperture_level,
                ..Default::default()
            });
        }

        select(
            &self.grid,
            &SelectOverrides {
                resolution: self.resolution,
                precision: self.precision,
                area: self.area,
                spacing: self.spacing,
                cls_distance: self.cls,
                mixed_aperture_level: self.mixed_aperture_level,
            },
        )
    }
}

#[derive(Args)]
struct BinArgs {
    #[command(flatten)]
    grid: GridArgs,

    /// Input point files
    #[arg(long = "input", required = true)]
    inputs: Vec<String>,

    #[arg(long)]
    output_file: String,

    #[arg(long)]
    dry_run: bool,
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", s))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn runner_config(cli: &Cli) -> Result<RunnerConfig> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load_from_file(path)
            .with_context(|| format!("Failed to load runner config {}", path.display()))?,
        None => RunnerConfig::default(),
    };
    if let Some(exe) = &cli.executable {
        config.executable = exe.clone();
    }
    if let Some(dir) = &cli.working_dir {
        config.working_dir = dir.clone();
    }
    if cli.silent {
        config.silent = true;
    }
    Ok(config)
}

fn dry_run(metafile: &MetafileLines) -> serde_json::Value {
    json!({
        "success": true,
        "metafile": metafile,
        "metafile_digest": dggrid_core::hashing::metafile_digest(metafile),
    })
}

fn run(cli: Cli) -> Result<serde_json::Value> {
    let config = runner_config(&cli)?;
    let mut dggrid = Dggrid::new(config);

    let value = match cli.command {
        Commands::Check => {
            let resolved = dggrid.runner().resolve_executable();
            json!({
                "runnable": resolved.is_some(),
                "executable": resolved.map(|p| p.display().to_string()),
            })
        }

        Commands::Generate { grid, clip_subset_type, clip_region_files, outputs, dry_run: dry } => {
            let dggs = grid.build()?;
            let clip = ClipConfig { clip_subset_type, clip_region_files };
            let output = OutputConfig::from_pairs(outputs)?;
            if dry {
                dry_run(&compile_generate_grid(&dggs, &clip, &output)?)
            } else {
                json!({ "success": true, "result": dggrid.grid_gen(&dggs, &clip, &output)? })
            }
        }

        Commands::Stats { grid, dry_run: dry } => {
            let dggs = grid.build()?;
            if dry {
                dry_run(&compile_output_stats(&dggs)?)
            } else {
                json!({ "success": true, "result": dggrid.grid_stats(&dggs)? })
            }
        }

        Commands::Transform {
            grid,
            input,
            input_address_type,
            output_file,
            output_address_type,
            dry_run: dry,
        } => {
            let dggs = grid.build()?;
            let config = PointTransformConfig {
                input_address_type,
                output_address_type,
                ..PointTransformConfig::geo_to_seqnum(input, output_file)
            };
            if dry {
                dry_run(&compile_transform_points(&dggs, &config)?)
            } else {
                json!({ "success": true, "result": dggrid.coord_conversion(&dggs, &config)? })
            }
        }

        Commands::BinVals { bin } => {
            let dggs = bin.grid.build()?;
            let config = BinningConfig::new(bin.inputs, bin.output_file);
            if bin.dry_run {
                dry_run(&compile_bin_point_vals(&dggs, &config)?)
            } else {
                json!({ "success": true, "result": dggrid.point_value_binning(&dggs, &config)? })
            }
        }

        Commands::BinPresence { bin } => {
            let dggs = bin.grid.build()?;
            let config = BinningConfig::new(bin.inputs, bin.output_file);
            if bin.dry_run {
                dry_run(&compile_bin_point_presence(&dggs, &config)?)
            } else {
                json!({ "success": true, "result": dggrid.presence_binning(&dggs, &config)? })
            }
        }
    };
    Ok(value)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match run(cli) {
        Ok(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(text) => println!("{}", text),
                Err(e) => {
                    eprintln!("failed to encode result: {}", e);
                    return ExitCode::FAILURE;
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            let output = json!({ "success": false, "error": format!("{:#}", e) });
            println!("{}", output);
            match e.downcast_ref::<DggridError>() {
                Some(DggridError::EngineExecutionFailed { .. } | DggridError::EngineNotRunnable(_)) => {
                    ExitCode::FAILURE
                }
                _ => ExitCode::from(2),
            }
        }
    }
}
