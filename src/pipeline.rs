//! Operation Pipeline - One Entry Point per Engine Operation
//!
//! Every operation compiles its metafile completely before the engine is
//! touched. A validation error therefore never leaves a partial control file
//! behind, and engine errors are only raised after the process has exited.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, info_span};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::dggs::Dggs;
use crate::error::{DggridError, Result};
use crate::hashing::metafile_digest;
use crate::metafile::{
    compile_bin_point_presence, compile_bin_point_vals, compile_generate_grid,
    compile_output_stats, compile_transform_points, BinningConfig, ClipConfig, MetafileLines,
    OutputConfig, PointTransformConfig,
};
use crate::registry::Operation;
use crate::runner::{EngineRunner, RunOutcome};
use crate::stats::{parse_grid_stats, GridStats};

const LOG_UNAVAILABLE: &str = "log unavailable, set capture_logs on the runner configuration";

/// Result of one successful engine run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult<T> {
    pub run_id: Uuid,
    pub operation: Operation,
    pub metafile: MetafileLines,
    pub metafile_digest: String,
    pub output_config: T,
    pub exit_code: i32,
    pub captured_log: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The DGGRID operations.
pub struct Dggrid {
    runner: EngineRunner,
}

impl Dggrid {
    pub fn new(config: RunnerConfig) -> Self {
        Self { runner: EngineRunner::new(config) }
    }

    pub fn runner(&self) -> &EngineRunner {
        &self.runner
    }

    pub fn is_runnable(&self) -> bool {
        self.runner.is_runnable()
    }

    /// Grid generation: cells of a DGG over the whole earth or a clip region.
    pub fn grid_gen(
        &mut self,
        dggs: &Dggs,
        clip: &ClipConfig,
        output: &OutputConfig,
    ) -> Result<RunResult<OutputConfig>> {
        let metafile = compile_generate_grid(dggs, clip, output)?;
        self.run(Operation::GenerateGrid, metafile, |_| output.clone())
    }

    /// Output grid statistics: a per-resolution table of cell counts and sizes.
    ///
    /// Log capture is forced on for this run and restored afterwards.
    pub fn grid_stats(&mut self, dggs: &Dggs) -> Result<RunResult<GridStats>> {
        let metafile = compile_output_stats(dggs)?;

        let saved = self.runner.capture_logs();
        self.runner.set_capture_logs(true);
        let result = self.run(Operation::OutputStats, metafile, |outcome| {
            parse_grid_stats(outcome.log.as_deref().unwrap_or_default())
        });
        self.runner.set_capture_logs(saved);
        result
    }

    /// Address conversion of a point file.
    pub fn coord_conversion(
        &mut self,
        dggs: &Dggs,
        config: &PointTransformConfig,
    ) -> Result<RunResult<PointTransformConfig>> {
        let metafile = compile_transform_points(dggs, config)?;
        self.run(Operation::TransformPoints, metafile, |_| config.clone())
    }

    /// Mean of point values per cell.
    pub fn point_value_binning(
        &mut self,
        dggs: &Dggs,
        config: &BinningConfig,
    ) -> Result<RunResult<BinningConfig>> {
        let metafile = compile_bin_point_vals(dggs, config)?;
        self.run(Operation::BinPointVals, metafile, |_| config.clone())
    }

    /// Per-cell presence vector of point classes, one class per input file.
    pub fn presence_binning(
        &mut self,
        dggs: &Dggs,
        config: &BinningConfig,
    ) -> Result<RunResult<BinningConfig>> {
        let metafile = compile_bin_point_presence(dggs, config)?;
        self.run(Operation::BinPointPresence, metafile, |_| config.clone())
    }

    fn run<T>(
        &mut self,
        operation: Operation,
        metafile: MetafileLines,
        interpret: impl FnOnce(&RunOutcome) -> T,
    ) -> Result<RunResult<T>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("dggrid_run", %run_id, %operation);
        let _guard = span.enter();

        let digest = metafile_digest(&metafile);
        info!(metafile_digest = %digest, lines = metafile.len(), "starting DGGRID run");

        let started_at = Utc::now();
        let outcome = self.runner.execute(&metafile)?;
        let finished_at = Utc::now();

        let exit_code = match (outcome.success, outcome.exit_code) {
            (true, Some(code)) => code,
            _ => {
                return Err(DggridError::EngineExecutionFailed {
                    exit_code: outcome.exit_code,
                    log: outcome.log.clone().unwrap_or_else(|| LOG_UNAVAILABLE.to_string()),
                });
            }
        };

        let output_config = interpret(&outcome);
        Ok(RunResult {
            run_id,
            operation,
            metafile,
            metafile_digest: digest,
            output_config,
            exit_code,
            captured_log: outcome.log,
            started_at,
            finished_at,
        })
    }
}

impl Default for Dggrid {
    fn default() -> Self {
        Self::new(RunnerConfig::default())
    }
}
