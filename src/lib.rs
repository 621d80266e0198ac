//! DGGRID Core - Grid Configuration Compiler and Engine Runner
//!
//! Translates a validated discrete global grid description into the DGGRID
//! engine's metafile format, runs the engine, and interprets its output.
//!
//! Flow: `construct`/`select` -> `Dggs` -> metafile compiler -> runner -> result.
//!
//! The runner is synchronous and blocking. Runs that share a working directory
//! share one control file and must be serialized by the caller.

pub mod error;
pub mod registry;
pub mod dggs;
pub mod validation;
pub mod construct;
pub mod metafile;
pub mod runner;
pub mod stats;
pub mod hashing;
pub mod config;
pub mod pipeline;

pub use error::{DggridError, Result};
pub use registry::{
    AddressType, ApertureType, BinCoverage, CellOutputControl, ClipSubsetType, MetafileKey,
    Operation, OrientSpecifyType, OutputType, Projection, ResSpecifyType, RoundingMode, Topology,
};
pub use dggs::{Dggs, Field, GridType, Value};
pub use construct::{construct, select, verify, ConstructParams, SelectOverrides};
pub use metafile::{
    BinningConfig, ClipConfig, MetafileLines, OutputConfig, OutputSpec, PointTransformConfig,
};
pub use runner::{EngineRunner, RunOutcome, METAFILE_NAME};
pub use stats::{GridStats, StatsTable};
pub use config::RunnerConfig;
pub use pipeline::{Dggrid, RunResult};
