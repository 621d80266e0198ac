//! Metafile Compiler
//!
//! Pure mapping from a `Dggs` plus operation options to the engine's
//! `key value` control-file lines. Every key is a `MetafileKey`, and the same
//! inputs always produce the same lines in the same order.

use serde::{Serialize, Serializer};
use std::fmt;
use tracing::debug;

use crate::construct::{
    bool_flag, specify_orientation, specify_resolution, specify_topo_aperture, OrientationSpec,
    ResolutionSpec, TopoApertureOptions, DEFAULT_AZIMUTH_DEG, DEFAULT_POLE_LAT_DEG,
    DEFAULT_POLE_LON_DEG,
};
use crate::dggs::{Dggs, Field, GridType, MIXED_43_APERTURE};
use crate::error::{DggridError, Result};
use crate::registry::{
    AddressType, ApertureType, BinCoverage, CellOutputControl, ClipSubsetType, MetafileKey,
    Operation, OutputType, RoundingMode,
};

/// Fields copied verbatim into every metafile, with their engine keys.
const FIELD_KEYS: &[(Field, MetafileKey)] = &[
    (Field::Resolution, MetafileKey::DggsResSpec),
    (Field::Precision, MetafileKey::Precision),
    (Field::Area, MetafileKey::DggsResSpecifyArea),
    (Field::ClsDistance, MetafileKey::DggsResSpecifyIntercellDistance),
    (Field::MixedApertureLevel, MetafileKey::DggsNumAperture4Res),
];

/// Ordered control-file directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetafileLines {
    entries: Vec<(MetafileKey, String)>,
}

impl MetafileLines {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: MetafileKey, value: impl fmt::Display) -> &mut Self {
        self.entries.push((key, value.to_string()));
        self
    }

    pub fn extend(&mut self, entries: impl IntoIterator<Item = (MetafileKey, String)>) -> &mut Self {
        self.entries.extend(entries);
        self
    }

    pub fn contains(&self, key: MetafileKey) -> bool {
        self.entries.iter().any(|(k, _)| *k == key)
    }

    /// Value of the first directive with `key`.
    pub fn get(&self, key: MetafileKey) -> Option<&str> {
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(MetafileKey, String)> {
        self.entries.iter()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(|(k, v)| format!("{} {}", k, v)).collect()
    }

    /// File contents: one directive per line, newline terminated.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

impl Serialize for MetafileLines {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.lines())
    }
}

/// Grid description lines shared by every operation.
pub fn grid_meta(dggs: &Dggs) -> Result<MetafileLines> {
    let mut lines = MetafileLines::new();
    lines.push(MetafileKey::DggsType, dggs.grid_type());

    if dggs.grid_type() == GridType::Custom {
        lines.extend(custom_structure(dggs)?);
    }

    for (field, key) in FIELD_KEYS {
        if lines.contains(*key) {
            continue;
        }
        if let Some(value) = dggs.value(*field) {
            lines.push(*key, value);
        }
    }
    Ok(lines)
}

/// Projection, topology/aperture, orientation and resolution type of a CUSTOM grid.
fn custom_structure(dggs: &Dggs) -> Result<Vec<(MetafileKey, String)>> {
    let projection = dggs
        .projection()
        .ok_or_else(|| DggridError::invalid("CUSTOM grid without projection"))?;
    let topology = dggs
        .topology()
        .ok_or_else(|| DggridError::invalid("CUSTOM grid without topology"))?;
    let aperture = dggs
        .aperture()
        .and_then(|a| u32::try_from(a).ok())
        .ok_or_else(|| DggridError::invalid("CUSTOM grid without a valid aperture"))?;

    let aperture_type = if aperture == MIXED_43_APERTURE {
        ApertureType::Mixed43
    } else {
        ApertureType::Pure
    };
    let options = TopoApertureOptions {
        num_aperture_4_res: dggs
            .value(Field::MixedApertureLevel)
            .and_then(|v| v.as_i64())
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0),
        ..Default::default()
    };
    let topo = specify_topo_aperture(topology, aperture_type, aperture, &options)?;

    let orientation = OrientationSpec::Specified {
        vert0_lon: dggs.float(Field::PoleLonDeg).unwrap_or(DEFAULT_POLE_LON_DEG),
        vert0_lat: dggs.float(Field::PoleLatDeg).unwrap_or(DEFAULT_POLE_LAT_DEG),
        vert0_azimuth: dggs.float(Field::AzimuthDeg).unwrap_or(DEFAULT_AZIMUTH_DEG),
    };

    let round_down = dggs.rounding() != RoundingMode::Up;
    let resolution = if let Some(res) = dggs.resolution() {
        let resolution = u32::try_from(res)
            .map_err(|_| DggridError::invalid(format!("negative resolution {}", res)))?;
        ResolutionSpec::Specified { resolution }
    } else if let Some(area_km2) = dggs.float(Field::Area) {
        ResolutionSpec::CellArea { area_km2, round_down }
    } else if let Some(distance_km) = dggs.float(Field::ClsDistance) {
        ResolutionSpec::IntercellDistance { distance_km, round_down }
    } else {
        return Err(DggridError::invalid("CUSTOM grid without resolution, area or cls"));
    };

    let mut entries = specify_resolution(projection, resolution)?;
    entries.extend(topo.entries());
    entries.extend(specify_orientation(orientation));
    Ok(entries)
}

fn operation_header(operation: Operation) -> MetafileLines {
    let mut lines = MetafileLines::new();
    lines.push(MetafileKey::DggridOperation, operation);
    lines
}

// --- Clip and output configuration ---

/// Spatial extent of a grid generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipConfig {
    pub clip_subset_type: ClipSubsetType,
    pub clip_region_files: Option<String>,
}

impl ClipConfig {
    pub fn whole_earth() -> Self {
        Self { clip_subset_type: ClipSubsetType::WholeEarth, clip_region_files: None }
    }

    pub fn region(clip_subset_type: ClipSubsetType, files: impl Into<String>) -> Self {
        Self { clip_subset_type, clip_region_files: Some(files.into()) }
    }

    /// Build from external `key=value` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut subset_type = None;
        let mut region_files = None;
        for (key, value) in pairs {
            match key.as_ref().parse::<MetafileKey>()? {
                MetafileKey::ClipSubsetType => subset_type = Some(value.as_ref().parse()?),
                MetafileKey::ClipRegionFiles => region_files = Some(value.as_ref().to_string()),
                other => {
                    return Err(DggridError::invalid(format!("'{}' is not a clip key", other)));
                }
            }
        }
        let clip_subset_type =
            subset_type.ok_or_else(|| DggridError::invalid("clip_subset_type is required"))?;
        Ok(Self { clip_subset_type, clip_region_files: region_files })
    }

    fn entries(&self) -> Result<Vec<(MetafileKey, String)>> {
        let mut entries = vec![(MetafileKey::ClipSubsetType, self.clip_subset_type.to_string())];
        match self.clip_subset_type {
            ClipSubsetType::WholeEarth => {}
            ClipSubsetType::Shapefile | ClipSubsetType::Aigen | ClipSubsetType::Gdal => {
                let files = self
                    .clip_region_files
                    .as_deref()
                    .map(str::trim)
                    .filter(|f| !f.is_empty())
                    .ok_or_else(|| {
                        DggridError::invalid(format!(
                            "clip_subset_type {} requires clip_region_files",
                            self.clip_subset_type
                        ))
                    })?;
                entries.push((MetafileKey::ClipRegionFiles, files.to_string()));
            }
            ClipSubsetType::Seqnums => {
                return Err(DggridError::not_implemented("clip_subset_type SEQNUMS"));
            }
        }
        Ok(entries)
    }
}

/// One of the cell or point output sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    pub output_type: OutputType,
    pub file_name: Option<String>,
    pub gdal_format: Option<String>,
}

impl OutputSpec {
    pub fn file(output_type: OutputType, file_name: impl Into<String>) -> Self {
        Self { output_type, file_name: Some(file_name.into()), gdal_format: None }
    }

    pub fn gdal(format: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            output_type: OutputType::Gdal,
            file_name: Some(file_name.into()),
            gdal_format: Some(format.into()),
        }
    }

    pub fn none() -> Self {
        Self { output_type: OutputType::None, file_name: None, gdal_format: None }
    }

    fn entries(&self, keys: [MetafileKey; 3], section: &str) -> Result<Vec<(MetafileKey, String)>> {
        let [type_key, file_key, format_key] = keys;
        let mut entries = vec![(type_key, self.output_type.to_string())];
        if !self.output_type.needs_file_name() {
            return Ok(entries);
        }

        let file_name = non_empty(&self.file_name).ok_or_else(|| {
            DggridError::invalid(format!("{} output {} requires a file name", section, self.output_type))
        })?;
        entries.push((file_key, file_name.to_string()));

        match (self.output_type, non_empty(&self.gdal_format)) {
            (_, Some(format)) => entries.push((format_key, format.to_string())),
            (OutputType::Gdal, None) => {
                return Err(DggridError::invalid(format!("{} output GDAL requires a gdal format", section)));
            }
            _ => {}
        }
        Ok(entries)
    }
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

const CELL_KEYS: [MetafileKey; 3] = [
    MetafileKey::CellOutputType,
    MetafileKey::CellOutputFileName,
    MetafileKey::CellOutputGdalFormat,
];

const POINT_KEYS: [MetafileKey; 3] = [
    MetafileKey::PointOutputType,
    MetafileKey::PointOutputFileName,
    MetafileKey::PointOutputGdalFormat,
];

/// Output files of a grid generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutputConfig {
    pub cell: Option<OutputSpec>,
    pub point: Option<OutputSpec>,
    /// Emitted only alongside a cell section.
    pub cell_output_control: Option<CellOutputControl>,
}

impl OutputConfig {
    pub fn cells(spec: OutputSpec) -> Self {
        Self { cell: Some(spec), ..Default::default() }
    }

    /// Build from external `cell_output_*` / `point_output_*` pairs.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        #[derive(Default)]
        struct Partial {
            output_type: Option<OutputType>,
            file_name: Option<String>,
            gdal_format: Option<String>,
        }

        impl Partial {
            fn finish(self, section: &str) -> Result<Option<OutputSpec>> {
                match self.output_type {
                    Some(output_type) => Ok(Some(OutputSpec {
                        output_type,
                        file_name: self.file_name,
                        gdal_format: self.gdal_format,
                    })),
                    None if self.file_name.is_none() && self.gdal_format.is_none() => Ok(None),
                    None => Err(DggridError::invalid(format!("{}_output_type is required", section))),
                }
            }
        }

        let mut cell = Partial::default();
        let mut point = Partial::default();
        let mut control = None;
        for (key, value) in pairs {
            let key = key.as_ref().parse::<MetafileKey>()?;
            let value = value.as_ref();
            match key {
                MetafileKey::CellOutputType => cell.output_type = Some(value.parse()?),
                MetafileKey::CellOutputFileName => cell.file_name = Some(value.to_string()),
                MetafileKey::CellOutputGdalFormat => cell.gdal_format = Some(value.to_string()),
                MetafileKey::CellOutputControl => control = Some(value.parse()?),
                MetafileKey::PointOutputType => point.output_type = Some(value.parse()?),
                MetafileKey::PointOutputFileName => point.file_name = Some(value.to_string()),
                MetafileKey::PointOutputGdalFormat => point.gdal_format = Some(value.to_string()),
                other => {
                    return Err(DggridError::invalid(format!("'{}' is not an output key", other)));
                }
            }
        }

        let cell = cell.finish("cell")?;
        if control.is_some() && cell.is_none() {
            return Err(DggridError::invalid("cell_output_control requires cell_output_type"));
        }
        Ok(Self { cell, point: point.finish("point")?, cell_output_control: control })
    }

    fn entries(&self) -> Result<Vec<(MetafileKey, String)>> {
        let mut entries = vec![];
        if let Some(cell) = &self.cell {
            entries.extend(cell.entries(CELL_KEYS, "cell")?);
            if let Some(control) = self.cell_output_control {
                entries.push((MetafileKey::CellOutputControl, control.to_string()));
            }
        }
        if let Some(point) = &self.point {
            entries.extend(point.entries(POINT_KEYS, "point")?);
        }
        Ok(entries)
    }
}

// --- Point file operations ---

fn delimiter(c: char) -> String {
    format!("\"{}\"", c)
}

fn require_file(name: &str, what: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DggridError::invalid(format!("{} must not be empty", what)));
    }
    Ok(trimmed.to_string())
}

/// Address conversion of a point file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointTransformConfig {
    pub input_file_name: String,
    pub input_address_type: AddressType,
    pub input_delimiter: char,
    pub output_file_name: String,
    pub output_address_type: AddressType,
    pub output_delimiter: char,
}

impl PointTransformConfig {
    /// GEO points to sequence numbers, space delimited.
    pub fn geo_to_seqnum(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input_file_name: input.into(),
            input_address_type: AddressType::Geo,
            input_delimiter: ' ',
            output_file_name: output.into(),
            output_address_type: AddressType::Seqnum,
            output_delimiter: ' ',
        }
    }

    fn entries(&self) -> Result<Vec<(MetafileKey, String)>> {
        Ok(vec![
            (MetafileKey::InputFileName, require_file(&self.input_file_name, "input_file_name")?),
            (MetafileKey::InputAddressType, self.input_address_type.to_string()),
            (MetafileKey::InputDelimiter, delimiter(self.input_delimiter)),
            (MetafileKey::OutputFileName, require_file(&self.output_file_name, "output_file_name")?),
            (MetafileKey::OutputAddressType, self.output_address_type.to_string()),
            (MetafileKey::OutputDelimiter, delimiter(self.output_delimiter)),
        ])
    }
}

/// Point binning inputs and outputs. Input points are always GEO addressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BinningConfig {
    pub input_files: Vec<String>,
    pub input_delimiter: char,
    pub output_file_name: String,
    pub output_address_type: AddressType,
    pub output_delimiter: char,
    pub cell_output_control: CellOutputControl,
    pub bin_coverage: BinCoverage,
    /// Presence binning only.
    pub output_count: bool,
}

impl BinningConfig {
    pub fn new(input_files: Vec<String>, output_file_name: impl Into<String>) -> Self {
        Self {
            input_files,
            input_delimiter: ' ',
            output_file_name: output_file_name.into(),
            output_address_type: AddressType::Seqnum,
            output_delimiter: ' ',
            cell_output_control: CellOutputControl::OutputOccupied,
            bin_coverage: BinCoverage::Global,
            output_count: true,
        }
    }

    fn entries(&self, with_count: bool) -> Result<Vec<(MetafileKey, String)>> {
        let files: Vec<_> = self
            .input_files
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .collect();
        if files.is_empty() {
            return Err(DggridError::invalid("input_files must name at least one file"));
        }

        let mut entries = vec![
            (MetafileKey::InputFiles, files.join(" ")),
            (MetafileKey::InputAddressType, AddressType::Geo.to_string()),
            (MetafileKey::InputDelimiter, delimiter(self.input_delimiter)),
            (MetafileKey::OutputFileName, require_file(&self.output_file_name, "output_file_name")?),
            (MetafileKey::OutputAddressType, self.output_address_type.to_string()),
            (MetafileKey::OutputDelimiter, delimiter(self.output_delimiter)),
            (MetafileKey::CellOutputControl, self.cell_output_control.to_string()),
            (MetafileKey::BinCoverage, self.bin_coverage.to_string()),
        ];
        if with_count {
            entries.push((MetafileKey::OutputCount, bool_flag(self.output_count)));
        }
        Ok(entries)
    }
}

// --- Per-operation assembly ---

pub fn compile_generate_grid(dggs: &Dggs, clip: &ClipConfig, output: &OutputConfig) -> Result<MetafileLines> {
    let mut lines = operation_header(Operation::GenerateGrid);
    lines.extend(grid_meta(dggs)?.entries);
    lines.extend(clip.entries()?);
    lines.extend(output.entries()?);
    debug!(lines = lines.len(), "compiled GENERATE_GRID metafile");
    Ok(lines)
}

pub fn compile_output_stats(dggs: &Dggs) -> Result<MetafileLines> {
    let mut lines = operation_header(Operation::OutputStats);
    lines.extend(grid_meta(dggs)?.entries);
    Ok(lines)
}

pub fn compile_transform_points(dggs: &Dggs, config: &PointTransformConfig) -> Result<MetafileLines> {
    let mut lines = operation_header(Operation::TransformPoints);
    lines.extend(grid_meta(dggs)?.entries);
    lines.extend(config.entries()?);
    Ok(lines)
}

pub fn compile_bin_point_vals(dggs: &Dggs, config: &BinningConfig) -> Result<MetafileLines> {
    let mut lines = operation_header(Operation::BinPointVals);
    lines.extend(grid_meta(dggs)?.entries);
    lines.extend(config.entries(false)?);
    Ok(lines)
}

pub fn compile_bin_point_presence(dggs: &Dggs, config: &BinningConfig) -> Result<MetafileLines> {
    let mut lines = operation_header(Operation::BinPointPresence);
    lines.extend(grid_meta(dggs)?.entries);
    lines.extend(config.entries(true)?);
    Ok(lines)
}
