//! Construction and Selection
//!
//! Two factories produce a `Dggs`: `construct` from explicit low-level fields,
//! `select` from a named grid plus overrides. The `specify_*` builders turn
//! structural choices into metafile entries for CUSTOM grids.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dggs::{Dggs, Field, GridType, MIXED_43_APERTURE};
use crate::error::{DggridError, Result};
use crate::registry::{
    ApertureType, MetafileKey, OrientSpecifyType, Projection, ResSpecifyType, RoundingMode,
    Topology,
};
use crate::validation::{ValidationResult, ValidationViolation, Verifier};

pub const DEFAULT_PRECISION: u32 = 7;
pub const DEFAULT_POLE_LAT_DEG: f64 = 58.28252559;
pub const DEFAULT_POLE_LON_DEG: f64 = 11.25;
pub const DEFAULT_AZIMUTH_DEG: f64 = 0.0;
pub const DEFAULT_ORIENT_RAND_SEED: u64 = 42;
pub const DEFAULT_APERTURE_SEQUENCE: &str = "333333333333";
pub const DEFAULT_RESOLUTION: u32 = 9;
pub const DEFAULT_CELL_AREA_KM2: f64 = 120_000.0;
pub const DEFAULT_INTERCELL_DISTANCE_KM: f64 = 4_000.0;

/// Metafile entries produced by a builder, in emission order.
pub type Entries = Vec<(MetafileKey, String)>;

/// Low-level fields for `construct`. Exactly one of
/// `resolution`, `area`, `spacing`, `cls` must be set.
#[derive(Debug, Clone, Serialize)]
pub struct ConstructParams {
    pub grid_type: GridType,
    pub projection: Projection,
    pub aperture: u32,
    pub topology: Topology,
    pub resolution: Option<u32>,
    pub area: Option<f64>,
    pub spacing: Option<f64>,
    pub cls: Option<f64>,
    pub precision: u32,
    pub rounding: RoundingMode,
    pub metric: bool,
    pub show_info: bool,
    pub azimuth_deg: f64,
    pub pole_lat_deg: f64,
    pub pole_lon_deg: f64,
    /// Honoured only for 43 apertures.
    pub mixed_aperture_level: Option<u32>,
}

impl Default for ConstructParams {
    fn default() -> Self {
        Self {
            grid_type: GridType::Custom,
            projection: Projection::Isea,
            aperture: 3,
            topology: Topology::Hexagon,
            resolution: None,
            area: None,
            spacing: None,
            cls: None,
            precision: DEFAULT_PRECISION,
            rounding: RoundingMode::Nearest,
            metric: true,
            show_info: true,
            azimuth_deg: DEFAULT_AZIMUTH_DEG,
            pole_lat_deg: DEFAULT_POLE_LAT_DEG,
            pole_lon_deg: DEFAULT_POLE_LON_DEG,
            mixed_aperture_level: None,
        }
    }
}

/// Build a verified configuration from explicit fields.
pub fn construct(params: &ConstructParams) -> Result<Dggs> {
    let given = [
        params.resolution.is_some(),
        params.area.is_some(),
        params.spacing.is_some(),
        params.cls.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count();

    if given != 1 {
        return Err(DggridError::invalid(format!(
            "construct(): exactly one of resolution, area, spacing or cls must have a value, got {}",
            given
        )));
    }

    // A preset name fixes its own structure.
    let (projection, aperture, topology) = match params.grid_type {
        GridType::Preset { projection, aperture, topology } => {
            if (projection, aperture, topology) != (params.projection, params.aperture, params.topology) {
                debug!(grid_type = %params.grid_type, "structure fields taken from preset name");
            }
            (projection, aperture, topology)
        }
        _ => (params.projection, params.aperture, params.topology),
    };

    let mut dggs = Dggs::new(params.grid_type);
    dggs.set(Field::PoleLonDeg, params.pole_lon_deg)
        .set(Field::PoleLatDeg, params.pole_lat_deg)
        .set(Field::AzimuthDeg, params.azimuth_deg)
        .set(Field::Aperture, aperture)
        .set(Field::Resolution, 1)
        .set(Field::Topology, topology)
        .set(Field::Projection, projection)
        .set(Field::Precision, params.precision)
        .set(Field::RoundingMode, params.rounding)
        .set(Field::Metric, params.metric)
        .set(Field::ShowInfo, params.show_info);

    let resolution = match (params.resolution, params.area, params.spacing, params.cls) {
        (Some(res), ..) => res,
        (_, Some(area), ..) => closest_resolution_to_area(&dggs, area, params.rounding, params.metric)?,
        (_, _, Some(spacing), _) => {
            closest_resolution_to_spacing(&dggs, spacing, params.rounding, params.metric)?
        }
        (_, _, _, Some(cls)) => closest_resolution_to_cls(&dggs, cls, params.rounding, params.metric)?,
        (None, None, None, None) => {
            return Err(DggridError::invalid("construct(): no resolution source given"));
        }
    };
    dggs.set(Field::Resolution, resolution);
    if aperture == MIXED_43_APERTURE {
        if let Some(level) = params.mixed_aperture_level {
            dggs.set(Field::MixedApertureLevel, level);
        }
    }

    verify(&dggs)?;

    if params.show_info {
        info!(grid_type = %dggs.grid_type(), resolution, "constructed grid configuration");
    }
    Ok(dggs)
}

/// Run the structural verifier, failing on any error-level violation.
pub fn verify(dggs: &Dggs) -> Result<ValidationResult> {
    let result = Verifier::new().verify(dggs);
    if result.valid {
        Ok(result)
    } else {
        Err(DggridError::InvalidConfiguration(result.error_summary()))
    }
}

// TODO: derive resolutions from the engine's OUTPUT_STATS table once a
// per-grid stats cache exists; the three searches below depend on it.

pub fn closest_resolution_to_area(
    _dggs: &Dggs,
    _area: f64,
    _rounding: RoundingMode,
    _metric: bool,
) -> Result<u32> {
    Err(DggridError::not_implemented("closest_resolution_to_area"))
}

pub fn closest_resolution_to_spacing(
    _dggs: &Dggs,
    _spacing: f64,
    _rounding: RoundingMode,
    _metric: bool,
) -> Result<u32> {
    Err(DggridError::not_implemented("closest_resolution_to_spacing"))
}

pub fn closest_resolution_to_cls(
    _dggs: &Dggs,
    _cls: f64,
    _rounding: RoundingMode,
    _metric: bool,
) -> Result<u32> {
    Err(DggridError::not_implemented("closest_resolution_to_cls"))
}

/// Optional fields layered on top of a selected grid.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SelectOverrides {
    pub resolution: Option<u32>,
    pub precision: Option<u32>,
    pub area: Option<f64>,
    pub spacing: Option<f64>,
    pub cls_distance: Option<f64>,
    /// Honoured only for 43 apertures.
    pub mixed_aperture_level: Option<u32>,
}

impl SelectOverrides {
    fn apply(&self, dggs: &mut Dggs) {
        if let Some(v) = self.resolution {
            dggs.set(Field::Resolution, v);
        }
        if let Some(v) = self.precision {
            dggs.set(Field::Precision, v);
        }
        if let Some(v) = self.area {
            dggs.set(Field::Area, v);
        }
        if let Some(v) = self.spacing {
            dggs.set(Field::Spacing, v);
        }
        if let Some(v) = self.cls_distance {
            dggs.set(Field::ClsDistance, v);
        }
    }
}

/// Build a configuration from a grid name. No structural validation is applied.
pub fn select(name: &str, overrides: &SelectOverrides) -> Result<Dggs> {
    let grid_type = GridType::parse(name)?;

    let mut dggs = Dggs::new(grid_type);
    match grid_type {
        GridType::Superfund | GridType::PlanetRisk => {}
        GridType::Preset { projection, aperture, topology } => {
            dggs.set(Field::Projection, projection)
                .set(Field::Aperture, aperture)
                .set(Field::Topology, topology);
        }
        GridType::Custom => {
            return Err(DggridError::not_implemented(
                "select(CUSTOM): use construct() for manually specified grids",
            ));
        }
    }
    dggs.set(Field::Metric, true).set(Field::ShowInfo, true);
    overrides.apply(&mut dggs);

    if grid_type.is_mixed() {
        if let Some(level) = overrides.mixed_aperture_level {
            dggs.set(Field::MixedApertureLevel, level);
        }
    }

    debug!(grid_type = %grid_type, "selected grid configuration");
    Ok(dggs)
}

// --- Structural builders ---

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApertureSetting {
    Pure(u32),
    Mixed43 { num_aperture_4_res: u32 },
    Sequence(String),
}

#[derive(Debug, Clone)]
pub struct TopoApertureOptions {
    pub num_aperture_4_res: u32,
    pub aperture_sequence: String,
}

impl Default for TopoApertureOptions {
    fn default() -> Self {
        Self {
            num_aperture_4_res: 0,
            aperture_sequence: DEFAULT_APERTURE_SEQUENCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TopoApertureSpec {
    pub short_name: String,
    pub topology: Topology,
    pub aperture_type: ApertureType,
    pub aperture: ApertureSetting,
    /// Present when the requested aperture was replaced by a legal one.
    pub diagnostic: Option<ValidationViolation>,
}

impl TopoApertureSpec {
    pub fn entries(&self) -> Entries {
        let mut entries = vec![
            (MetafileKey::DggsTopology, self.topology.to_string()),
            (MetafileKey::DggsApertureType, self.aperture_type.to_string()),
        ];
        match &self.aperture {
            ApertureSetting::Pure(a) => entries.push((MetafileKey::DggsAperture, a.to_string())),
            ApertureSetting::Mixed43 { num_aperture_4_res } => {
                entries.push((MetafileKey::DggsNumAperture4Res, num_aperture_4_res.to_string()))
            }
            ApertureSetting::Sequence(seq) => {
                entries.push((MetafileKey::DggsApertureSequence, seq.clone()))
            }
        }
        entries
    }
}

/// Best-effort topology/aperture pairing.
///
/// An illegal PURE aperture is replaced by the nearest legal one (3 for
/// hexagons, 4 otherwise) and reported through `diagnostic`, not rejected.
pub fn specify_topo_aperture(
    topology: Topology,
    aperture_type: ApertureType,
    aperture: u32,
    options: &TopoApertureOptions,
) -> Result<TopoApertureSpec> {
    match aperture_type {
        ApertureType::Pure => {
            let (legal, fallback): (&[u32], u32) = match topology {
                Topology::Hexagon => (&[3, 4, 7], 3),
                Topology::Triangle | Topology::Diamond => (&[4], 4),
            };
            let (value, diagnostic) = if legal.contains(&aperture) {
                (aperture, None)
            } else {
                warn!(%topology, aperture, fallback, "aperture not possible for topology, substituting");
                let violation = ValidationViolation::warning(
                    "topo_aperture",
                    format!("combo not possible / {} {} / setting {}{}", topology, aperture, fallback, topology.letter()),
                    format!("{:?}", legal),
                    aperture.to_string(),
                );
                (fallback, Some(violation))
            };
            Ok(TopoApertureSpec {
                short_name: format!("{}{}", value, topology.letter()),
                topology,
                aperture_type,
                aperture: ApertureSetting::Pure(value),
                diagnostic,
            })
        }
        ApertureType::Mixed43 => {
            if topology != Topology::Hexagon {
                return Err(DggridError::not_implemented(format!(
                    "MIXED43 apertures on {} topology",
                    topology
                )));
            }
            Ok(TopoApertureSpec {
                short_name: format!("{}H", MIXED_43_APERTURE),
                topology,
                aperture_type,
                aperture: ApertureSetting::Mixed43 {
                    num_aperture_4_res: options.num_aperture_4_res,
                },
                diagnostic: None,
            })
        }
        ApertureType::Sequence => {
            let seq = options.aperture_sequence.trim();
            if seq.is_empty() || !seq.chars().all(|c| c.is_ascii_digit()) {
                return Err(DggridError::invalid(format!(
                    "aperture sequence must be a non-empty digit string, got '{}'",
                    options.aperture_sequence
                )));
            }
            Ok(TopoApertureSpec {
                short_name: format!("SEQ{}", topology.letter()),
                topology,
                aperture_type,
                aperture: ApertureSetting::Sequence(seq.to_string()),
                diagnostic: None,
            })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSpec {
    Specified { resolution: u32 },
    CellArea { area_km2: f64, round_down: bool },
    IntercellDistance { distance_km: f64, round_down: bool },
}

impl ResolutionSpec {
    pub fn default_for(specify_type: ResSpecifyType) -> Self {
        match specify_type {
            ResSpecifyType::Specified => ResolutionSpec::Specified { resolution: DEFAULT_RESOLUTION },
            ResSpecifyType::CellArea => ResolutionSpec::CellArea {
                area_km2: DEFAULT_CELL_AREA_KM2,
                round_down: true,
            },
            ResSpecifyType::IntercellDistance => ResolutionSpec::IntercellDistance {
                distance_km: DEFAULT_INTERCELL_DISTANCE_KM,
                round_down: true,
            },
        }
    }

    pub fn specify_type(&self) -> ResSpecifyType {
        match self {
            ResolutionSpec::Specified { .. } => ResSpecifyType::Specified,
            ResolutionSpec::CellArea { .. } => ResSpecifyType::CellArea,
            ResolutionSpec::IntercellDistance { .. } => ResSpecifyType::IntercellDistance,
        }
    }
}

/// Projection plus resolution entries for a CUSTOM grid.
pub fn specify_resolution(projection: Projection, spec: ResolutionSpec) -> Result<Entries> {
    let mut entries = vec![
        (MetafileKey::DggsProj, projection.to_string()),
        (MetafileKey::DggsResSpecifyType, spec.specify_type().to_string()),
    ];
    match spec {
        ResolutionSpec::Specified { resolution } => {
            entries.push((MetafileKey::DggsResSpec, resolution.to_string()));
        }
        ResolutionSpec::CellArea { area_km2, round_down } => {
            if !(area_km2 > 0.0) {
                return Err(DggridError::invalid(format!("cell area must be positive, got {}", area_km2)));
            }
            entries.push((MetafileKey::DggsResSpecifyArea, area_km2.to_string()));
            entries.push((MetafileKey::DggsResSpecifyRndDown, bool_flag(round_down)));
        }
        ResolutionSpec::IntercellDistance { distance_km, round_down } => {
            if !(distance_km > 0.0) {
                return Err(DggridError::invalid(format!(
                    "intercell distance must be positive, got {}",
                    distance_km
                )));
            }
            entries.push((MetafileKey::DggsResSpecifyIntercellDistance, distance_km.to_string()));
            entries.push((MetafileKey::DggsResSpecifyRndDown, bool_flag(round_down)));
        }
    }
    Ok(entries)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationSpec {
    Specified { vert0_lon: f64, vert0_lat: f64, vert0_azimuth: f64 },
    Random { seed: u64 },
    RegionCenter,
}

impl OrientationSpec {
    pub fn default_for(orient_type: OrientSpecifyType) -> Self {
        match orient_type {
            OrientSpecifyType::Specified => OrientationSpec::Specified {
                vert0_lon: DEFAULT_POLE_LON_DEG,
                vert0_lat: DEFAULT_POLE_LAT_DEG,
                vert0_azimuth: DEFAULT_AZIMUTH_DEG,
            },
            OrientSpecifyType::Random => OrientationSpec::Random { seed: DEFAULT_ORIENT_RAND_SEED },
            OrientSpecifyType::RegionCenter => OrientationSpec::RegionCenter,
        }
    }

    pub fn specify_type(&self) -> OrientSpecifyType {
        match self {
            OrientationSpec::Specified { .. } => OrientSpecifyType::Specified,
            OrientationSpec::Random { .. } => OrientSpecifyType::Random,
            OrientationSpec::RegionCenter => OrientSpecifyType::RegionCenter,
        }
    }
}

/// Orientation entries for a CUSTOM grid.
pub fn specify_orientation(spec: OrientationSpec) -> Entries {
    let mut entries = vec![(MetafileKey::DggsOrientSpecifyType, spec.specify_type().to_string())];
    match spec {
        OrientationSpec::Specified { vert0_lon, vert0_lat, vert0_azimuth } => {
            entries.push((MetafileKey::DggsVert0Lon, vert0_lon.to_string()));
            entries.push((MetafileKey::DggsVert0Lat, vert0_lat.to_string()));
            entries.push((MetafileKey::DggsVert0Azimuth, vert0_azimuth.to_string()));
        }
        OrientationSpec::Random { seed } => {
            entries.push((MetafileKey::DggsOrientRandSeed, seed.to_string()));
        }
        OrientationSpec::RegionCenter => {}
    }
    entries
}

pub(crate) fn bool_flag(v: bool) -> String {
    (if v { "TRUE" } else { "FALSE" }).to_string()
}
