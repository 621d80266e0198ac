//! Configuration Entity - Tagged Field Map
//!
//! A `Dggs` is a grid type plus a sparse set of typed fields. Absence is
//! distinct from presence: `get` never fails and hands back the caller's
//! fallback for unset fields.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{DggridError, Result};
use crate::registry::{Projection, RoundingMode, Topology, PRESET_STRUCTURES};

/// Aperture value that denotes a mixed 4/3 hexagon sequence in preset names.
pub const MIXED_43_APERTURE: u32 = 43;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GridType {
    /// Parameters specified manually.
    Custom,
    /// Superfund_500m grid.
    Superfund,
    PlanetRisk,
    Preset {
        projection: Projection,
        aperture: u32,
        topology: Topology,
    },
}

impl GridType {
    /// Parse a grid name such as `ISEA3H`, `FULLER43H` or `SUPERFUND`.
    pub fn parse(name: &str) -> Result<Self> {
        let upper = name.trim().to_ascii_uppercase();
        match upper.as_str() {
            "CUSTOM" => return Ok(GridType::Custom),
            "SUPERFUND" => return Ok(GridType::Superfund),
            "PLANETRISK" => return Ok(GridType::PlanetRisk),
            _ => {}
        }

        let (projection, rest) = if let Some(rest) = upper.strip_prefix("ISEA") {
            (Projection::Isea, rest)
        } else if let Some(rest) = upper.strip_prefix("FULLER") {
            (Projection::Fuller, rest)
        } else {
            return Err(DggridError::UnrecognizedGridType(name.to_string()));
        };

        let mut chars = rest.chars();
        let topology = chars
            .next_back()
            .and_then(Topology::from_letter)
            .ok_or_else(|| {
                DggridError::invalid(format!("grid name '{}' lacks a H/T/D topology suffix", name))
            })?;
        let aperture = chars.as_str().parse::<u32>().map_err(|_| {
            DggridError::invalid(format!("grid name '{}' has no aperture digits", name))
        })?;

        let preset = GridType::Preset { projection, aperture, topology };
        if !PRESET_STRUCTURES.contains(&(aperture, topology)) || preset.to_string() != upper {
            return Err(DggridError::invalid(format!("'{}' is not a known preset grid", name)));
        }
        Ok(preset)
    }

    /// Every named preset, ISEA first.
    pub fn presets() -> impl Iterator<Item = GridType> {
        Projection::ALL.iter().flat_map(|&projection| {
            PRESET_STRUCTURES
                .iter()
                .map(move |&(aperture, topology)| GridType::Preset { projection, aperture, topology })
        })
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, GridType::Superfund | GridType::PlanetRisk)
    }

    pub fn is_mixed(&self) -> bool {
        matches!(self, GridType::Preset { aperture, .. } if *aperture == MIXED_43_APERTURE)
    }
}

impl fmt::Display for GridType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridType::Custom => f.write_str("CUSTOM"),
            GridType::Superfund => f.write_str("SUPERFUND"),
            GridType::PlanetRisk => f.write_str("PLANETRISK"),
            GridType::Preset { projection, aperture, topology } => {
                write!(f, "{}{}{}", projection, aperture, topology.letter())
            }
        }
    }
}

impl FromStr for GridType {
    type Err = DggridError;

    fn from_str(s: &str) -> Result<Self> {
        GridType::parse(s)
    }
}

impl Serialize for GridType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Field schema of a grid configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Projection,
    Aperture,
    Topology,
    Resolution,
    Precision,
    Area,
    Spacing,
    ClsDistance,
    RoundingMode,
    Metric,
    ShowInfo,
    AzimuthDeg,
    PoleLatDeg,
    PoleLonDeg,
    MixedApertureLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Projection(Projection),
    Topology(Topology),
    Rounding(RoundingMode),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats; everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(true) => f.write_str("TRUE"),
            Value::Bool(false) => f.write_str("FALSE"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Projection(v) => f.write_str(v.as_str()),
            Value::Topology(v) => f.write_str(v.as_str()),
            Value::Rounding(v) => f.write_str(v.as_str()),
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident as $cast:ty),+ $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v as $cast)
            }
        })+
    };
}

value_from! {
    bool => Bool as bool,
    i32 => Int as i64,
    i64 => Int as i64,
    u32 => Int as i64,
    f64 => Float as f64,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Projection> for Value {
    fn from(v: Projection) -> Self {
        Value::Projection(v)
    }
}

impl From<Topology> for Value {
    fn from(v: Topology) -> Self {
        Value::Topology(v)
    }
}

impl From<RoundingMode> for Value {
    fn from(v: RoundingMode) -> Self {
        Value::Rounding(v)
    }
}

/// A grid configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dggs {
    grid_type: GridType,
    fields: BTreeMap<Field, Value>,
}

impl Dggs {
    pub fn new(grid_type: GridType) -> Self {
        Self { grid_type, fields: BTreeMap::new() }
    }

    pub fn grid_type(&self) -> GridType {
        self.grid_type
    }

    pub fn set_grid_type(&mut self, grid_type: GridType) -> &mut Self {
        self.grid_type = grid_type;
        self
    }

    /// Unconditional overwrite.
    pub fn set(&mut self, field: Field, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(field, value.into());
        self
    }

    /// Stored value, or `default` when the field was never set.
    pub fn get(&self, field: Field, default: impl Into<Value>) -> Value {
        self.fields.get(&field).cloned().unwrap_or_else(|| default.into())
    }

    pub fn value(&self, field: Field) -> Option<&Value> {
        self.fields.get(&field)
    }

    pub fn is_set(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &Value)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn projection(&self) -> Option<Projection> {
        match self.fields.get(&Field::Projection) {
            Some(Value::Projection(p)) => Some(*p),
            Some(Value::Text(t)) => t.parse().ok(),
            _ => None,
        }
    }

    pub fn topology(&self) -> Option<Topology> {
        match self.fields.get(&Field::Topology) {
            Some(Value::Topology(t)) => Some(*t),
            Some(Value::Text(t)) => t.parse().ok(),
            _ => None,
        }
    }

    pub fn rounding(&self) -> RoundingMode {
        match self.fields.get(&Field::RoundingMode) {
            Some(Value::Rounding(r)) => *r,
            Some(Value::Text(t)) => t.parse().unwrap_or(RoundingMode::Nearest),
            _ => RoundingMode::Nearest,
        }
    }

    pub fn aperture(&self) -> Option<i64> {
        self.fields.get(&Field::Aperture).and_then(Value::as_i64)
    }

    pub fn resolution(&self) -> Option<i64> {
        self.fields.get(&Field::Resolution).and_then(Value::as_i64)
    }

    pub fn float(&self, field: Field) -> Option<f64> {
        self.fields.get(&field).and_then(Value::as_f64)
    }
}
