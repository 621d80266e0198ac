//! Parameter Registry - Closed Sets
//!
//! Every categorical axis of a grid configuration is a closed enum spelled the
//! way the DGGRID engine spells it. `MetafileKey` is the full set of directives
//! the compiler may emit; nothing outside it can reach a metafile.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DggridError;

/// Declares a closed set with its engine spelling, `ALL`, `Display` and `FromStr`.
macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = DggridError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| DggridError::InvalidConfiguration(
                        format!("unrecognized {} '{}'", $label, s)
                    ))
            }
        }
    };
}

closed_set! {
    /// Engine operations.
    Operation, "dggrid operation" {
        GenerateGrid => "GENERATE_GRID",
        TransformPoints => "TRANSFORM_POINTS",
        BinPointVals => "BIN_POINT_VALS",
        BinPointPresence => "BIN_POINT_PRESENCE",
        OutputStats => "OUTPUT_STATS",
    }
}

closed_set! {
    Projection, "projection" {
        Isea => "ISEA",
        Fuller => "FULLER",
    }
}

closed_set! {
    /// Cell shape family.
    Topology, "topology" {
        Hexagon => "HEXAGON",
        Triangle => "TRIANGLE",
        Diamond => "DIAMOND",
    }
}

impl Topology {
    /// Suffix letter used in preset grid names (`ISEA3H`).
    pub fn letter(&self) -> char {
        match self {
            Topology::Hexagon => 'H',
            Topology::Triangle => 'T',
            Topology::Diamond => 'D',
        }
    }

    pub fn from_letter(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'H' => Some(Topology::Hexagon),
            'T' => Some(Topology::Triangle),
            'D' => Some(Topology::Diamond),
            _ => None,
        }
    }
}

/// Aperture and topology of every named preset; each exists for both projections.
pub const PRESET_STRUCTURES: &[(u32, Topology)] = &[
    (3, Topology::Hexagon),
    (4, Topology::Hexagon),
    (4, Topology::Triangle),
    (4, Topology::Diamond),
    (43, Topology::Hexagon),
    (7, Topology::Hexagon),
];

closed_set! {
    ApertureType, "aperture type" {
        Pure => "PURE",
        Mixed43 => "MIXED43",
        Sequence => "SEQUENCE",
    }
}

closed_set! {
    ClipSubsetType, "clip subset type" {
        Shapefile => "SHAPEFILE",
        WholeEarth => "WHOLE_EARTH",
        Gdal => "GDAL",
        Aigen => "AIGEN",
        Seqnums => "SEQNUMS",
    }
}

closed_set! {
    /// Shared by `cell_output_type` and `point_output_type`.
    OutputType, "output type" {
        Aigen => "AIGEN",
        Gdal => "GDAL",
        Geojson => "GEOJSON",
        Shapefile => "SHAPEFILE",
        None => "NONE",
        Text => "TEXT",
    }
}

impl OutputType {
    pub fn needs_file_name(&self) -> bool {
        !matches!(self, OutputType::None)
    }
}

closed_set! {
    OrientSpecifyType, "orientation type" {
        Specified => "SPECIFIED",
        Random => "RANDOM",
        RegionCenter => "REGION_CENTER",
    }
}

closed_set! {
    ResSpecifyType, "resolution specification type" {
        Specified => "SPECIFIED",
        CellArea => "CELL_AREA",
        IntercellDistance => "INTERCELL_DISTANCE",
    }
}

closed_set! {
    /// Rounding direction when a resolution is derived from a magnitude.
    RoundingMode, "rounding mode" {
        Nearest => "NEAREST",
        Up => "UP",
        Down => "DOWN",
    }
}

closed_set! {
    AddressType, "address type" {
        Geo => "GEO",
        Q2di => "Q2DI",
        Seqnum => "SEQNUM",
        Interleave => "INTERLEAVE",
        Plane => "PLANE",
        Q2dd => "Q2DD",
        Projtri => "PROJTRI",
        Vertex2dd => "VERTEX2DD",
    }
}

closed_set! {
    CellOutputControl, "cell output control" {
        OutputAll => "OUTPUT_ALL",
        OutputOccupied => "OUTPUT_OCCUPIED",
    }
}

closed_set! {
    BinCoverage, "bin coverage" {
        Global => "GLOBAL",
        Partial => "PARTIAL",
    }
}

closed_set! {
    /// Recognized metafile directives.
    MetafileKey, "metafile key" {
        BinCoverage => "bin_coverage",
        CellOutputControl => "cell_output_control",
        CellOutputFileName => "cell_output_file_name",
        CellOutputGdalFormat => "cell_output_gdal_format",
        CellOutputType => "cell_output_type",
        ChildrenOutputFileName => "children_output_file_name",
        ChildrenOutputType => "children_output_type",
        ClipperScaleFactor => "clipper_scale_factor",
        ClipRegionFiles => "clip_region_files",
        ClipSubsetType => "clip_subset_type",
        Densification => "densification",
        DggridOperation => "dggrid_operation",
        DggsAperture => "dggs_aperture",
        DggsApertureSequence => "dggs_aperture_sequence",
        DggsApertureType => "dggs_aperture_type",
        DggsNumAperture4Res => "dggs_num_aperture_4_res",
        DggsOrientRandSeed => "dggs_orient_rand_seed",
        DggsOrientSpecifyType => "dggs_orient_specify_type",
        DggsProj => "dggs_proj",
        DggsResSpec => "dggs_res_spec",
        DggsResSpecifyArea => "dggs_res_specify_area",
        DggsResSpecifyIntercellDistance => "dggs_res_specify_intercell_distance",
        DggsResSpecifyRndDown => "dggs_res_specify_rnd_down",
        DggsResSpecifyType => "dggs_res_specify_type",
        DggsTopology => "dggs_topology",
        DggsType => "dggs_type",
        DggsVert0Azimuth => "dggs_vert0_azimuth",
        DggsVert0Lat => "dggs_vert0_lat",
        DggsVert0Lon => "dggs_vert0_lon",
        GeodeticDensify => "geodetic_densify",
        InputAddressType => "input_address_type",
        InputDelimiter => "input_delimiter",
        InputFileName => "input_file_name",
        InputFiles => "input_files",
        KmlDefaultColor => "kml_default_color",
        KmlDefaultWidth => "kml_default_width",
        KmlDescription => "kml_description",
        KmlName => "kml_name",
        MaxCellsPerOutputFile => "max_cells_per_output_file",
        NeighborOutputFileName => "neighbor_output_file_name",
        NeighborOutputType => "neighbor_output_type",
        OutputAddressType => "output_address_type",
        OutputCount => "output_count",
        OutputDelimiter => "output_delimiter",
        OutputFileName => "output_file_name",
        PointOutputFileName => "point_output_file_name",
        PointOutputGdalFormat => "point_output_gdal_format",
        PointOutputType => "point_output_type",
        Precision => "precision",
        ShapefileIdFieldLength => "shapefile_id_field_length",
        UpdateFrequency => "update_frequency",
        Verbosity => "verbosity",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("hexagon".parse::<Topology>().unwrap(), Topology::Hexagon);
        assert_eq!("WHOLE_EARTH".parse::<ClipSubsetType>().unwrap(), ClipSubsetType::WholeEarth);
        assert_eq!("mixed43".parse::<ApertureType>().unwrap(), ApertureType::Mixed43);
    }

    #[test]
    fn test_unknown_value_is_invalid_configuration() {
        let err = "MERCATOR".parse::<Projection>().unwrap_err();
        assert!(matches!(err, DggridError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("MERCATOR"));
    }

    #[test]
    fn test_metafile_keys_are_unique() {
        let mut names: Vec<_> = MetafileKey::ALL.iter().map(|k| k.as_str()).collect();
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_serde_uses_engine_spelling() {
        let json = serde_json::to_string(&OutputType::Geojson).unwrap();
        assert_eq!(json, "\"GEOJSON\"");
        let back: ClipSubsetType = serde_json::from_str("\"WHOLE_EARTH\"").unwrap();
        assert_eq!(back, ClipSubsetType::WholeEarth);
    }

    #[test]
    fn test_topology_letters_round_trip() {
        for t in Topology::ALL {
            assert_eq!(Topology::from_letter(t.letter()), Some(*t));
        }
        assert_eq!(Topology::from_letter('X'), None);
    }
}
