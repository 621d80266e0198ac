//! Validation System - Rule/Policy Separation
//!
//! Rules inspect a `Dggs` and produce structured violations.
//! `Verifier` runs every rule; callers decide what an error means.

use serde::Serialize;

use crate::dggs::{Dggs, Field, MIXED_43_APERTURE};
use crate::registry::Topology;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl ValidationViolation {
    pub fn error(rule: &str, message: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            severity: ViolationSeverity::Error,
            message: message.into(),
            expected: Some(expected.into()),
            actual: Some(actual.into()),
        }
    }

    pub fn warning(rule: &str, message: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            severity: ViolationSeverity::Warning,
            ..Self::error(rule, message, expected, actual)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub violations: Vec<ValidationViolation>,
    pub grid_type: String,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    /// `rule: message` pairs of every error, joined for an error message.
    pub fn error_summary(&self) -> String {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Error)
            .map(|v| match &v.actual {
                Some(actual) => format!("{}: {} (got {})", v.rule, v.message, actual),
                None => format!("{}: {}", v.rule, v.message),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

pub trait VerifyRule {
    fn name(&self) -> &'static str;
    fn check(&self, dggs: &Dggs) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

/// Projection and topology must be present and recognizable.
pub struct StructureRule;

impl VerifyRule for StructureRule {
    fn name(&self) -> &'static str { "structure" }

    fn check(&self, dggs: &Dggs) -> Vec<ValidationViolation> {
        let mut violations = vec![];
        if dggs.projection().is_none() {
            violations.push(ValidationViolation::error(
                self.name(),
                "Unrecognised dggs projection",
                "ISEA or FULLER",
                format!("{:?}", dggs.value(Field::Projection)),
            ));
        }
        if dggs.topology().is_none() {
            violations.push(ValidationViolation::error(
                self.name(),
                "Unrecognised dggs topology",
                "HEXAGON, TRIANGLE or DIAMOND",
                format!("{:?}", dggs.value(Field::Topology)),
            ));
        }
        violations
    }
}

pub struct ApertureRule;

impl VerifyRule for ApertureRule {
    fn name(&self) -> &'static str { "aperture" }

    fn check(&self, dggs: &Dggs) -> Vec<ValidationViolation> {
        let Some(topology) = dggs.topology() else {
            return vec![];
        };
        let aperture = dggs.aperture();
        let legal: &[i64] = match topology {
            Topology::Hexagon => &[3, 4, 7, MIXED_43_APERTURE as i64],
            Topology::Triangle | Topology::Diamond => &[4],
        };

        match aperture {
            Some(a) if legal.contains(&a) => vec![],
            other => vec![ValidationViolation::error(
                self.name(),
                format!("Aperture not legal for {}", topology),
                format!("{:?}", legal),
                format!("{:?}", other),
            )],
        }
    }
}

pub struct ResolutionRule;

impl VerifyRule for ResolutionRule {
    fn name(&self) -> &'static str { "resolution" }

    fn check(&self, dggs: &Dggs) -> Vec<ValidationViolation> {
        match dggs.resolution() {
            Some(res) if (0..=30).contains(&res) => vec![],
            Some(res) => vec![ValidationViolation::error(
                self.name(),
                "dggs resolution must be in the range [0,30]",
                "0..=30",
                res.to_string(),
            )],
            None => vec![ValidationViolation::error(
                self.name(),
                "dggs resolution is not set",
                "0..=30",
                "none",
            )],
        }
    }
}

/// Range check on an optional angular field; unset passes.
pub struct RangeRule {
    pub field: Field,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
}

impl RangeRule {
    pub fn azimuth() -> Self {
        Self { field: Field::AzimuthDeg, label: "azimuth_deg", min: 0.0, max: 360.0 }
    }

    pub fn pole_lat() -> Self {
        Self { field: Field::PoleLatDeg, label: "pole_lat_deg", min: -90.0, max: 90.0 }
    }

    pub fn pole_lon() -> Self {
        Self { field: Field::PoleLonDeg, label: "pole_lon_deg", min: -180.0, max: 180.0 }
    }
}

impl VerifyRule for RangeRule {
    fn name(&self) -> &'static str { self.label }

    fn check(&self, dggs: &Dggs) -> Vec<ValidationViolation> {
        if !dggs.is_set(self.field) {
            return vec![];
        }
        match dggs.float(self.field) {
            Some(v) if v >= self.min && v <= self.max => vec![],
            other => vec![ValidationViolation::error(
                self.name(),
                format!("dggs {} must be in the range [{},{}]", self.label, self.min, self.max),
                format!("[{},{}]", self.min, self.max),
                format!("{:?}", other),
            )],
        }
    }
}

/// Runs the structural rules against a configuration.
pub struct Verifier {
    rules: Vec<Box<dyn VerifyRule>>,
}

impl Verifier {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(StructureRule),
                Box::new(ApertureRule),
                Box::new(ResolutionRule),
                Box::new(RangeRule::azimuth()),
                Box::new(RangeRule::pole_lat()),
                Box::new(RangeRule::pole_lon()),
            ],
        }
    }

    pub fn verify(&self, dggs: &Dggs) -> ValidationResult {
        // Registered grids carry their structure inside the engine.
        if dggs.grid_type().is_registered() {
            return ValidationResult {
                valid: true,
                violations: vec![],
                grid_type: dggs.grid_type().to_string(),
            };
        }

        let violations: Vec<_> = self.rules.iter().flat_map(|rule| rule.check(dggs)).collect();
        let valid = !violations.iter().any(|v| v.severity == ViolationSeverity::Error);

        ValidationResult {
            valid,
            violations,
            grid_type: dggs.grid_type().to_string(),
        }
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dggs::GridType;
    use crate::registry::Projection;

    fn hexagon(aperture: i64, res: i64) -> Dggs {
        let mut dggs = Dggs::new(GridType::Custom);
        dggs.set(Field::Projection, Projection::Isea)
            .set(Field::Topology, Topology::Hexagon)
            .set(Field::Aperture, aperture)
            .set(Field::Resolution, res);
        dggs
    }

    #[test]
    fn test_valid_hexagon_passes() {
        let result = Verifier::new().verify(&hexagon(7, 12));
        assert!(result.valid, "{}", result.error_summary());
    }

    #[test]
    fn test_resolution_out_of_range() {
        let result = Verifier::new().verify(&hexagon(3, 31));
        assert!(!result.valid);
        assert!(result.error_summary().contains("resolution"));
    }

    #[test]
    fn test_triangle_requires_aperture_4() {
        let mut dggs = hexagon(3, 5);
        dggs.set(Field::Topology, Topology::Triangle);
        let result = Verifier::new().verify(&dggs);
        assert!(!result.valid);
        assert!(result.violations.iter().any(|v| v.rule == "aperture"));
    }

    #[test]
    fn test_pole_latitude_range() {
        let mut dggs = hexagon(3, 5);
        dggs.set(Field::PoleLatDeg, 91.0);
        let result = Verifier::new().verify(&dggs);
        assert!(result.violations.iter().any(|v| v.rule == "pole_lat_deg"));
    }

    #[test]
    fn test_registered_grid_skips_structure() {
        let result = Verifier::new().verify(&Dggs::new(GridType::Superfund));
        assert!(result.valid);
    }
}
