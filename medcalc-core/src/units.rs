//! Measurement domains and the read-only conversion table.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::form::NumberField;
use crate::CalcError;

/// Family of units that can be converted into one another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum UnitDomain {
    Weight,
    Height,
    Temperature,
    Pressure,
    Volume,
    Glucose,
    Creatinine,
    Calcium,
    Albumin,
    Bilirubin,
    Hemoglobin,
    Bun,
    Electrolyte,
    Cholesterol,
    Triglycerides,
    Platelet,
    Wbc,
    DDimer,
    Fibrinogen,
    Insulin,
    Phenytoin,
}

impl UnitDomain {
    pub const ALL: [UnitDomain; 21] = [
        UnitDomain::Weight,
        UnitDomain::Height,
        UnitDomain::Temperature,
        UnitDomain::Pressure,
        UnitDomain::Volume,
        UnitDomain::Glucose,
        UnitDomain::Creatinine,
        UnitDomain::Calcium,
        UnitDomain::Albumin,
        UnitDomain::Bilirubin,
        UnitDomain::Hemoglobin,
        UnitDomain::Bun,
        UnitDomain::Electrolyte,
        UnitDomain::Cholesterol,
        UnitDomain::Triglycerides,
        UnitDomain::Platelet,
        UnitDomain::Wbc,
        UnitDomain::DDimer,
        UnitDomain::Fibrinogen,
        UnitDomain::Insulin,
        UnitDomain::Phenytoin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UnitDomain::Weight => "weight",
            UnitDomain::Height => "height",
            UnitDomain::Temperature => "temperature",
            UnitDomain::Pressure => "pressure",
            UnitDomain::Volume => "volume",
            UnitDomain::Glucose => "glucose",
            UnitDomain::Creatinine => "creatinine",
            UnitDomain::Calcium => "calcium",
            UnitDomain::Albumin => "albumin",
            UnitDomain::Bilirubin => "bilirubin",
            UnitDomain::Hemoglobin => "hemoglobin",
            UnitDomain::Bun => "bun",
            UnitDomain::Electrolyte => "electrolyte",
            UnitDomain::Cholesterol => "cholesterol",
            UnitDomain::Triglycerides => "triglycerides",
            UnitDomain::Platelet => "platelet",
            UnitDomain::Wbc => "wbc",
            UnitDomain::DDimer => "d-dimer",
            UnitDomain::Fibrinogen => "fibrinogen",
            UnitDomain::Insulin => "insulin",
            UnitDomain::Phenytoin => "phenytoin",
        }
    }
}

impl fmt::Display for UnitDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitDomain {
    type Err = CalcError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace(['_', ' '], "-");
        let normalized = match normalized.as_str() {
            "ddimer" => "d-dimer",
            "temp" => "temperature",
            "bp" | "blood-pressure" => "pressure",
            other => other,
        };
        UnitDomain::ALL
            .into_iter()
            .find(|domain| domain.as_str() == normalized)
            .ok_or_else(|| CalcError::UnknownUnit {
                unit: input.to_string(),
                domain: "any measurement domain".to_string(),
            })
    }
}

/// Affine map into the domain's base unit: `base = (value + offset) * factor`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scale {
    factor: f64,
    offset: f64,
}

impl Scale {
    const fn linear(factor: f64) -> Self {
        Self {
            factor,
            offset: 0.0,
        }
    }

    fn to_base(self, value: f64) -> f64 {
        (value + self.offset) * self.factor
    }

    fn from_base(self, base: f64) -> f64 {
        base / self.factor - self.offset
    }
}

#[derive(Debug, Clone)]
struct UnitDef {
    symbol: &'static str,
    scale: Scale,
    decimals: usize,
}

/// Read-only conversion table. Build it once and pass it by reference.
#[derive(Debug, Clone)]
pub struct UnitConverter {
    domains: HashMap<UnitDomain, Vec<UnitDef>>,
    aliases: HashMap<&'static str, &'static str>,
}

impl Default for UnitConverter {
    fn default() -> Self {
        Self::standard()
    }
}

impl UnitConverter {
    /// Conversion table covering every [`UnitDomain`].
    pub fn standard() -> Self {
        let mut domains = HashMap::new();
        let unit = |symbol, factor, decimals| UnitDef {
            symbol,
            scale: Scale::linear(factor),
            decimals,
        };

        domains.insert(
            UnitDomain::Weight,
            vec![unit("kg", 1.0, 1), unit("lbs", 0.453592, 1), unit("g", 0.001, 0)],
        );
        domains.insert(
            UnitDomain::Height,
            vec![
                unit("cm", 1.0, 1),
                unit("in", 2.54, 1),
                unit("ft", 30.48, 2),
                unit("m", 100.0, 2),
            ],
        );
        domains.insert(
            UnitDomain::Temperature,
            vec![
                unit("°C", 1.0, 1),
                UnitDef {
                    symbol: "°F",
                    scale: Scale {
                        factor: 5.0 / 9.0,
                        offset: -32.0,
                    },
                    decimals: 1,
                },
                UnitDef {
                    symbol: "K",
                    scale: Scale {
                        factor: 1.0,
                        offset: -273.15,
                    },
                    decimals: 1,
                },
            ],
        );
        domains.insert(
            UnitDomain::Pressure,
            vec![
                unit("mmHg", 1.0, 0),
                unit("kPa", 7.50062, 2),
                unit("bar", 750.062, 3),
            ],
        );
        domains.insert(
            UnitDomain::Volume,
            vec![
                unit("mL", 1.0, 0),
                unit("L", 1000.0, 2),
                unit("fl oz", 29.5735, 1),
                unit("cup", 236.588, 2),
            ],
        );
        domains.insert(
            UnitDomain::Glucose,
            vec![unit("mg/dL", 1.0, 0), unit("mmol/L", 18.018, 1)],
        );
        domains.insert(
            UnitDomain::Creatinine,
            vec![unit("mg/dL", 1.0, 2), unit("µmol/L", 1.0 / 88.4, 0)],
        );
        domains.insert(
            UnitDomain::Calcium,
            vec![unit("mg/dL", 1.0, 1), unit("mmol/L", 4.008, 2)],
        );
        domains.insert(
            UnitDomain::Albumin,
            vec![unit("g/dL", 1.0, 1), unit("g/L", 0.1, 0)],
        );
        domains.insert(
            UnitDomain::Bilirubin,
            vec![unit("mg/dL", 1.0, 1), unit("µmol/L", 1.0 / 17.1, 0)],
        );
        domains.insert(
            UnitDomain::Hemoglobin,
            vec![
                unit("g/dL", 1.0, 1),
                unit("g/L", 0.1, 0),
                unit("mmol/L", 1.611, 1),
            ],
        );
        domains.insert(
            UnitDomain::Bun,
            vec![unit("mg/dL", 1.0, 0), unit("mmol/L", 2.801, 1)],
        );
        domains.insert(
            UnitDomain::Electrolyte,
            vec![unit("mmol/L", 1.0, 0), unit("mEq/L", 1.0, 0)],
        );
        domains.insert(
            UnitDomain::Cholesterol,
            vec![unit("mg/dL", 1.0, 0), unit("mmol/L", 38.67, 2)],
        );
        domains.insert(
            UnitDomain::Triglycerides,
            vec![unit("mg/dL", 1.0, 0), unit("mmol/L", 88.57, 2)],
        );
        domains.insert(
            UnitDomain::Platelet,
            vec![
                unit("×10⁹/L", 1.0, 0),
                unit("×10³/µL", 1.0, 0),
                unit("K/µL", 1.0, 0),
            ],
        );
        domains.insert(
            UnitDomain::Wbc,
            vec![
                unit("×10⁹/L", 1.0, 1),
                unit("×10³/µL", 1.0, 1),
                unit("K/µL", 1.0, 1),
            ],
        );
        domains.insert(
            UnitDomain::DDimer,
            vec![
                unit("mg/L", 1.0, 2),
                unit("µg/mL", 1.0, 2),
                unit("ng/mL", 0.001, 0),
            ],
        );
        domains.insert(
            UnitDomain::Fibrinogen,
            vec![unit("g/L", 1.0, 2), unit("mg/dL", 0.01, 0)],
        );
        domains.insert(
            UnitDomain::Insulin,
            vec![
                unit("µU/mL", 1.0, 1),
                unit("mU/L", 1.0, 1),
                unit("pmol/L", 0.144, 0),
            ],
        );
        domains.insert(
            UnitDomain::Phenytoin,
            vec![
                unit("mcg/mL", 1.0, 1),
                unit("mg/L", 1.0, 1),
                unit("µmol/L", 0.252, 0),
            ],
        );

        let aliases = HashMap::from([
            ("mm[Hg]", "mmHg"),
            ("mm hg", "mmHg"),
            ("kpa", "kPa"),
            ("[lb_av]", "lbs"),
            ("lb", "lbs"),
            ("[in_i]", "in"),
            ("[ft_i]", "ft"),
            ("Cel", "°C"),
            ("C", "°C"),
            ("degC", "°C"),
            ("[degF]", "°F"),
            ("F", "°F"),
            ("degF", "°F"),
            ("umol/L", "µmol/L"),
            ("ug/mL", "µg/mL"),
            ("uU/mL", "µU/mL"),
            ("mg/dl", "mg/dL"),
            ("g/dl", "g/dL"),
            ("mmol/l", "mmol/L"),
            ("meq/L", "mEq/L"),
            ("10*9/L", "×10⁹/L"),
            ("10^9/L", "×10⁹/L"),
            ("10*3/uL", "×10³/µL"),
            ("10^3/uL", "×10³/µL"),
            ("K/uL", "K/µL"),
            ("[foz_us]", "fl oz"),
            ("ml", "mL"),
            ("l", "L"),
        ]);

        Self { domains, aliases }
    }

    fn lookup(&self, domain: UnitDomain, unit: &str) -> Option<&UnitDef> {
        let table = self.domains.get(&domain)?;
        let trimmed = unit.trim().replace('\u{03bc}', "µ");
        let canonical = self
            .aliases
            .get(trimmed.as_str())
            .copied()
            .unwrap_or(trimmed.as_str());
        table
            .iter()
            .find(|def| def.symbol == canonical)
            .or_else(|| {
                table
                    .iter()
                    .find(|def| def.symbol.eq_ignore_ascii_case(canonical))
            })
    }

    /// Whether `unit` is registered (directly or through an alias) for `domain`.
    pub fn supports(&self, domain: UnitDomain, unit: &str) -> bool {
        self.lookup(domain, unit).is_some()
    }

    /// Registered unit symbols for `domain`, base unit first.
    pub fn units(&self, domain: UnitDomain) -> Vec<&'static str> {
        self.domains
            .get(&domain)
            .map(|defs| defs.iter().map(|def| def.symbol).collect())
            .unwrap_or_default()
    }

    /// Canonical spelling of `unit` inside `domain`.
    pub fn canonical_unit(&self, domain: UnitDomain, unit: &str) -> Option<&'static str> {
        self.lookup(domain, unit).map(|def| def.symbol)
    }

    /// Convert `value` between two units of the same domain.
    ///
    /// Returns `None` when either unit is unknown for `domain` or the value is
    /// not finite.
    pub fn convert(&self, value: f64, from: &str, to: &str, domain: UnitDomain) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        let from = self.lookup(domain, from)?;
        let to = self.lookup(domain, to)?;
        if from.symbol == to.symbol {
            return Some(value);
        }
        Some(to.scale.from_base(from.scale.to_base(value)))
    }

    /// Like [`convert`](Self::convert) but reports which unit was rejected.
    pub fn try_convert(
        &self,
        value: f64,
        from: &str,
        to: &str,
        domain: UnitDomain,
    ) -> Result<f64, CalcError> {
        for unit in [from, to] {
            if self.lookup(domain, unit).is_none() {
                return Err(CalcError::UnknownUnit {
                    unit: unit.to_string(),
                    domain: domain.to_string(),
                });
            }
        }
        self.convert(value, from, to, domain)
            .ok_or_else(|| CalcError::Calculation(format!("cannot convert {value}")))
    }

    /// Display precision for `unit`; 2 when the unit is unknown.
    pub fn decimal_places(&self, domain: UnitDomain, unit: &str) -> usize {
        self.lookup(domain, unit).map(|def| def.decimals).unwrap_or(2)
    }

    /// Read a numeric field in the `canonical` unit.
    ///
    /// `None` when the field is blank, unparseable, or its displayed unit
    /// cannot be converted.
    pub fn get_standard_value(&self, field: &NumberField, canonical: &str) -> Option<f64> {
        let value = field.parsed()?;
        match field.toggle() {
            Some(toggle) => self.convert(value, toggle.current(), canonical, toggle.domain()),
            None => Some(value),
        }
    }
}

/// Fixed-precision rendering used by toggles and auto-population.
pub fn format_value(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn converts_weight_and_back() {
        let converter = UnitConverter::standard();
        let kg = converter
            .convert(154.0, "lbs", "kg", UnitDomain::Weight)
            .expect("lbs to kg");
        assert!(close(kg, 69.853168));
        let lbs = converter
            .convert(kg, "kg", "lbs", UnitDomain::Weight)
            .expect("kg to lbs");
        assert!(close(lbs, 154.0));
    }

    #[test]
    fn temperature_uses_offsets() {
        let converter = UnitConverter::standard();
        let celsius = converter.convert(98.6, "°F", "°C", UnitDomain::Temperature);
        assert!(close(celsius.expect("f to c"), 37.0));
        let kelvin = converter.convert(37.0, "Cel", "K", UnitDomain::Temperature);
        assert!(close(kelvin.expect("c to k"), 310.15));
    }

    #[test]
    fn every_pair_round_trips() {
        let converter = UnitConverter::standard();
        for domain in UnitDomain::ALL {
            let units = converter.units(domain);
            for from in &units {
                for to in &units {
                    let there = converter
                        .convert(42.5, from, to, domain)
                        .expect("registered pair");
                    let back = converter
                        .convert(there, to, from, domain)
                        .expect("registered pair");
                    assert!(close(back, 42.5), "{domain}: {from} -> {to} -> {from}");
                }
            }
        }
    }

    #[test]
    fn creatinine_micromolar() {
        let converter = UnitConverter::standard();
        let umol = converter.convert(1.0, "mg/dL", "umol/L", UnitDomain::Creatinine);
        assert!(close(umol.expect("alias"), 88.4));
    }

    #[test]
    fn rejects_cross_domain_and_non_finite() {
        let converter = UnitConverter::standard();
        assert_eq!(
            converter.convert(70.0, "kg", "lbs", UnitDomain::Temperature),
            None
        );
        assert_eq!(
            converter.convert(f64::NAN, "kg", "lbs", UnitDomain::Weight),
            None
        );
        assert!(matches!(
            converter.try_convert(1.0, "stone", "kg", UnitDomain::Weight),
            Err(CalcError::UnknownUnit { .. })
        ));
    }

    #[test]
    fn same_unit_is_identity() {
        let converter = UnitConverter::standard();
        assert_eq!(
            converter.convert(5.5, "mmHg", "mm[Hg]", UnitDomain::Pressure),
            Some(5.5)
        );
    }

    #[test]
    fn domain_parsing_accepts_aliases() {
        assert_eq!("ddimer".parse::<UnitDomain>(), Ok(UnitDomain::DDimer));
        assert_eq!("Weight".parse::<UnitDomain>(), Ok(UnitDomain::Weight));
        assert!("stone".parse::<UnitDomain>().is_err());
    }

    #[test]
    fn decimals_follow_unit() {
        let converter = UnitConverter::standard();
        assert_eq!(converter.decimal_places(UnitDomain::Cholesterol, "mmol/L"), 2);
        assert_eq!(converter.decimal_places(UnitDomain::Creatinine, "µmol/L"), 0);
        assert_eq!(format_value(25.7143, 1), "25.7");
    }
}
