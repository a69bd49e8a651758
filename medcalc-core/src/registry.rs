//! Lookup table of the calculators available to the host application.

use std::sync::Arc;

use crate::calculator::{Calculator, CalculatorSummary};
use crate::{library, CalcError};

#[derive(Clone, Default)]
pub struct Registry {
    calculators: Vec<Arc<dyn Calculator>>,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.calculators.iter().map(|calc| calc.id()))
            .finish()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in calculator.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for calculator in library::all() {
            if let Err(err) = registry.register(calculator) {
                tracing::warn!(%err, "skipping built-in calculator");
            }
        }
        registry
    }

    pub fn register(&mut self, calculator: Arc<dyn Calculator>) -> Result<(), CalcError> {
        if self.find(calculator.id()).is_some() {
            return Err(CalcError::DuplicateCalculator(calculator.id().to_string()));
        }
        tracing::debug!(calculator = calculator.id(), "registered calculator");
        self.calculators.push(calculator);
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<Arc<dyn Calculator>> {
        self.calculators
            .iter()
            .find(|calc| calc.id() == id)
            .cloned()
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn Calculator>, CalcError> {
        self.find(id)
            .ok_or_else(|| CalcError::UnknownCalculator(id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.calculators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calculators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Calculator>> {
        self.calculators.iter()
    }

    pub fn summaries(&self) -> Vec<CalculatorSummary> {
        self.calculators.iter().map(|calc| calc.summary()).collect()
    }

    /// Case-insensitive match against id, title and description.
    pub fn search(&self, query: &str) -> Vec<CalculatorSummary> {
        let query = query.trim().to_lowercase();
        self.calculators
            .iter()
            .filter(|calc| {
                query.is_empty()
                    || [calc.id(), calc.title(), calc.description()]
                        .iter()
                        .any(|text| text.to_lowercase().contains(&query))
            })
            .map(|calc| calc.summary())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{CalculationInput, FieldValue, FormState};
    use crate::units::UnitConverter;
    use crate::Assessment;
    use std::collections::HashSet;

    #[test]
    fn standard_ids_are_unique() {
        let registry = Registry::standard();
        let ids: HashSet<_> = registry.iter().map(|calc| calc.id().to_string()).collect();
        assert_eq!(ids.len(), registry.len());
        assert_eq!(registry.len(), library::all().len());
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = Registry::standard();
        let err = registry
            .register(Arc::new(library::map::calculator()))
            .expect_err("duplicate");
        assert_eq!(err, CalcError::DuplicateCalculator("map".into()));
    }

    #[test]
    fn unknown_id_is_reported() {
        let registry = Registry::standard();
        assert!(matches!(
            registry.get("nope"),
            Err(CalcError::UnknownCalculator(id)) if id == "nope"
        ));
    }

    #[test]
    fn search_matches_titles() {
        let registry = Registry::standard();
        let hits = registry.search("anion");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "serum-anion-gap");
        assert_eq!(registry.search("").len(), registry.len());
    }

    #[test]
    fn every_calculator_starts_empty_or_scored() {
        let converter = UnitConverter::standard();
        for calc in Registry::standard().iter() {
            let form = FormState::from_sections(calc.sections());
            let assessment = calc.assess(&form.collect(&converter));
            assert!(
                matches!(assessment, Assessment::Empty | Assessment::Complete { .. }),
                "{} produced {assessment:?}",
                calc.id()
            );
        }
    }

    #[test]
    fn out_of_range_input_is_invalid() {
        let registry = Registry::standard();
        let calc = registry.get("bmi-bsa").expect("bmi");
        let input = CalculationInput::new()
            .with("bmi-bsa-weight", FieldValue::Number(700.0))
            .with("bmi-bsa-height", FieldValue::Number(170.0));
        assert!(matches!(calc.assess(&input), Assessment::Invalid { .. }));
    }
}
