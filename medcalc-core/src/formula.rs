//! Mixed-input calculators: numeric inputs with unit toggles, radios and
//! selects feeding a formula.

use crate::calculator::{CalcResult, Calculator, DataRequirement, Definition, Notes};
use crate::form::{CalculationInput, Section};
use crate::validation::ValidationSchema;
use crate::CalcError;

/// Formula over validated input; `Ok(None)` while input is incomplete.
pub type Formula = fn(&CalculationInput) -> Result<Option<CalcResult>, CalcError>;

pub struct FormulaCalculator {
    def: Definition,
    formula: Formula,
}

impl FormulaCalculator {
    pub fn new(id: &str, title: &str, description: &str, formula: Formula) -> Self {
        Self {
            def: Definition::new(id, title, description),
            formula,
        }
    }

    pub fn section(mut self, section: Section) -> Self {
        self.def.sections.push(section);
        self
    }

    pub fn requirement(mut self, requirement: DataRequirement) -> Self {
        self.def.requirements.push(requirement);
        self
    }

    pub fn schema(mut self, schema: ValidationSchema) -> Self {
        self.def.schema = schema;
        self
    }

    pub fn notes(mut self, notes: Notes) -> Self {
        self.def.notes = notes;
        self
    }
}

impl Calculator for FormulaCalculator {
    fn id(&self) -> &str {
        &self.def.id
    }

    fn title(&self) -> &str {
        &self.def.title
    }

    fn description(&self) -> &str {
        &self.def.description
    }

    fn sections(&self) -> &[Section] {
        &self.def.sections
    }

    fn notes(&self) -> &Notes {
        &self.def.notes
    }

    fn requirements(&self) -> &[DataRequirement] {
        &self.def.requirements
    }

    fn schema(&self) -> &ValidationSchema {
        &self.def.schema
    }

    fn compute(&self, input: &CalculationInput) -> Result<Option<CalcResult>, CalcError> {
        (self.formula)(input)
    }
}
