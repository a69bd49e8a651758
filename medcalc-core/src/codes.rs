//! Terminology codes used by calculator requirements.

/// LOINC observation codes. Comma-separated values list equivalent codes.
pub mod loinc {
    pub const HEART_RATE: &str = "8867-4";
    pub const SYSTOLIC_BP: &str = "8480-6";
    pub const DIASTOLIC_BP: &str = "8462-4";
    pub const BP_PANEL: &str = "85354-9,55284-4";
    pub const RESPIRATORY_RATE: &str = "9279-1";
    pub const TEMPERATURE: &str = "8310-5,8331-1";
    pub const OXYGEN_SATURATION: &str = "59408-5";
    pub const HEIGHT: &str = "8302-2";
    pub const WEIGHT: &str = "29463-7";
    pub const BMI: &str = "39156-5";
    pub const CREATININE: &str = "2160-0";
    pub const SODIUM: &str = "2951-2";
    pub const POTASSIUM: &str = "2823-3";
    pub const CHLORIDE: &str = "2075-0";
    pub const BICARBONATE: &str = "1963-8";
    pub const BUN: &str = "3094-0";
    pub const GLUCOSE: &str = "2345-7";
    pub const CALCIUM: &str = "17861-6";
    pub const ALBUMIN: &str = "1751-7";
    pub const HEMOGLOBIN: &str = "718-7";
    pub const PLATELETS: &str = "777-3";
    pub const WBC: &str = "6690-2";
    pub const QT_INTERVAL: &str = "8633-1";
    pub const GCS: &str = "9269-2";
    pub const INR: &str = "6301-6";
    pub const BILIRUBIN: &str = "1975-2";
    pub const TROPONIN_I: &str = "10839-9";
}

/// SNOMED CT condition codes.
pub mod snomed {
    pub const MYOCARDIAL_INFARCTION: &str = "22298006";
    pub const CONGESTIVE_HEART_FAILURE: &str = "42343007";
    pub const HEART_FAILURE: &str = "84114007";
    pub const PULMONARY_EMBOLISM: &str = "59282003";
    pub const DEEP_VEIN_THROMBOSIS: &str = "128053003";
    pub const HISTORY_OF_VTE: &str = "451574005";
    pub const MALIGNANCY: &str = "363346000";
    pub const METASTATIC_CANCER: &str = "94225005";
    pub const HEMOPTYSIS: &str = "66857006";
    pub const DEMENTIA: &str = "52448006";
    pub const COPD: &str = "13645005";
    pub const CHRONIC_KIDNEY_DISEASE: &str = "709044004";
    pub const CIRRHOSIS: &str = "19943007";
    pub const DIABETES: &str = "73211009";
    pub const HEMIPLEGIA: &str = "50582007";
    pub const AIDS: &str = "62479008";
    pub const LEUKEMIA: &str = "93143009";
    pub const LYMPHOMA: &str = "118600007";
    pub const PERIPHERAL_VASCULAR_DISEASE: &str = "399957001";
    pub const STROKE: &str = "230690007";
    pub const TIA: &str = "266257000";
    pub const CONNECTIVE_TISSUE_DISEASE: &str = "105969002";
    pub const PEPTIC_ULCER: &str = "13200003";
}

/// RxNorm ingredient codes used by medication lookups.
pub mod rxnorm {
    pub const WARFARIN: &str = "11289";
    pub const ASPIRIN: &str = "1191";
    pub const HEPARIN: &str = "5224";
    pub const INSULIN: &str = "5856";
}

const LOINC_NAMES: &[(&str, &str)] = &[
    (loinc::HEART_RATE, "heart rate"),
    (loinc::SYSTOLIC_BP, "systolic bp"),
    (loinc::DIASTOLIC_BP, "diastolic bp"),
    (loinc::BP_PANEL, "bp panel"),
    (loinc::RESPIRATORY_RATE, "respiratory rate"),
    (loinc::TEMPERATURE, "temperature"),
    (loinc::OXYGEN_SATURATION, "oxygen saturation"),
    (loinc::HEIGHT, "height"),
    (loinc::WEIGHT, "weight"),
    (loinc::BMI, "bmi"),
    (loinc::CREATININE, "creatinine"),
    (loinc::SODIUM, "sodium"),
    (loinc::POTASSIUM, "potassium"),
    (loinc::CHLORIDE, "chloride"),
    (loinc::BICARBONATE, "bicarbonate"),
    (loinc::BUN, "bun"),
    (loinc::GLUCOSE, "glucose"),
    (loinc::CALCIUM, "calcium"),
    (loinc::ALBUMIN, "albumin"),
    (loinc::HEMOGLOBIN, "hemoglobin"),
    (loinc::PLATELETS, "platelets"),
    (loinc::WBC, "wbc"),
    (loinc::QT_INTERVAL, "qt interval"),
    (loinc::GCS, "gcs"),
    (loinc::INR, "inr"),
    (loinc::BILIRUBIN, "bilirubin"),
    (loinc::TROPONIN_I, "troponin i"),
];

/// Display name for a LOINC code (or any code of a comma-separated list).
pub fn loinc_name(code: &str) -> Option<&'static str> {
    LOINC_NAMES
        .iter()
        .find(|(known, _)| *known == code || split_codes(known).any(|part| part == code))
        .map(|(_, name)| *name)
}

/// Split a comma-separated code list, trimming blanks.
pub fn split_codes(codes: &str) -> impl Iterator<Item = &str> {
    codes.split(',').map(str::trim).filter(|code| !code.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_cover_multi_code_entries() {
        assert_eq!(loinc_name("8331-1"), Some("temperature"));
        assert_eq!(loinc_name(loinc::BP_PANEL), Some("bp panel"));
        assert_eq!(loinc_name("0000-0"), None);
    }

    #[test]
    fn splits_lists() {
        let codes: Vec<_> = split_codes(" 85354-9, ,55284-4").collect();
        assert_eq!(codes, vec!["85354-9", "55284-4"]);
    }
}
