//! Built-in calculator modules.

use std::sync::Arc;

use crate::calculator::Calculator;

pub mod anion_gap;
pub mod bmi_bsa;
pub mod calcium_correction;
pub mod centor;
pub mod charlson;
pub mod ckd_epi;
pub mod crcl;
pub mod curb65;
pub mod grace;
pub mod heart;
pub mod map;
pub mod qsofa;
pub mod qtc;
pub mod wells_pe;

pub use grace::grace_risk;

/// Every built-in calculator, in menu order.
pub fn all() -> Vec<Arc<dyn Calculator>> {
    vec![
        Arc::new(bmi_bsa::calculator()),
        Arc::new(map::calculator()),
        Arc::new(grace::calculator()),
        Arc::new(heart::calculator()),
        Arc::new(curb65::calculator()),
        Arc::new(qsofa::calculator()),
        Arc::new(wells_pe::calculator()),
        Arc::new(centor::calculator()),
        Arc::new(ckd_epi::calculator()),
        Arc::new(crcl::calculator()),
        Arc::new(anion_gap::calculator()),
        Arc::new(calcium_correction::calculator()),
        Arc::new(qtc::calculator()),
        Arc::new(charlson::calculator()),
    ]
}
