use std::collections::BTreeMap;

use olm_run::{CaseResult, Quantities};
use olm_space::CaseId;
use serde::{Deserialize, Serialize};

/// Un-decimated outputs of one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceCase {
    /// Every burnup of the schedule.
    pub burnups: Vec<f64>,
    /// Quantities per step, aligned with `burnups`.
    pub steps: Vec<Quantities>,
}

/// Full-resolution run outputs that checks compare the library against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReferenceSet {
    cases: BTreeMap<CaseId, ReferenceCase>,
}

impl ReferenceSet {
    /// Collects the complete results of a run.
    pub fn from_results(results: &[CaseResult]) -> Self {
        let cases = results
            .iter()
            .filter(|result| result.complete)
            .map(|result| {
                (
                    result.case.id.clone(),
                    ReferenceCase {
                        burnups: result.case.schedule.burnups(),
                        steps: result
                            .outputs
                            .iter()
                            .map(|output| output.quantities.clone())
                            .collect(),
                    },
                )
            })
            .collect();
        Self { cases }
    }

    /// Reference data of one case.
    pub fn get(&self, id: &CaseId) -> Option<&ReferenceCase> {
        self.cases.get(id)
    }

    /// Inserts or replaces a case.
    pub fn insert(&mut self, id: CaseId, case: ReferenceCase) {
        self.cases.insert(id, case);
    }

    /// Number of cases.
    pub fn len(&self) -> usize {
        self.cases.len()
    }

    /// True when no case is present.
    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}
