use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dialog::constraints::ConstraintTable;
use crate::domain::slot::{SlotName, SlotSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationVerdict {
    Valid,
    Invalid { slot: SlotName, message: String },
}

impl ValidationVerdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SlotValidator {
    table: ConstraintTable,
}

impl SlotValidator {
    pub fn new(table: ConstraintTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &ConstraintTable {
        &self.table
    }

    /// Reports the first required slot, in table order, that is unfilled or
    /// outside its accepted values.
    pub fn validate(&self, slots: &SlotSet) -> ValidationVerdict {
        for constraint in self.table.entries() {
            let Some(value) = slots.normalized(constraint.slot) else {
                debug!(slot = %constraint.slot, "missing slot");
                return ValidationVerdict::Invalid {
                    slot: constraint.slot,
                    message: constraint.missing_prompt(),
                };
            };

            if !constraint.accepts(&value) {
                debug!(slot = %constraint.slot, value = %value, "slot value outside accepted set");
                return ValidationVerdict::Invalid {
                    slot: constraint.slot,
                    message: constraint.rejected_prompt(),
                };
            }
        }

        debug!("order validation passed");
        ValidationVerdict::Valid
    }
}
