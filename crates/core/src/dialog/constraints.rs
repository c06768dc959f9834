use serde::Serialize;

use crate::domain::slot::SlotName;

pub const LEGO_MODELS: &[&str] = &["ship", "tank", "rocket"];
pub const LEGO_SIZES: &[&str] = &["small", "medium", "large"];

/// Accepted normalized values for one required slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlotConstraint {
    pub slot: SlotName,
    /// Word used when prompting the user for this slot.
    pub label: &'static str,
    pub accepted: &'static [&'static str],
}

impl SlotConstraint {
    pub fn accepts(&self, normalized: &str) -> bool {
        self.accepted.contains(&normalized)
    }

    pub fn accepted_list(&self) -> String {
        self.accepted.join(", ")
    }

    pub fn missing_prompt(&self) -> String {
        format!("Which {} do you want ({})?", self.label, self.accepted_list())
    }

    pub fn rejected_prompt(&self) -> String {
        format!("Please select {}", self.accepted_list())
    }
}

/// Required slots in priority order. The first entry is checked first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConstraintTable {
    entries: Vec<SlotConstraint>,
}

impl ConstraintTable {
    pub fn new(entries: Vec<SlotConstraint>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SlotConstraint] {
        &self.entries
    }

    pub fn get(&self, slot: SlotName) -> Option<&SlotConstraint> {
        self.entries.iter().find(|entry| entry.slot == slot)
    }

    pub fn required_slots(&self) -> impl Iterator<Item = SlotName> + '_ {
        self.entries.iter().map(|entry| entry.slot)
    }
}

impl Default for ConstraintTable {
    fn default() -> Self {
        Self::new(vec![
            SlotConstraint { slot: SlotName::LegoModel, label: "model", accepted: LEGO_MODELS },
            SlotConstraint { slot: SlotName::LegoSize, label: "size", accepted: LEGO_SIZES },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::{ConstraintTable, LEGO_MODELS};
    use crate::domain::slot::SlotName;

    #[test]
    fn default_table_checks_model_before_size() {
        let order: Vec<SlotName> = ConstraintTable::default().required_slots().collect();
        assert_eq!(order, vec![SlotName::LegoModel, SlotName::LegoSize]);
    }

    #[test]
    fn prompts_enumerate_accepted_values() {
        let table = ConstraintTable::default();
        let model = table.get(SlotName::LegoModel).expect("model constraint");

        assert_eq!(model.accepted, LEGO_MODELS);
        assert_eq!(model.missing_prompt(), "Which model do you want (ship, tank, rocket)?");
        assert_eq!(model.rejected_prompt(), "Please select ship, tank, rocket");
    }

    #[test]
    fn membership_is_exact() {
        let table = ConstraintTable::default();
        let size = table.get(SlotName::LegoSize).expect("size constraint");

        assert!(size.accepts("medium"));
        assert!(!size.accepts("med"));
        assert!(!size.accepts("mediums"));
        assert!(!size.accepts("Medium"));
    }
}
