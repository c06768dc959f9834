use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Slots the order intent declares. Wire names match the runtime's slot schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotName {
    LegoModel,
    LegoSize,
}

impl SlotName {
    pub const ALL: [SlotName; 2] = [SlotName::LegoModel, SlotName::LegoSize];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegoModel => "LegoModel",
            Self::LegoSize => "LegoSize",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SlotName {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|name| name.as_str() == value).ok_or_else(|| {
            DomainError::InvariantViolation(format!("unknown slot name `{value}`"))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub name: SlotName,
    pub raw: Option<String>,
}

impl Slot {
    pub fn filled(name: SlotName, raw: impl Into<String>) -> Self {
        Self { name, raw: Some(raw.into()) }
    }

    pub fn empty(name: SlotName) -> Self {
        Self { name, raw: None }
    }

    /// Lower-cased, trimmed value. `None` when the slot is unfilled or blank.
    pub fn normalized(&self) -> Option<String> {
        let trimmed = self.raw.as_deref()?.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(trimmed.to_lowercase())
    }

    pub fn is_filled(&self) -> bool {
        self.normalized().is_some()
    }
}

/// Slot values captured so far in one conversation. Owned by the runtime; the
/// dialog core only reads it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSet {
    slots: BTreeMap<SlotName, Slot>,
}

impl SlotSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: SlotName, raw: impl Into<String>) -> Self {
        self.insert(Slot::filled(name, raw));
        self
    }

    pub fn insert(&mut self, slot: Slot) {
        self.slots.insert(slot.name, slot);
    }

    pub fn get(&self, name: SlotName) -> Option<&Slot> {
        self.slots.get(&name)
    }

    pub fn normalized(&self, name: SlotName) -> Option<String> {
        self.get(name).and_then(Slot::normalized)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }
}

impl FromIterator<Slot> for SlotSet {
    fn from_iter<I: IntoIterator<Item = Slot>>(iter: I) -> Self {
        let mut set = Self::new();
        for slot in iter {
            set.insert(slot);
        }
        set
    }
}
