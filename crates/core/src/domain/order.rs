use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::slot::SlotName;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A finalized order. Written once at fulfillment and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub values: BTreeMap<SlotName, String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn value(&self, slot: SlotName) -> Option<&str> {
        self.values.get(&slot).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use super::{Order, OrderId};
    use crate::domain::slot::SlotName;

    #[test]
    fn generated_ids_are_distinct_uuids() {
        let first = OrderId::generate();
        let second = OrderId::generate();

        assert_ne!(first, second);
        assert!(uuid::Uuid::parse_str(&first.0).is_ok());
    }

    #[test]
    fn value_lookup_by_slot() {
        let order = Order {
            id: OrderId("ORD-1".to_string()),
            values: BTreeMap::from([
                (SlotName::LegoModel, "tank".to_string()),
                (SlotName::LegoSize, "medium".to_string()),
            ]),
            created_at: Utc::now(),
        };

        assert_eq!(order.value(SlotName::LegoModel), Some("tank"));
        assert_eq!(order.value(SlotName::LegoSize), Some("medium"));
    }
}
