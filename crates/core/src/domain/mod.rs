pub mod order;
pub mod slot;

pub use order::{Order, OrderId};
pub use slot::{Slot, SlotName, SlotSet};
