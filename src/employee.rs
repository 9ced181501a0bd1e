use serde::{Deserialize, Serialize};

use crate::core::item::{ItemProcessor, ItemProcessorResult};

/// Item carrying a store-assigned identity.
pub trait Identifiable {
    fn id(&self) -> Option<i64>;

    fn clear_id(&mut self);
}

/// One row of the employee file and of the `employee` table.
///
/// The input file has no `id` column, so `id` deserializes to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub title: String,
    pub department: String,
    pub age: u32,
}

impl Identifiable for Employee {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn clear_id(&mut self) {
        self.id = None;
    }
}

/// Clears the identity of every item so that the store assigns a fresh one.
#[derive(Default)]
pub struct IdResetProcessor;

impl<T: Identifiable> ItemProcessor<T, T> for IdResetProcessor {
    fn process(&self, mut item: T) -> ItemProcessorResult<T> {
        item.clear_id();
        Ok(Some(item))
    }
}
