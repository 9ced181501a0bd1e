use std::fmt::Debug;

use log::info;

use crate::{
    BatchError,
    core::item::{ItemWriter, ItemWriterResult},
};

/// Writer that only logs the items it receives. Used for dry runs.
#[derive(Default)]
pub struct LoggerWriter {}

impl<T> ItemWriter<T> for LoggerWriter
where
    T: Debug,
{
    fn write(&self, items: &[T]) -> ItemWriterResult {
        items.iter().for_each(|item| info!("Record:{:?}", item));
        Ok(())
    }

    fn close(&self) -> Result<(), BatchError> {
        info!("Dry run: nothing was persisted");
        Ok(())
    }
}
