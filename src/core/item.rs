use crate::error::BatchError;

/// Result of a single read: `Ok(None)` once the source is exhausted.
pub type ItemReaderResult<I> = Result<Option<I>, BatchError>;

/// Result of processing one item: `Ok(None)` filters the item out.
pub type ItemProcessorResult<O> = Result<Option<O>, BatchError>;

pub type ItemWriterResult = Result<(), BatchError>;

/// Lazy producer of items, consumed once per run in source order.
pub trait ItemReader<I> {
    /// One-time setup before the first read, e.g. opening the underlying file.
    fn open(&self) -> Result<(), BatchError> {
        Ok(())
    }

    fn read(&self) -> ItemReaderResult<I>;

    fn close(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// Maps one input item to one output item.
///
/// Implementations must not mutate shared state: the same processor is
/// applied to every item of every chunk.
pub trait ItemProcessor<I, O> {
    fn process(&self, item: I) -> ItemProcessorResult<O>;
}

/// Destination of a chunk of items.
///
/// A call to `write` persists the whole slice as one unit: either every item
/// becomes visible or none does.
pub trait ItemWriter<O> {
    fn write(&self, items: &[O]) -> ItemWriterResult;

    fn open(&self) -> Result<(), BatchError> {
        Ok(())
    }

    fn close(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// Processor used when a step is built without one.
#[derive(Default)]
pub struct PassThroughProcessor;

impl<T> ItemProcessor<T, T> for PassThroughProcessor {
    fn process(&self, item: T) -> ItemProcessorResult<T> {
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemProcessor, PassThroughProcessor};

    #[test]
    fn pass_through_returns_the_item_unchanged() {
        let processor = PassThroughProcessor;
        let result = processor.process("Ada".to_string()).unwrap();
        assert_eq!(result, Some("Ada".to_string()));
    }
}
