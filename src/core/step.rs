use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    chunk::{Chunk, ChunkStatus},
    item::{ItemProcessor, ItemReader, ItemWriter, PassThroughProcessor},
};

/// Number of items committed per transaction when none is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 10;

static PASS_THROUGH: PassThroughProcessor = PassThroughProcessor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Starting,
    Started,
    Completed,
    Failed,
}

/// Why and where a chunk was abandoned.
#[derive(Debug)]
pub struct ChunkFailure {
    /// 1-based position of the chunk in source order
    pub chunk_number: usize,
    /// Phase the chunk was in when it aborted
    pub phase: ChunkStatus,
    /// Position of the failing item inside the chunk, when a single item is to blame
    pub item_index: Option<usize>,
    /// Items read into the chunk before it aborted; none of them were written
    pub item_count: usize,
    pub error: BatchError,
}

/// Counters and outcome of one execution of a step.
#[derive(Debug)]
pub struct StepExecution {
    pub id: Uuid,
    pub name: String,
    pub status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Items successfully read
    pub read_count: usize,
    /// Items written by committed chunks
    pub write_count: usize,
    /// Items the processor dropped
    pub filter_count: usize,
    /// Unreadable items tolerated by the skip policy
    pub read_skip_count: usize,
    /// Items the processor rejected and the skip policy tolerated
    pub process_skip_count: usize,
    /// Chunks handed to the writer and committed
    pub commit_count: usize,
    /// Chunks abandoned before or during their commit
    pub rollback_count: usize,
    pub failures: Vec<ChunkFailure>,
}

impl StepExecution {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_owned(),
            status: StepStatus::Starting,
            start_time: Utc::now(),
            end_time: None,
            read_count: 0,
            write_count: 0,
            filter_count: 0,
            read_skip_count: 0,
            process_skip_count: 0,
            commit_count: 0,
            rollback_count: 0,
            failures: Vec::new(),
        }
    }

    pub fn skip_count(&self) -> usize {
        self.read_skip_count + self.process_skip_count
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end_time
            .and_then(|end| (end - self.start_time).to_std().ok())
    }

    pub(crate) fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }
}

/// One stage of a job.
pub trait Step {
    fn get_name(&self) -> &str;

    /// Acquires the step's resources. Called by the job before it is started.
    fn open(&self) -> Result<(), BatchError> {
        Ok(())
    }

    /// Runs the step to completion or to its first fatal failure, recording
    /// counts and failures in `step_execution`.
    fn execute(&self, step_execution: &mut StepExecution) -> Result<(), BatchError>;

    fn close(&self) -> Result<(), BatchError> {
        Ok(())
    }
}

/// A step that reads, processes and writes items in chunks.
///
/// Chunks are filled, processed and committed strictly one after another in
/// source order. The first chunk that cannot be read, processed or written
/// fails the step: its items are discarded, chunks committed before it stay
/// committed, and nothing further is read.
pub struct ChunkOrientedStep<'a, I, O> {
    name: String,
    reader: &'a dyn ItemReader<I>,
    processor: &'a dyn ItemProcessor<I, O>,
    writer: &'a dyn ItemWriter<O>,
    chunk_size: usize,
    skip_limit: usize,
}

impl<I, O> Step for ChunkOrientedStep<'_, I, O> {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> Result<(), BatchError> {
        self.reader.open()?;
        self.writer.open()
    }

    fn execute(&self, execution: &mut StepExecution) -> Result<(), BatchError> {
        info!(
            "Start of step: {}, chunk size: {}, skip limit: {}",
            self.name, self.chunk_size, self.skip_limit
        );
        execution.status = StepStatus::Started;

        let mut chunk_number = 0;

        loop {
            chunk_number += 1;
            let mut chunk = Chunk::new(chunk_number, self.chunk_size);

            let exhausted = match self.fill_chunk(&mut chunk, execution) {
                Ok(exhausted) => exhausted,
                Err(error) => return self.abort(chunk, None, error, execution),
            };

            if chunk.is_empty() {
                break;
            }

            chunk.advance(ChunkStatus::Transforming);
            let processed = match self.process_chunk(&mut chunk, execution) {
                Ok(processed) => processed,
                Err((index, error)) => return self.abort(chunk, Some(index), error, execution),
            };

            chunk.advance(ChunkStatus::Committing);
            if let Err(error) = self.write_chunk(&chunk, &processed, execution) {
                return self.abort(chunk, None, error, execution);
            }
            chunk.advance(ChunkStatus::Committed);

            if exhausted {
                break;
            }
        }

        execution.status = StepStatus::Completed;
        info!(
            "End of step: {}, read: {}, written: {}, commits: {}",
            self.name, execution.read_count, execution.write_count, execution.commit_count
        );

        Ok(())
    }

    fn close(&self) -> Result<(), BatchError> {
        let reader_result = self.reader.close();
        let writer_result = self.writer.close();
        reader_result.and(writer_result)
    }
}

impl<I, O> ChunkOrientedStep<'_, I, O> {
    pub fn get_chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Reads until the chunk is full or the source is exhausted.
    ///
    /// Returns `true` when the source reported its end.
    fn fill_chunk(
        &self,
        chunk: &mut Chunk<I>,
        execution: &mut StepExecution,
    ) -> Result<bool, BatchError> {
        debug!("Start reading chunk {}", chunk.number());

        while !chunk.is_full() {
            match self.reader.read() {
                Ok(Some(item)) => {
                    chunk.push(item);
                    execution.read_count += 1;
                }
                Ok(None) => {
                    debug!("End reading chunk {}: FINISHED", chunk.number());
                    return Ok(true);
                }
                Err(error) => {
                    if !self.can_skip(&error, execution) {
                        return Err(error);
                    }
                    execution.read_skip_count += 1;
                    warn!("Skipping unreadable item in chunk {}: {}", chunk.number(), error);
                }
            }
        }

        debug!("End reading chunk {}: FULL", chunk.number());
        Ok(false)
    }

    fn process_chunk(
        &self,
        chunk: &mut Chunk<I>,
        execution: &mut StepExecution,
    ) -> Result<Vec<O>, (usize, BatchError)> {
        debug!("Start processing chunk {}", chunk.number());

        let items = chunk.take_items();
        let mut processed = Vec::with_capacity(items.len());

        for (index, item) in items.into_iter().enumerate() {
            match self.processor.process(item) {
                Ok(Some(output)) => processed.push(output),
                Ok(None) => execution.filter_count += 1,
                Err(error) => {
                    if !self.can_skip(&error, execution) {
                        return Err((index, error));
                    }
                    execution.process_skip_count += 1;
                    warn!(
                        "Skipping item {} of chunk {}: {}",
                        index,
                        chunk.number(),
                        error
                    );
                }
            }
        }

        debug!("End processing chunk {}", chunk.number());
        Ok(processed)
    }

    fn write_chunk(
        &self,
        chunk: &Chunk<I>,
        processed: &[O],
        execution: &mut StepExecution,
    ) -> Result<(), BatchError> {
        if processed.is_empty() {
            debug!("Chunk {}: every item was filtered or skipped", chunk.number());
            return Ok(());
        }

        debug!("Start writing chunk {} ({} items)", chunk.number(), processed.len());
        self.writer.write(processed)?;

        execution.write_count += processed.len();
        execution.commit_count += 1;
        debug!("End writing chunk {}", chunk.number());

        Ok(())
    }

    fn abort(
        &self,
        mut chunk: Chunk<I>,
        item_index: Option<usize>,
        error: BatchError,
        execution: &mut StepExecution,
    ) -> Result<(), BatchError> {
        let phase = chunk.status();
        chunk.advance(ChunkStatus::Aborted);

        execution.rollback_count += 1;
        execution.status = StepStatus::Failed;

        error!(
            "Chunk {} of step {} aborted while {:?}: {}",
            chunk.number(),
            self.name,
            phase,
            error
        );

        let message = format!(
            "{}: chunk {} aborted while {:?} after {} committed chunks: {}",
            self.name,
            chunk.number(),
            phase,
            execution.commit_count,
            error
        );

        execution.failures.push(ChunkFailure {
            chunk_number: chunk.number(),
            phase,
            item_index,
            item_count: chunk.read_count(),
            error,
        });

        Err(BatchError::Step(message))
    }

    fn can_skip(&self, error: &BatchError, execution: &StepExecution) -> bool {
        error.is_skippable() && execution.skip_count() < self.skip_limit
    }
}

/// Builder for a [`ChunkOrientedStep`].
///
/// ```
/// # use employee_batch::core::item::{ItemReader, ItemReaderResult, ItemWriter, ItemWriterResult};
/// # use employee_batch::core::step::StepBuilder;
/// # struct Empty;
/// # impl ItemReader<u32> for Empty {
/// #     fn read(&self) -> ItemReaderResult<u32> { Ok(None) }
/// # }
/// # struct Discard;
/// # impl ItemWriter<u32> for Discard {
/// #     fn write(&self, _items: &[u32]) -> ItemWriterResult { Ok(()) }
/// # }
/// let reader = Empty;
/// let writer = Discard;
///
/// let step = StepBuilder::new()
///     .name("import")
///     .reader(&reader)
///     .writer(&writer)
///     .chunk(10)
///     .build()
///     .unwrap();
///
/// assert_eq!(step.get_chunk_size(), 10);
/// ```
pub struct StepBuilder<'a, I, O> {
    name: Option<String>,
    reader: Option<&'a dyn ItemReader<I>>,
    processor: Option<&'a dyn ItemProcessor<I, O>>,
    writer: Option<&'a dyn ItemWriter<O>>,
    chunk_size: usize,
    skip_limit: usize,
}

impl<I, O> Default for StepBuilder<'_, I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, I, O> StepBuilder<'a, I, O> {
    pub fn new() -> StepBuilder<'a, I, O> {
        Self {
            name: None,
            reader: None,
            processor: None,
            writer: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            skip_limit: 0,
        }
    }

    pub fn name(mut self, name: &str) -> StepBuilder<'a, I, O> {
        self.name = Some(name.to_owned());
        self
    }

    pub fn reader(mut self, reader: &'a impl ItemReader<I>) -> StepBuilder<'a, I, O> {
        self.reader = Some(reader);
        self
    }

    pub fn processor(mut self, processor: &'a impl ItemProcessor<I, O>) -> StepBuilder<'a, I, O> {
        self.processor = Some(processor);
        self
    }

    pub fn writer(mut self, writer: &'a impl ItemWriter<O>) -> StepBuilder<'a, I, O> {
        self.writer = Some(writer);
        self
    }

    /// Sets the commit interval: the number of items per transaction.
    pub fn chunk(mut self, chunk_size: usize) -> StepBuilder<'a, I, O> {
        self.chunk_size = chunk_size;
        self
    }

    /// Number of unreadable or rejected items tolerated before the step fails.
    pub fn skip_limit(mut self, skip_limit: usize) -> StepBuilder<'a, I, O> {
        self.skip_limit = skip_limit;
        self
    }

    /// Validates the configuration and builds the step.
    ///
    /// Fails with [`BatchError::Configuration`] when the chunk size is zero or
    /// the reader or writer is missing. Nothing is read at this point.
    pub fn build(self) -> Result<ChunkOrientedStep<'a, I, O>, BatchError>
    where
        PassThroughProcessor: ItemProcessor<I, O>,
    {
        if self.chunk_size == 0 {
            return Err(BatchError::Configuration(
                "chunk size must be a positive integer".to_string(),
            ));
        }

        let reader = self
            .reader
            .ok_or_else(|| BatchError::Configuration("a step needs a reader".to_string()))?;
        let writer = self
            .writer
            .ok_or_else(|| BatchError::Configuration("a step needs a writer".to_string()))?;

        Ok(ChunkOrientedStep {
            name: self.name.unwrap_or_else(build_name),
            reader,
            processor: self.processor.unwrap_or(&PASS_THROUGH),
            writer,
            chunk_size: self.chunk_size,
            skip_limit: self.skip_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    use crate::core::chunk::ChunkStatus;
    use crate::core::item::{
        ItemProcessor, ItemProcessorResult, ItemReader, ItemReaderResult, ItemWriter,
        ItemWriterResult,
    };
    use crate::BatchError;

    use super::{Step, StepBuilder, StepExecution, StepStatus};

    struct VecReader<T> {
        items: RefCell<VecDeque<Result<T, BatchError>>>,
    }

    impl<T> VecReader<T> {
        fn new(items: Vec<Result<T, BatchError>>) -> Self {
            Self {
                items: RefCell::new(items.into()),
            }
        }

        fn of(items: impl IntoIterator<Item = T>) -> Self {
            Self::new(items.into_iter().map(Ok).collect())
        }
    }

    impl<T> ItemReader<T> for VecReader<T> {
        fn read(&self) -> ItemReaderResult<T> {
            self.items.borrow_mut().pop_front().transpose()
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        chunks: RefCell<Vec<Vec<u32>>>,
        fail_on_call: Option<usize>,
        calls: Cell<usize>,
    }

    impl RecordingWriter {
        fn failing_on(call: usize) -> Self {
            Self {
                fail_on_call: Some(call),
                ..Default::default()
            }
        }

        fn chunk_sizes(&self) -> Vec<usize> {
            self.chunks.borrow().iter().map(Vec::len).collect()
        }
    }

    impl ItemWriter<u32> for RecordingWriter {
        fn write(&self, items: &[u32]) -> ItemWriterResult {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on_call == Some(call) {
                return Err(BatchError::ItemWriter("constraint violated".to_string()));
            }
            self.chunks.borrow_mut().push(items.to_vec());
            Ok(())
        }
    }

    struct FnProcessor<F>(F);

    impl<F> ItemProcessor<u32, u32> for FnProcessor<F>
    where
        F: Fn(u32) -> ItemProcessorResult<u32>,
    {
        fn process(&self, item: u32) -> ItemProcessorResult<u32> {
            (self.0)(item)
        }
    }

    fn parse_error(line: u64) -> BatchError {
        BatchError::Parse {
            line,
            content: "x".to_string(),
            message: "bad row".to_string(),
        }
    }

    #[test]
    fn empty_source_completes_without_commit() {
        let reader = VecReader::of(Vec::<u32>::new());
        let writer = RecordingWriter::default();
        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(10)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("empty");
        step.execute(&mut execution).unwrap();

        assert_eq!(execution.status, StepStatus::Completed);
        assert_eq!(execution.commit_count, 0);
        assert_eq!(execution.read_count, 0);
        assert_eq!(writer.calls.get(), 0);
    }

    #[test]
    fn items_are_committed_in_chunks_in_source_order() {
        let reader = VecReader::of(1..=25);
        let writer = RecordingWriter::default();
        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(10)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("chunks");
        step.execute(&mut execution).unwrap();

        assert_eq!(writer.chunk_sizes(), vec![10, 10, 5]);
        let written: Vec<u32> = writer.chunks.borrow().concat();
        assert_eq!(written, (1..=25).collect::<Vec<_>>());
        assert_eq!(execution.commit_count, 3);
        assert_eq!(execution.write_count, 25);
    }

    #[test]
    fn commit_count_is_ceil_of_items_over_chunk_size() {
        for (total, chunk_size) in [(1u32, 1usize), (9, 3), (10, 3), (7, 10), (30, 10)] {
            let reader = VecReader::of(0..total);
            let writer = RecordingWriter::default();
            let step = StepBuilder::new()
                .reader(&reader)
                .writer(&writer)
                .chunk(chunk_size)
                .build()
                .unwrap();

            let mut execution = StepExecution::new("ceil");
            step.execute(&mut execution).unwrap();

            let total = total as usize;
            let expected_commits = total.div_ceil(chunk_size);
            assert_eq!(execution.commit_count, expected_commits);

            let last = writer.chunk_sizes().last().copied().unwrap();
            let expected_last = if total % chunk_size == 0 {
                chunk_size
            } else {
                total % chunk_size
            };
            assert_eq!(last, expected_last);
        }
    }

    #[test]
    fn writer_failure_stops_the_step_at_the_failing_chunk() {
        let reader = VecReader::of(1..=15);
        let writer = RecordingWriter::failing_on(2);
        let step = StepBuilder::new()
            .name("load")
            .reader(&reader)
            .writer(&writer)
            .chunk(10)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("load");
        let result = step.execute(&mut execution);

        assert!(matches!(result, Err(BatchError::Step(_))));
        assert_eq!(execution.status, StepStatus::Failed);
        assert_eq!(execution.commit_count, 1);
        assert_eq!(execution.write_count, 10);
        assert_eq!(execution.rollback_count, 1);

        let failure = &execution.failures[0];
        assert_eq!(failure.chunk_number, 2);
        assert_eq!(failure.phase, ChunkStatus::Committing);
        assert_eq!(failure.item_count, 5);
        assert!(matches!(failure.error, BatchError::ItemWriter(_)));
    }

    #[test]
    fn no_chunk_is_read_after_a_failed_one() {
        let reader = VecReader::of(1..=30);
        let writer = RecordingWriter::failing_on(1);
        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(10)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("fail-fast");
        let _ = step.execute(&mut execution);

        assert_eq!(execution.read_count, 10);
        assert_eq!(reader.items.borrow().len(), 20);
        assert_eq!(writer.calls.get(), 1);
    }

    #[test]
    fn read_error_aborts_the_chunk_by_default() {
        let reader = VecReader::new(vec![
            Ok(1),
            Ok(2),
            Ok(3),
            Ok(4),
            Err(parse_error(5)),
            Ok(6),
        ]);
        let writer = RecordingWriter::default();
        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(3)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("read-error");
        assert!(step.execute(&mut execution).is_err());

        assert_eq!(execution.read_count, 4);
        assert_eq!(execution.write_count, 3);
        let failure = &execution.failures[0];
        assert_eq!(failure.chunk_number, 2);
        assert_eq!(failure.phase, ChunkStatus::Filling);
        assert_eq!(failure.item_count, 1);
        assert!(matches!(failure.error, BatchError::Parse { line: 5, .. }));
    }

    #[test]
    fn skip_limit_tolerates_bad_rows() {
        let reader = VecReader::new(vec![Ok(1), Err(parse_error(2)), Ok(3)]);
        let writer = RecordingWriter::default();
        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(10)
            .skip_limit(1)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("skip");
        step.execute(&mut execution).unwrap();

        assert_eq!(execution.read_skip_count, 1);
        assert_eq!(*writer.chunks.borrow(), vec![vec![1, 3]]);
    }

    #[test]
    fn exceeding_the_skip_limit_fails_the_step() {
        let reader = VecReader::new(vec![Err(parse_error(1)), Err(parse_error(2)), Ok(3)]);
        let writer = RecordingWriter::default();
        let step = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .skip_limit(1)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("skip-limit");
        assert!(step.execute(&mut execution).is_err());
        assert_eq!(execution.read_skip_count, 1);
        assert_eq!(writer.calls.get(), 0);
    }

    #[test]
    fn processor_error_names_the_failing_item() {
        let reader = VecReader::of(1..=6);
        let processor = FnProcessor(|item: u32| -> ItemProcessorResult<u32> {
            if item == 5 {
                Err(BatchError::ItemProcessor(format!("cannot process {item}")))
            } else {
                Ok(Some(item * 10))
            }
        });
        let writer = RecordingWriter::default();
        let step = StepBuilder::new()
            .reader(&reader)
            .processor(&processor)
            .writer(&writer)
            .chunk(3)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("process-error");
        assert!(step.execute(&mut execution).is_err());

        assert_eq!(*writer.chunks.borrow(), vec![vec![10, 20, 30]]);
        let failure = &execution.failures[0];
        assert_eq!(failure.chunk_number, 2);
        assert_eq!(failure.phase, ChunkStatus::Transforming);
        assert_eq!(failure.item_index, Some(1));
    }

    #[test]
    fn filtered_items_are_counted_and_not_written() {
        let reader = VecReader::of(1..=4);
        let processor =
            FnProcessor(|item: u32| -> ItemProcessorResult<u32> { Ok((item % 2 == 0).then_some(item)) });
        let writer = RecordingWriter::default();
        let step = StepBuilder::new()
            .reader(&reader)
            .processor(&processor)
            .writer(&writer)
            .chunk(2)
            .build()
            .unwrap();

        let mut execution = StepExecution::new("filter");
        step.execute(&mut execution).unwrap();

        assert_eq!(execution.filter_count, 2);
        assert_eq!(execution.write_count, 2);
        assert_eq!(*writer.chunks.borrow(), vec![vec![2], vec![4]]);
    }

    #[test]
    fn zero_chunk_size_is_a_configuration_error() {
        let reader = VecReader::of(1..=3);
        let writer = RecordingWriter::default();
        let result = StepBuilder::new()
            .reader(&reader)
            .writer(&writer)
            .chunk(0)
            .build();

        assert!(matches!(result, Err(BatchError::Configuration(_))));
        assert_eq!(reader.items.borrow().len(), 3);
    }

    #[test]
    fn missing_writer_is_a_configuration_error() {
        let reader = VecReader::of(1..=3);
        let result = StepBuilder::<u32, u32>::new().reader(&reader).build();

        assert!(matches!(result, Err(BatchError::Configuration(_))));
    }
}
