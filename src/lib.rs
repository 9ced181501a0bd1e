#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Employee Batch

 Chunk-oriented batch import of employee records: rows are read lazily from a
 header-less delimited file, each record has its identity cleared, and the
 records are inserted into a relational table in fixed-size chunks, one
 transaction per chunk.

 ## Core Concepts

- **Job:** one end-to-end run of the pipeline. A `Job` is composed of one or more `Step`s
  and notifies its `JobExecutionListener`s before and after each run.
- **Step:** a read-process-write stage executed chunk by chunk.
- **ItemReader:** lazy source of items, one at a time.
- **ItemProcessor:** maps one item to another, or filters it out.
- **ItemWriter:** persists one chunk of items as a single unit.

 A chunk is all-or-nothing: either every item in it is processed and written,
 or none is. The first chunk that fails stops the job; chunks committed before
 it stay committed. Running the job again processes the whole input again.

 ## Features

| **Feature**   | **Description**                                            |
|---------------|------------------------------------------------------------|
| csv           | Enables the CSV `ItemReader`                               |
| rdbc-sqlite   | Enables the transactional SQLite `ItemWriter`              |
| logger        | Enables a logger `ItemWriter`, useful for dry runs         |
| full          | Enables all available features                             |

 ## Getting Started

```rust
# use employee_batch::{
#     core::{
#         item::{ItemWriter, ItemWriterResult},
#         job::{BatchStatus, Job, JobBuilder},
#         listener::LoggingJobListener,
#         step::StepBuilder,
#     },
#     employee::{Employee, IdResetProcessor},
#     error::BatchError,
#     item::csv::csv_reader::CsvItemReaderBuilder,
# };
# use std::cell::RefCell;
# #[derive(Default)]
# struct VecWriter(RefCell<Vec<Employee>>);
# impl ItemWriter<Employee> for VecWriter {
#     fn write(&self, items: &[Employee]) -> ItemWriterResult {
#         self.0.borrow_mut().extend_from_slice(items);
#         Ok(())
#     }
# }
fn main() -> Result<(), BatchError> {
    let csv = "Ada Lovelace,Analyst,Engineering,36
    Alan Turing,Researcher,Mathematics,41
    Grace Hopper,Admiral,Navy,85";

    let reader = CsvItemReaderBuilder::new()
        .column_mapping(&["name", "title", "department", "age"])
        .from_reader(csv.as_bytes());

    let processor = IdResetProcessor;
    let writer = VecWriter::default();

    let step = StepBuilder::new()
        .name("saveEmployeesToDatabase")
        .reader(&reader)
        .processor(&processor)
        .writer(&writer)
        .chunk(2)
        .build()?;

    let listener = LoggingJobListener;
    let job = JobBuilder::new()
        .name("employeeJob".to_string())
        .start(&step)
        .listener(&listener)
        .build()?;

    let execution = job.run();

    assert_eq!(execution.status(), BatchStatus::Completed);
    assert_eq!(execution.commit_count(), 2);
    assert_eq!(writer.0.borrow().len(), 3);

    Ok(())
}
```
 */

/// Core module for batch operations
pub mod core;

/// Error types for batch operations
pub mod error;

#[doc(inline)]
pub use error::*;

/// Settings of the employee import
pub mod config;

/// The employee record and its processor
pub mod employee;

/// Set of item readers / writers (CSV reader, SQLite writer, logger)
pub mod item;
