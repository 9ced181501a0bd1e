#![allow(dead_code)]

use std::io::Write;

use mockall::mock;
use tempfile::NamedTempFile;

use employee_batch::{
    BatchError,
    core::{
        item::{ItemWriter, ItemWriterResult},
        job::JobExecution,
        listener::JobExecutionListener,
    },
    employee::Employee,
};

mock! {
    pub Listener {}
    impl JobExecutionListener for Listener {
        fn before_job(&self, job_execution: &JobExecution);
        fn after_job(&self, job_execution: &JobExecution);
    }
}

mock! {
    pub Writer {}
    impl ItemWriter<Employee> for Writer {
        fn write(&self, items: &[Employee]) -> ItemWriterResult;
        fn open(&self) -> Result<(), BatchError>;
        fn close(&self) -> Result<(), BatchError>;
    }
}

pub const COLUMNS: [&str; 4] = ["name", "title", "department", "age"];

/// Header-less employee rows `Employee 1` to `Employee {count}`.
pub fn employee_rows(count: usize) -> String {
    (1..=count)
        .map(|n| format!("Employee {n},Engineer,R&D,{}\n", 20 + n % 40))
        .collect()
}

pub fn employee_file(content: &str) -> std::io::Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Writer mock whose `open` and `close` succeed.
pub fn writer_mock() -> MockWriter {
    let mut writer = MockWriter::new();
    writer.expect_open().returning(|| Ok(()));
    writer.expect_close().returning(|| Ok(()));
    writer
}
