use std::str::FromStr;

use anyhow::bail;
use log::{error, info};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use employee_batch::{
    BatchError,
    config::BatchSettings,
    core::{
        item::ItemWriter,
        job::{BatchStatus, Job, JobBuilder, JobExecution},
        listener::LoggingJobListener,
        step::StepBuilder,
    },
    employee::{Employee, IdResetProcessor},
    item::{
        csv::csv_reader::{CsvItemReader, CsvItemReaderBuilder},
        logger::LoggerWriter,
        rdbc::SqliteItemWriterBuilder,
    },
};

const SCHEMA: &str = include_str!("../resources/schema.sql");

async fn connect(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::query(SCHEMA).execute(&pool).await?;
    Ok(pool)
}

fn run_job<W: ItemWriter<Employee>>(
    settings: &BatchSettings,
    reader: &CsvItemReader,
    writer: &W,
) -> Result<JobExecution, BatchError> {
    let processor = IdResetProcessor;

    let step = StepBuilder::<Employee, Employee>::new()
        .name("saveEmployeesToDatabase")
        .reader(reader)
        .processor(&processor)
        .writer(writer)
        .chunk(settings.commit_interval()?)
        .skip_limit(settings.skip_limit)
        .build()?;

    let listener = LoggingJobListener;
    let job = JobBuilder::new()
        .name(settings.job_name.clone())
        .start(&step)
        .listener(&listener)
        .build()?;

    Ok(job.run())
}

fn report(execution: &JobExecution) {
    info!(
        "Run {} of {}: {:?} in {:?}, read: {}, written: {}, filtered: {}, skipped: {}, failed: {}, commits: {}",
        execution.run_id,
        execution.job_name,
        execution.status(),
        execution.duration().unwrap_or_default(),
        execution.read_count(),
        execution.write_count(),
        execution.filter_count(),
        execution.skip_count(),
        execution.failed_count(),
        execution.commit_count()
    );

    for step in &execution.step_executions {
        info!(
            "Step {}: {:?} in {:?}, rollbacks: {}",
            step.name,
            step.status,
            step.duration().unwrap_or_default(),
            step.rollback_count
        );
    }

    for failure in execution.chunk_failures() {
        error!(
            "Chunk {} aborted while {:?} (item {:?}, {} items discarded): {}",
            failure.chunk_number, failure.phase, failure.item_index, failure.item_count, failure.error
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match std::env::args().nth(1) {
        Some(path) => BatchSettings::load(path)?,
        None => {
            let settings = BatchSettings::default();
            settings.validate()?;
            settings
        }
    };

    let reader = CsvItemReaderBuilder::new()
        .delimiter(settings.delimiter_byte()?)
        .has_headers(settings.has_headers)
        .column_mapping(&settings.column_mapping)
        .from_path(&settings.input_resource_location);

    let execution = if settings.dry_run {
        run_job(&settings, &reader, &LoggerWriter::default())?
    } else {
        let pool = connect(&settings.database_url).await?;
        let writer = SqliteItemWriterBuilder::new()
            .pool(&pool)
            .statement(&settings.insert_statement)
            .build()?;
        run_job(&settings, &reader, &writer)?
    };

    report(&execution);

    if execution.status() != BatchStatus::Completed {
        bail!(
            "job {} run {} ended with status {:?}",
            execution.job_name,
            execution.run_id,
            execution.status()
        );
    }

    Ok(())
}
