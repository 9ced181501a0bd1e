use std::{cell::Cell, time::Duration};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use uuid::Uuid;

use crate::BatchError;

use super::{
    build_name,
    listener::JobExecutionListener,
    step::{ChunkFailure, Step, StepExecution},
};

/// Status of a job run.
///
/// A run moves `Starting -> Started -> Completed | Failed | Stopped`. A run
/// that cannot open its steps goes from `Starting` straight to `Failed`.
/// `Unknown` marks a run whose outcome could not be determined. Once a run is
/// `Completed`, `Failed`, `Stopped` or `Unknown` its status never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Starting,
    Started,
    Completed,
    Failed,
    Stopped,
    Unknown,
}

impl BatchStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Stopped
        )
    }

    pub fn can_transition_to(&self, next: BatchStatus) -> bool {
        use BatchStatus::*;
        match self {
            Starting => matches!(next, Started | Failed | Stopped | Unknown),
            Started => matches!(next, Completed | Failed | Stopped | Unknown),
            Completed | Failed | Stopped | Unknown => false,
        }
    }
}

/// State of one run of a job, handed to listeners once the run is over.
#[derive(Debug)]
pub struct JobExecution {
    /// Run number, incremented on every invocation of the same job instance
    pub run_id: u64,
    pub job_name: String,
    /// Id of the job instance that produced this run, nil for detached executions
    pub instance_id: Uuid,
    status: BatchStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// One entry per step that was executed, in execution order
    pub step_executions: Vec<StepExecution>,
    /// Errors that ended the run
    pub failure_exceptions: Vec<BatchError>,
}

impl JobExecution {
    pub fn new(job_name: &str, run_id: u64) -> Self {
        Self {
            run_id,
            job_name: job_name.to_owned(),
            instance_id: Uuid::nil(),
            status: BatchStatus::Starting,
            start_time: Utc::now(),
            end_time: None,
            step_executions: Vec::new(),
            failure_exceptions: Vec::new(),
        }
    }

    pub fn status(&self) -> BatchStatus {
        self.status
    }

    /// Moves the run to `next`, rejecting any move that is not forward.
    pub fn update_status(&mut self, next: BatchStatus) -> Result<(), BatchError> {
        if !self.status.can_transition_to(next) {
            return Err(BatchError::IllegalStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn read_count(&self) -> usize {
        self.step_executions.iter().map(|s| s.read_count).sum()
    }

    pub fn write_count(&self) -> usize {
        self.step_executions.iter().map(|s| s.write_count).sum()
    }

    pub fn filter_count(&self) -> usize {
        self.step_executions.iter().map(|s| s.filter_count).sum()
    }

    pub fn skip_count(&self) -> usize {
        self.step_executions.iter().map(StepExecution::skip_count).sum()
    }

    pub fn commit_count(&self) -> usize {
        self.step_executions.iter().map(|s| s.commit_count).sum()
    }

    /// Items read into chunks that were later abandoned.
    pub fn failed_count(&self) -> usize {
        self.chunk_failures().map(|f| f.item_count).sum()
    }

    pub fn chunk_failures(&self) -> impl Iterator<Item = &ChunkFailure> {
        self.step_executions.iter().flat_map(|s| s.failures.iter())
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end_time
            .and_then(|end| (end - self.start_time).to_std().ok())
    }
}

/// Represents a job that can be executed.
pub trait Job {
    /// Runs the job once, from the first step.
    ///
    /// The returned execution is terminal: `Completed` when every step
    /// succeeded, `Failed` otherwise. Failures are reported through the
    /// execution rather than as an `Err`, so that counts of what was already
    /// committed are never lost.
    fn run(&self) -> JobExecution;
}

/// A configured job: an ordered list of steps plus the listeners observing it.
///
/// Every call to [`Job::run`] gets a fresh run id and processes the whole
/// input again, whether or not a previous run succeeded.
pub struct JobInstance<'a> {
    /// Unique identifier for this job instance
    id: Uuid,
    name: String,
    steps: Vec<&'a dyn Step>,
    listeners: Vec<&'a dyn JobExecutionListener>,
    last_run_id: Cell<u64>,
}

impl JobInstance<'_> {
    pub fn get_id(&self) -> Uuid {
        self.id
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    /// Run id of the latest invocation, 0 if the job never ran.
    pub fn last_run_id(&self) -> u64 {
        self.last_run_id.get()
    }

    fn next_run_id(&self) -> u64 {
        let run_id = self.last_run_id.get() + 1;
        self.last_run_id.set(run_id);
        run_id
    }

    fn open_steps(&self) -> Result<(), BatchError> {
        for step in &self.steps {
            step.open()?;
        }
        Ok(())
    }

    fn execute_steps(&self, execution: &mut JobExecution) -> Result<(), BatchError> {
        for step in &self.steps {
            let mut step_execution = StepExecution::new(step.get_name());
            let result = step.execute(&mut step_execution);
            step_execution.finish();
            execution.step_executions.push(step_execution);
            result?;
        }
        Ok(())
    }

    /// Closes every step, even after a failure, and returns the first error.
    fn close_steps(&self) -> Result<(), BatchError> {
        let mut first_error = None;
        for step in &self.steps {
            if let Err(error) = step.close() {
                warn!("Unable to close step {}: {}", step.get_name(), error);
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn transition(&self, execution: &mut JobExecution, status: BatchStatus) {
        if let Err(error) = execution.update_status(status) {
            warn!("Job {}: {}", self.name, error);
        }
    }
}

impl Job for JobInstance<'_> {
    fn run(&self) -> JobExecution {
        let mut execution = JobExecution::new(&self.name, self.next_run_id());
        execution.instance_id = self.id;

        info!(
            "Start of job: {}, id: {}, run: {}",
            self.name, self.id, execution.run_id
        );

        for listener in &self.listeners {
            listener.before_job(&execution);
        }

        let outcome = match self.open_steps() {
            Ok(()) => {
                self.transition(&mut execution, BatchStatus::Started);
                self.execute_steps(&mut execution)
            }
            Err(error) => {
                error!("Job {} could not be started: {}", self.name, error);
                Err(error)
            }
        };

        let outcome = outcome.and(self.close_steps());

        match outcome {
            Ok(()) => self.transition(&mut execution, BatchStatus::Completed),
            Err(error) => {
                execution.failure_exceptions.push(error);
                self.transition(&mut execution, BatchStatus::Failed);
            }
        }
        execution.end_time = Some(Utc::now());

        for listener in &self.listeners {
            listener.after_job(&execution);
        }

        info!(
            "End of job: {}, id: {}, run: {}, status: {:?}, read: {}, written: {}",
            self.name,
            self.id,
            execution.run_id,
            execution.status,
            execution.read_count(),
            execution.write_count()
        );

        execution
    }
}

/// Builder for creating a job instance.
///
/// ```rust,no_run,compile_fail
/// use employee_batch::core::job::JobBuilder;
///
/// let job = JobBuilder::new()
///     .name("employeeJob".to_string())
///     .start(&step)
///     .listener(&listener)
///     .build()?;
/// ```
#[derive(Default)]
pub struct JobBuilder<'a> {
    /// Optional name for the job (generated randomly if not specified)
    name: Option<String>,
    steps: Vec<&'a dyn Step>,
    listeners: Vec<&'a dyn JobExecutionListener>,
}

impl<'a> JobBuilder<'a> {
    pub fn new() -> Self {
        Self {
            name: None,
            steps: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn name(mut self, name: String) -> JobBuilder<'a> {
        self.name = Some(name);
        self
    }

    /// Sets the first step of the job.
    ///
    /// Same as `next()`, reads better for the initial step.
    pub fn start(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Adds a step to the job. Steps run in the order they are added.
    pub fn next(mut self, step: &'a dyn Step) -> JobBuilder<'a> {
        self.steps.push(step);
        self
    }

    /// Registers a listener. Listeners are notified in registration order.
    pub fn listener(mut self, listener: &'a dyn JobExecutionListener) -> JobBuilder<'a> {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Result<JobInstance<'a>, BatchError> {
        if self.steps.is_empty() {
            return Err(BatchError::Configuration(
                "a job needs at least one step".to_string(),
            ));
        }

        Ok(JobInstance {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_else(build_name),
            steps: self.steps,
            listeners: self.listeners,
            last_run_id: Cell::new(0),
        })
    }
}
