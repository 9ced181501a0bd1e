use log::{Level, error, info};

use super::job::{BatchStatus, JobExecution};

/// Observer of a job's lifecycle.
///
/// Both callbacks default to no-ops. They cannot fail the run: by the time
/// `after_job` is called every chunk has already been committed or rolled back.
pub trait JobExecutionListener {
    /// Called once per run, before any step is opened.
    fn before_job(&self, _job_execution: &JobExecution) {}

    /// Called once per run with the final state of the execution.
    fn after_job(&self, _job_execution: &JobExecution) {}
}

/// Logs the start of a job and whether it completed or failed.
#[derive(Default)]
pub struct LoggingJobListener;

impl LoggingJobListener {
    /// Level of the message logged by `after_job` for `status`, if any.
    ///
    /// Only `Completed` and `Failed` produce a message.
    pub fn outcome_level(status: BatchStatus) -> Option<Level> {
        match status {
            BatchStatus::Completed => Some(Level::Info),
            BatchStatus::Failed => Some(Level::Error),
            _ => None,
        }
    }
}

impl JobExecutionListener for LoggingJobListener {
    fn before_job(&self, _job_execution: &JobExecution) {
        info!("{}", "-".repeat(115));
        info!("Initializing job...");
    }

    fn after_job(&self, job_execution: &JobExecution) {
        match Self::outcome_level(job_execution.status()) {
            Some(Level::Info) => info!("Job completed successfully!"),
            Some(_) => error!("Ops! Job not completed!"),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use log::Level;

    use crate::core::job::{BatchStatus, JobExecution};

    use super::{JobExecutionListener, LoggingJobListener};

    fn execution_with(status: BatchStatus) -> JobExecution {
        let mut execution = JobExecution::new("employeeJob", 1);
        execution.update_status(BatchStatus::Started).unwrap();
        execution.update_status(status).unwrap();
        execution
    }

    #[test]
    fn before_job_does_not_panic() {
        LoggingJobListener.before_job(&JobExecution::new("employeeJob", 1));
    }

    #[test]
    fn completed_is_logged_at_info() {
        let execution = execution_with(BatchStatus::Completed);
        LoggingJobListener.after_job(&execution);
        assert_eq!(
            LoggingJobListener::outcome_level(execution.status()),
            Some(Level::Info)
        );
    }

    #[test]
    fn failed_is_logged_at_error() {
        let execution = execution_with(BatchStatus::Failed);
        LoggingJobListener.after_job(&execution);
        assert_eq!(
            LoggingJobListener::outcome_level(execution.status()),
            Some(Level::Error)
        );
    }

    #[test]
    fn unknown_has_no_outcome_message() {
        let execution = execution_with(BatchStatus::Unknown);
        LoggingJobListener.after_job(&execution);
        assert_eq!(LoggingJobListener::outcome_level(BatchStatus::Unknown), None);
        assert_eq!(LoggingJobListener::outcome_level(BatchStatus::Stopped), None);
    }
}
