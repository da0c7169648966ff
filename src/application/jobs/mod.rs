mod cycle;
mod enqueue;
mod retry;
mod worker;

pub use cycle::{
    CycleContext, CycleTick, ScheduleError, cycle_schedule, job_failed, process_cycle_tick,
};
pub use enqueue::{EnqueueCommand, EnqueueError, EnqueueOutcome, EnqueueService};
pub use retry::{RetryError, RetryService};
pub use worker::{
    BatchWorker, CycleReport, METRIC_JOB_ITEMS_FAILED, METRIC_JOBS_COMPLETED, METRIC_JOBS_FAILED,
    WorkerSettings,
};
