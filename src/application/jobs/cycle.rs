//! Cron-driven processing cycles for `serve`.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::{Data, Error as ApalisError};
use apalis_cron::Schedule;
use thiserror::Error;

use super::worker::BatchWorker;

/// Marker for one scheduler tick.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct CycleTick;

impl From<chrono::DateTime<chrono::Utc>> for CycleTick {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

#[derive(Clone)]
pub struct CycleContext {
    pub worker: Arc<BatchWorker>,
    pub max_batches: usize,
}

#[derive(Debug, Error)]
#[error("invalid cron expression `{expression}`: {reason}")]
pub struct ScheduleError {
    pub expression: String,
    pub reason: String,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}

pub async fn process_cycle_tick(
    _tick: CycleTick,
    ctx: Data<CycleContext>,
) -> Result<(), ApalisError> {
    ctx.worker
        .run_cycle(ctx.max_batches)
        .await
        .map(|_| ())
        .map_err(|err| {
            tracing::warn!(
                target = "application::jobs::cycle",
                error = %err,
                "Processing cycle aborted"
            );
            job_failed(err)
        })
}

/// Parse a six-field cron expression (seconds first).
pub fn cycle_schedule(expression: &str) -> Result<Schedule, ScheduleError> {
    Schedule::from_str(expression.trim()).map_err(|err| ScheduleError {
        expression: expression.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_parses_and_yields_upcoming_ticks() {
        let schedule = cycle_schedule("0 * * * * *").expect("valid expression");
        let upcoming: Vec<_> = schedule.upcoming(chrono::Utc).take(3).collect();
        assert_eq!(upcoming.len(), 3);
    }

    #[test]
    fn malformed_schedule_is_reported() {
        let err = cycle_schedule("every minute").expect_err("invalid expression");
        assert_eq!(err.expression, "every minute");
    }
}
