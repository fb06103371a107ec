//! Recurring-task scheduler.
//!
//! Next runs are computed as plain data by [`Schedule::next_run`] instead
//! of cron expressions, so the schedule math is unit-testable and the
//! scheduler loop stays a thin enqueue shim.

use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use tokio::sync::watch;
use tokio::time;

use notifyhub_core::clock::Clock;
use notifyhub_core::config::RetryPolicy;
use notifyhub_queue::JobQueue;

use std::sync::Arc;

/// When a recurring task runs. All times are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Every day at the given time.
    Daily {
        /// Hour of day (0-23).
        hour: u32,
        /// Minute of hour (0-59).
        minute: u32,
    },
    /// Every week on the given weekday at the given time.
    Weekly {
        /// Day of week.
        weekday: Weekday,
        /// Hour of day (0-23).
        hour: u32,
        /// Minute of hour (0-59).
        minute: u32,
    },
    /// On a fixed interval from whenever the scheduler last fired.
    Every(Duration),
}

impl Schedule {
    /// The first instant strictly after `after` at which the schedule
    /// fires.
    pub fn next_run(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Self::Daily { hour, minute } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
                let mut candidate = Utc
                    .from_utc_datetime(&after.date_naive().and_time(time));
                if candidate <= after {
                    candidate += Duration::days(1);
                }
                candidate
            }
            Self::Weekly {
                weekday,
                hour,
                minute,
            } => {
                let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default();
                let days_ahead = (weekday.num_days_from_monday() as i64
                    - after.weekday().num_days_from_monday() as i64)
                    .rem_euclid(7);
                let mut candidate = Utc.from_utc_datetime(
                    &(after.date_naive() + Duration::days(days_ahead)).and_time(time),
                );
                if candidate <= after {
                    candidate += Duration::days(7);
                }
                candidate
            }
            Self::Every(interval) => after + interval,
        }
    }
}

/// One recurring enqueue: the job it creates and when.
pub struct RecurringTask {
    /// Task name for logs.
    pub name: String,
    /// When the task fires.
    pub schedule: Schedule,
    /// Target queue.
    pub queue: String,
    /// Job type to enqueue.
    pub job_type: String,
    /// Payload of the enqueued job.
    pub payload: serde_json::Value,
    /// Retry policy stamped on the enqueued job.
    pub retry: RetryPolicy,
}

/// Enqueues recurring tasks when their schedules fire.
pub struct RecurringScheduler {
    queue: JobQueue,
    clock: Arc<dyn Clock>,
    tasks: Vec<RecurringTask>,
}

impl RecurringScheduler {
    /// Create a scheduler over the given tasks.
    pub fn new(queue: JobQueue, clock: Arc<dyn Clock>, tasks: Vec<RecurringTask>) -> Self {
        Self {
            queue,
            clock,
            tasks,
        }
    }

    /// Run until the cancel signal flips true.
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        let now = self.clock.now();
        let mut next_runs: Vec<DateTime<Utc>> = self
            .tasks
            .iter()
            .map(|t| {
                let next = t.schedule.next_run(now);
                tracing::info!(task = %t.name, next_run = %next, "Registered recurring task");
                next
            })
            .collect();

        loop {
            if *cancel.borrow() {
                break;
            }
            let now = self.clock.now();
            for (task, next_run) in self.tasks.iter().zip(next_runs.iter_mut()) {
                if now < *next_run {
                    continue;
                }
                match self
                    .queue
                    .enqueue(&task.queue, &task.job_type, &task.payload, None, &task.retry)
                    .await
                {
                    Ok(job) => {
                        tracing::info!(task = %task.name, job_id = %job.id, "Recurring task enqueued");
                    }
                    Err(e) => {
                        tracing::error!(task = %task.name, error = %e, "Failed to enqueue recurring task");
                    }
                }
                *next_run = task.schedule.next_run(now);
            }

            // Wake at least once a minute so clock jumps are noticed.
            let sleep_until = next_runs
                .iter()
                .min()
                .map(|next| (*next - self.clock.now()).num_seconds().clamp(1, 60))
                .unwrap_or(60);
            tokio::select! {
                _ = cancel.changed() => {
                    if *cancel.borrow() {
                        break;
                    }
                }
                _ = time::sleep(std::time::Duration::from_secs(sleep_until as u64)) => {}
            }
        }
        tracing::info!("Recurring scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_daily_rolls_to_tomorrow_when_past() {
        let schedule = Schedule::Daily { hour: 2, minute: 0 };
        assert_eq!(
            schedule.next_run(utc("2026-03-02T01:00:00Z")),
            utc("2026-03-02T02:00:00Z")
        );
        assert_eq!(
            schedule.next_run(utc("2026-03-02T02:00:00Z")),
            utc("2026-03-03T02:00:00Z")
        );
    }

    #[test]
    fn test_weekly_lands_on_the_right_weekday() {
        // 2026-03-02 is a Monday.
        let schedule = Schedule::Weekly {
            weekday: Weekday::Sun,
            hour: 4,
            minute: 30,
        };
        assert_eq!(
            schedule.next_run(utc("2026-03-02T12:00:00Z")),
            utc("2026-03-08T04:30:00Z")
        );
        // On the day itself but past the time, skip a full week.
        assert_eq!(
            schedule.next_run(utc("2026-03-08T05:00:00Z")),
            utc("2026-03-15T04:30:00Z")
        );
    }

    #[test]
    fn test_interval_is_relative() {
        let schedule = Schedule::Every(Duration::minutes(15));
        assert_eq!(
            schedule.next_run(utc("2026-03-02T12:00:00Z")),
            utc("2026-03-02T12:15:00Z")
        );
    }
}
