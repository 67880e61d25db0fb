//! Background jobs on cron schedules.
//!
//! Expressions use the 6-field format (`sec min hour day month weekday`).
//! Each job runs in its own Tokio task and stops when the scheduler shuts down.

use std::{future::Future, pin::Pin, str::FromStr, sync::Arc};

use chrono::Utc;
use cron::Schedule;
use thiserror::Error;
use tokio::{sync::watch, task::JoinHandle};

use crate::{services::members::MemberRepository, state::AppState};

type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

#[derive(Debug, Error)]
pub enum CronError {
    #[error("Invalid cron expression for job `{name}`: {reason}")]
    InvalidExpression { name: String, reason: String },
}

struct CronJob {
    name:     String,
    schedule: Schedule,
    run:      JobFn,
}

pub struct Scheduler {
    jobs:     Vec<CronJob>,
    shutdown: watch::Sender<bool>,
    handles:  Vec<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self { jobs: Vec::new(), shutdown, handles: Vec::new() }
    }

    pub fn add_job<F, Fut>(&mut self, name: &str, expression: &str, job: F) -> Result<(), CronError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let schedule = Schedule::from_str(expression).map_err(|e| CronError::InvalidExpression {
            name:   name.to_string(),
            reason: e.to_string(),
        })?;

        self.jobs.push(CronJob {
            name: name.to_string(),
            schedule,
            run: Arc::new(move || Box::pin(job()) as JobFuture),
        });
        Ok(())
    }

    #[cfg(test)]
    pub fn job_names(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.name.as_str()).collect()
    }

    /// Spawns one task per registered job.
    pub fn start(&mut self) {
        for job in self.jobs.drain(..) {
            let mut stop = self.shutdown.subscribe();
            tracing::info!(job = %job.name, "Cron job started");

            self.handles.push(tokio::spawn(async move {
                loop {
                    let Some(next) = job.schedule.upcoming(Utc).next() else {
                        tracing::warn!(job = %job.name, "Cron schedule has no upcoming runs");
                        return;
                    };
                    let wait = (next - Utc::now()).to_std().unwrap_or_default();

                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = stop.changed() => return,
                    }

                    if let Err(err) = (job.run)().await {
                        tracing::error!(job = %job.name, error = %err, "Cron job failed");
                    }
                }
            }));
        }
    }

    /// Signals every job to stop and waits for the tasks to finish. A job
    /// that is mid-run completes its current run first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        tracing::info!("Cron scheduler stopped");
    }
}

// ── Jobs ─────────────────────────────────────────────────────

/// Registers the job that hard-deletes members soft-deleted longer than the
/// configured retention window.
pub fn register_member_purge(scheduler: &mut Scheduler, state: &AppState) -> Result<(), CronError> {
    let members = state.members.clone();
    let days = state.config.deleted_member_retention_days;

    scheduler.add_job("member-purge", &state.config.member_purge_schedule, move || {
        let members = members.clone();
        async move {
            run_member_purge(members.as_ref(), days).await?;
            Ok(())
        }
    })
}

pub async fn run_member_purge(members: &dyn MemberRepository, retention_days: u32) -> anyhow::Result<u64> {
    let affected = members.purge_deleted(retention_days).await?;
    if affected > 0 {
        tracing::info!(affected, retention_days, "Purged deleted members");
    }
    Ok(affected)
}
