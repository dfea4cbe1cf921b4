//! Periodic scheduler
//!
//! Runs one reconciliation, logs whatever went wrong, sleeps the configured
//! interval and starts over. Runs never overlap: each one executes on the
//! blocking pool and is awaited before the next sleep begins. Nothing that
//! happens inside a run, panics included, escapes the loop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::MirrorError;
use crate::logging::*;
use crate::reconcile::Reconciler;
use crate::types::RunReport;

/// A unit of work the scheduler repeats on every tick
pub trait Reconcile: Send + Sync + 'static {
	fn reconcile(&self) -> Result<RunReport, MirrorError>;
}

impl Reconcile for Reconciler {
	fn reconcile(&self) -> Result<RunReport, MirrorError> {
		self.run()
	}
}

pub struct Scheduler<R: Reconcile = Reconciler> {
	job: Arc<R>,
	interval: Duration,
}

impl Scheduler<Reconciler> {
	/// Scheduler for the source/replica pair and interval in `config`
	pub fn new(config: &Config) -> Result<Self, MirrorError> {
		Ok(Scheduler::with_job(Reconciler::new(config)?, config.interval()))
	}
}

impl<R: Reconcile> Scheduler<R> {
	pub fn with_job(job: R, interval: Duration) -> Self {
		Scheduler { job: Arc::new(job), interval }
	}

	/// Execute one run on the blocking pool and return its outcome.
	///
	/// A panic inside the run comes back as `MirrorError::Task`.
	pub async fn run_once(&self) -> Result<RunReport, MirrorError> {
		let job = Arc::clone(&self.job);
		match tokio::task::spawn_blocking(move || job.reconcile()).await {
			Ok(result) => result,
			Err(e) => Err(MirrorError::Task { message: e.to_string() }),
		}
	}

	/// One tick: run, then log and swallow any error
	pub async fn tick(&self) -> Option<RunReport> {
		match self.run_once().await {
			Ok(report) => Some(report),
			Err(e) => {
				error!("Error during synchronization: {}", e);
				None
			}
		}
	}

	/// Tick until `shutdown` resolves; returns the number of completed runs.
	///
	/// A run already in progress when shutdown is requested is allowed to
	/// finish first.
	pub async fn run_until<F>(&self, shutdown: F) -> usize
	where
		F: Future<Output = ()>,
	{
		tokio::pin!(shutdown);
		let mut runs = 0;

		loop {
			let tick = self.tick();
			tokio::pin!(tick);
			tokio::select! {
				_ = &mut tick => {}
				_ = &mut shutdown => {
					info!("Shutdown requested, waiting for the current run to finish");
					tick.await;
					return runs + 1;
				}
			}
			runs += 1;

			tokio::select! {
				_ = tokio::time::sleep(self.interval) => {}
				_ = &mut shutdown => return runs,
			}
		}
	}

	/// Tick forever; only process termination stops this
	pub async fn run_forever(&self) {
		self.run_until(std::future::pending::<()>()).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct Flaky {
		calls: AtomicUsize,
	}

	impl Reconcile for Flaky {
		fn reconcile(&self) -> Result<RunReport, MirrorError> {
			match self.calls.fetch_add(1, Ordering::SeqCst) {
				0 => Err(MirrorError::config("first run fails")),
				1 => panic!("second run panics"),
				_ => Ok(RunReport::default()),
			}
		}
	}

	#[tokio::test]
	async fn test_failures_do_not_stop_later_runs() {
		let scheduler =
			Scheduler::with_job(Flaky { calls: AtomicUsize::new(0) }, Duration::from_millis(5));

		assert!(scheduler.tick().await.is_none());
		assert!(scheduler.tick().await.is_none());
		assert!(scheduler.tick().await.is_some());
	}

	#[tokio::test]
	async fn test_panic_becomes_task_error() {
		let flaky = Flaky { calls: AtomicUsize::new(1) };
		let scheduler = Scheduler::with_job(flaky, Duration::from_millis(5));
		match scheduler.run_once().await {
			Err(MirrorError::Task { .. }) => {}
			other => panic!("expected task error, got {:?}", other.map(|r| r.to_string())),
		}
	}

	#[tokio::test]
	async fn test_run_until_repeats_at_interval() {
		let job = Flaky { calls: AtomicUsize::new(2) };
		let scheduler = Scheduler::with_job(job, Duration::from_millis(10));
		let runs = scheduler.run_until(tokio::time::sleep(Duration::from_millis(200))).await;
		assert!(runs >= 3, "only {} runs", runs);
		assert_eq!(runs, scheduler.job.calls.load(Ordering::SeqCst) - 2);
	}
}

// vim: ts=4
