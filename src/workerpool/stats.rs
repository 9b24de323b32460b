use std::time::Duration;

use serde::Serialize;

use super::task::TaskState;

/// Smoothing factor of the wait/processing time averages.
const EMA_ALPHA: f64 = 0.2;

/// Running counters of one pool. Timed-out and canceled tasks also count as failed.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub canceled: u64,
    pub duplicates: u64,
    avg_wait_ms: Option<f64>,
    avg_processing_ms: Option<f64>,
}

fn ema(current: Option<f64>, sample: f64) -> f64 {
    match current {
        Some(avg) => EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * avg,
        None => sample,
    }
}

impl PoolStats {
    /// Tasks that reached a terminal state.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }

    pub fn record_start(&mut self, waited: Duration) {
        self.avg_wait_ms = Some(ema(self.avg_wait_ms, waited.as_secs_f64() * 1000.0));
    }

    pub fn record_finish(&mut self, state: TaskState, processing: Option<Duration>) {
        match state {
            TaskState::Completed => self.completed += 1,
            TaskState::TimedOut => {
                self.timed_out += 1;
                self.failed += 1;
            }
            TaskState::Canceled => {
                self.canceled += 1;
                self.failed += 1;
            }
            _ => self.failed += 1,
        }
        if let Some(processing) = processing {
            self.avg_processing_ms = Some(ema(
                self.avg_processing_ms,
                processing.as_secs_f64() * 1000.0,
            ));
        }
    }

    pub fn snapshot(&self, active_workers: usize, queue_depth: usize, running: usize) -> PoolMetrics {
        PoolMetrics {
            active_workers,
            queue_depth,
            running,
            submitted: self.submitted,
            completed: self.completed,
            failed: self.failed,
            timed_out: self.timed_out,
            canceled: self.canceled,
            duplicates: self.duplicates,
            avg_wait_ms: self.avg_wait_ms.unwrap_or(0.0),
            avg_processing_ms: self.avg_processing_ms.unwrap_or(0.0),
        }
    }
}

/// Read-only view of a pool's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolMetrics {
    pub active_workers: usize,
    pub queue_depth: usize,
    pub running: usize,
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub canceled: u64,
    pub duplicates: u64,
    pub avg_wait_ms: f64,
    pub avg_processing_ms: f64,
}
