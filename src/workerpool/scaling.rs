use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    Hold,
    /// Spawn this many workers.
    Up(usize),
    /// Retire this many workers after their current task.
    Down(usize),
}

/// Decide how the worker count should change for the current queue depth.
///
/// Grows by `min(queue - active, max - active)` while the queue outnumbers the
/// workers. Shrinks by half the excess over `min` (at least one) once the
/// queue is below half the worker count.
pub fn plan_scaling(queue_depth: usize, active: usize, min: usize, max: usize) -> ScaleAction {
    if queue_depth > active && active < max {
        let add = (queue_depth - active).min(max - active);
        return ScaleAction::Up(add);
    }
    if queue_depth < active / 2 && active > min {
        let remove = ((active - min) / 2).max(1);
        return ScaleAction::Down(remove);
    }
    ScaleAction::Hold
}

/// No previous action always allows scaling.
pub fn cooldown_elapsed(last_scale: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
    match last_scale {
        Some(last) => now.saturating_duration_since(last) >= cooldown,
        None => true,
    }
}
