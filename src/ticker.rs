use crate::models::Timer;
use crate::store::{Shared, TimerStore};
use std::sync::Weak;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// What a single tick did to a timer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickStep {
    pub halfway: bool,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Finished,
}

/// Advances `timer` by one second.
///
/// Halfway and completion are both evaluated on every tick, so a timer whose
/// halfway point coincides with its end (a one second timer) reports both on
/// the same tick, halfway first.
pub fn advance(timer: &mut Timer) -> TickStep {
    let next = timer.time.saturating_add(1);
    let mut step = TickStep::default();

    if !timer.halfway_reached && next.saturating_mul(2) >= timer.duration {
        timer.halfway_reached = true;
        step.halfway = true;
    }

    if next >= timer.duration {
        timer.time = timer.duration;
        timer.running = false;
        step.completed = true;
    } else {
        timer.time = next;
    }

    step
}

/// Spawns the driver for one timer. The first tick is due one interval after
/// this call, not after the task is first polled. The task only holds a weak
/// reference to the store and stops at the first tick that is rejected.
pub(crate) fn spawn(shared: Weak<Shared>, id: String, generation: u64) -> JoinHandle<()> {
    let first = Instant::now() + TICK_INTERVAL;
    tokio::spawn(async move {
        let mut interval = time::interval_at(first, TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let Some(store) = TimerStore::from_weak(&shared) else {
                debug!(timer_id = %id, "store dropped, driver exiting");
                break;
            };

            match store.tick(&id, generation).await {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Finished) => break,
                Err(err) => {
                    debug!("{err}");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timer(duration: u64) -> Timer {
        let mut timer = Timer::new("Boil".to_string(), duration, None);
        timer.running = true;
        timer
    }

    #[test]
    fn ten_second_timer_hits_halfway_at_five() {
        let mut timer = timer(10);
        let steps: Vec<TickStep> = (0..10).map(|_| advance(&mut timer)).collect();

        let halfway_ticks: Vec<usize> = steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.halfway)
            .map(|(index, _)| index + 1)
            .collect();
        assert_eq!(halfway_ticks, vec![5]);
        assert!(steps[..9].iter().all(|step| !step.completed));
        assert!(steps[9].completed);
        assert_eq!(timer.time, 10);
        assert!(!timer.running);
    }

    #[test]
    fn one_second_timer_reports_halfway_and_completion_together() {
        let mut timer = timer(1);
        let step = advance(&mut timer);
        assert_eq!(
            step,
            TickStep {
                halfway: true,
                completed: true
            }
        );
        assert_eq!(timer.time, 1);
        assert!(timer.halfway_reached);
        assert!(!timer.running);
    }

    #[test]
    fn odd_duration_rounds_halfway_up() {
        let mut timer = timer(3);
        assert!(!advance(&mut timer).halfway);
        assert!(advance(&mut timer).halfway);
        assert_eq!(timer.time, 2);
        assert!(advance(&mut timer).completed);
    }

    #[test]
    fn halfway_fires_once_per_run() {
        let mut timer = timer(4);
        advance(&mut timer);
        assert!(advance(&mut timer).halfway);
        assert!(!advance(&mut timer).halfway);
        assert!(advance(&mut timer).completed);
        assert!(timer.time <= timer.duration);
    }
}
