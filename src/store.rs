use crate::errors::TimerError;
use crate::events::{EVENT_CAPACITY, TimerEvent};
use crate::models::{
    AppData, CompletionRecord, QUICK_CATEGORY, QUICK_DURATION_SECS, Timer, TimerSpec,
};
use crate::storage::{Persister, load_data};
use crate::ticker::{self, TickOutcome};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Driver {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct StoreState {
    timers: Vec<Timer>,
    history: Vec<CompletionRecord>,
    drivers: HashMap<String, Driver>,
    next_generation: u64,
}

impl StoreState {
    fn position(&self, id: &str) -> Option<usize> {
        self.timers.iter().position(|timer| timer.id == id)
    }

    fn cancel_driver(&mut self, id: &str) {
        if let Some(driver) = self.drivers.remove(id) {
            driver.handle.abort();
            debug!(timer_id = id, generation = driver.generation, "driver canceled");
        }
    }

    fn cancel_all(&mut self) {
        for (_, driver) in self.drivers.drain() {
            driver.handle.abort();
        }
    }

    fn snapshot(&self) -> AppData {
        AppData {
            timers: self.timers.clone(),
            history: self.history.clone(),
        }
    }
}

pub(crate) struct Shared {
    data_path: PathBuf,
    state: Mutex<StoreState>,
    persister: Persister,
    events: broadcast::Sender<TimerEvent>,
}

/// The authoritative timer collection together with the drivers ticking it.
///
/// Every mutation happens under one lock and is followed by a snapshot write.
#[derive(Clone)]
pub struct TimerStore {
    shared: Arc<Shared>,
}

impl TimerStore {
    /// Creates an empty store writing snapshots to `data_path`.
    pub fn new(data_path: PathBuf) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                persister: Persister::spawn(data_path.clone()),
                data_path,
                state: Mutex::new(StoreState::default()),
                events,
            }),
        }
    }

    /// Creates a store and loads the snapshot at `data_path` into it.
    pub async fn open(data_path: PathBuf) -> Self {
        let store = Self::new(data_path);
        store.load_all().await;
        store
    }

    pub(crate) fn from_weak(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    pub fn data_path(&self) -> &Path {
        &self.shared.data_path
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.shared.events.subscribe()
    }

    /// Replaces the in-memory state with the stored snapshot.
    ///
    /// Drivers do not survive a restart: every timer is loaded paused. The
    /// ones that were stored as running come back as `Interrupted` events for
    /// the caller to deliver, so none can be lost to a lagging subscriber.
    pub async fn load_all(&self) -> Vec<TimerEvent> {
        let data = load_data(&self.shared.data_path).await;
        let mut interrupted = Vec::new();
        let mut timers = Vec::with_capacity(data.timers.len());

        for mut timer in data.timers {
            if timer.duration == 0 {
                warn!(timer_id = %timer.id, "dropping stored timer with zero duration");
                continue;
            }
            timer.time = timer.time.min(timer.duration);
            if timer.running {
                timer.running = false;
                interrupted.push(TimerEvent::Interrupted {
                    timer_id: timer.id.clone(),
                    name: timer.display_name().to_string(),
                });
            }
            timers.push(timer);
        }

        let count = timers.len();
        {
            let mut state = self.shared.state.lock().await;
            state.cancel_all();
            state.timers = timers;
            state.history = data.history;
        }

        info!(
            timers = count,
            interrupted = interrupted.len(),
            path = %self.shared.data_path.display(),
            "timers loaded"
        );
        interrupted
    }

    pub async fn list(&self) -> Vec<Timer> {
        self.shared.state.lock().await.timers.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Timer> {
        let state = self.shared.state.lock().await;
        state.position(id).map(|index| state.timers[index].clone())
    }

    pub async fn history(&self) -> Vec<CompletionRecord> {
        self.shared.state.lock().await.history.clone()
    }

    pub async fn active_drivers(&self) -> usize {
        self.shared.state.lock().await.drivers.len()
    }

    pub async fn add_timer(&self, spec: TimerSpec) -> Result<Timer, TimerError> {
        let form = match spec {
            TimerSpec::Form(form) => Some(form.validate()?),
            TimerSpec::Quick => None,
        };

        let mut state = self.shared.state.lock().await;
        let timer = match form {
            Some((name, duration, category)) => Timer::new(name, duration, Some(category)),
            None => Timer::new(
                format!("Timer {}", state.timers.len() + 1),
                QUICK_DURATION_SECS,
                Some(QUICK_CATEGORY.to_string()),
            ),
        };

        info!(timer_id = %timer.id, name = %timer.name, duration = timer.duration, "timer added");
        state.timers.push(timer.clone());
        self.persist_locked(&state);
        Ok(timer)
    }

    /// Starts ticking `id`. Unknown, running and finished timers are left alone.
    pub async fn start_timer(&self, id: &str) -> Option<Timer> {
        let mut state = self.shared.state.lock().await;
        self.start_locked(&mut state, id)
    }

    pub async fn pause_timer(&self, id: &str) -> Option<Timer> {
        let mut state = self.shared.state.lock().await;
        self.pause_locked(&mut state, id)
    }

    pub async fn toggle_timer(&self, id: &str) -> Option<Timer> {
        let mut state = self.shared.state.lock().await;
        let index = state.position(id)?;
        if state.timers[index].running {
            self.pause_locked(&mut state, id)
        } else {
            self.start_locked(&mut state, id)
        }
    }

    pub async fn reset_timer(&self, id: &str) -> Option<Timer> {
        let mut state = self.shared.state.lock().await;
        state.cancel_driver(id);
        let reset = state.position(id).map(|index| {
            let timer = &mut state.timers[index];
            timer.clear_progress();
            timer.clone()
        });
        if reset.is_some() {
            info!(timer_id = id, "timer reset");
        }
        self.persist_locked(&state);
        reset
    }

    pub async fn remove_timer(&self, id: &str) -> Option<Timer> {
        let mut state = self.shared.state.lock().await;
        state.cancel_driver(id);
        let index = state.position(id)?;
        let removed = state.timers.remove(index);
        info!(timer_id = id, "timer removed");
        self.persist_locked(&state);
        Some(removed)
    }

    /// Queues a snapshot of the current collection.
    pub async fn persist(&self) {
        let state = self.shared.state.lock().await;
        self.persist_locked(&state);
    }

    /// Waits until every queued snapshot has been written.
    pub async fn flush(&self) {
        self.shared.persister.flush().await;
    }

    /// Stops every driver and writes a final snapshot. Timers that were
    /// running stay marked as running so the next load reports them.
    pub async fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock().await;
            state.cancel_all();
            self.persist_locked(&state);
        }
        self.flush().await;
        info!("timer store shut down");
    }

    /// Applies one tick from the driver registered as `generation`.
    pub(crate) async fn tick(&self, id: &str, generation: u64) -> Result<TickOutcome, TimerError> {
        let stale = || TimerError::StaleReference(id.to_string());
        let mut state = self.shared.state.lock().await;

        match state.drivers.get(id) {
            Some(driver) if driver.generation == generation => {}
            _ => return Err(stale()),
        }
        let Some(index) = state.position(id).filter(|index| state.timers[*index].running) else {
            state.drivers.remove(id);
            return Err(stale());
        };

        let timer = &mut state.timers[index];
        let step = ticker::advance(timer);
        let name = timer.display_name().to_string();
        let mut events = Vec::new();

        if step.halfway {
            debug!(timer_id = id, "halfway reached");
            events.push(TimerEvent::Halfway {
                timer_id: id.to_string(),
                name: name.clone(),
            });
        }

        let outcome = if step.completed {
            let completed_at = Utc::now();
            state.drivers.remove(id);
            state.history.push(CompletionRecord {
                timer_id: id.to_string(),
                name: name.clone(),
                completed_at,
            });
            info!(timer_id = id, name = %name, "timer completed");
            events.push(TimerEvent::Completed {
                timer_id: id.to_string(),
                name,
                completed_at,
            });
            TickOutcome::Finished
        } else {
            TickOutcome::Continue
        };

        self.persist_locked(&state);
        drop(state);

        for event in events {
            self.emit(event);
        }
        Ok(outcome)
    }

    fn start_locked(&self, state: &mut StoreState, id: &str) -> Option<Timer> {
        let index = state.position(id)?;
        let timer = &state.timers[index];
        if timer.running || timer.is_complete() {
            return Some(timer.clone());
        }

        state.next_generation += 1;
        let generation = state.next_generation;
        let handle = ticker::spawn(Arc::downgrade(&self.shared), id.to_string(), generation);
        if let Some(previous) = state
            .drivers
            .insert(id.to_string(), Driver { generation, handle })
        {
            previous.handle.abort();
        }

        let timer = &mut state.timers[index];
        timer.running = true;
        let started = timer.clone();
        info!(timer_id = id, time = started.time, "timer started");
        self.persist_locked(state);
        Some(started)
    }

    fn pause_locked(&self, state: &mut StoreState, id: &str) -> Option<Timer> {
        let index = state.position(id)?;
        if !state.timers[index].running {
            return Some(state.timers[index].clone());
        }

        state.cancel_driver(id);
        let timer = &mut state.timers[index];
        timer.running = false;
        let paused = timer.clone();
        info!(timer_id = id, time = paused.time, "timer paused");
        self.persist_locked(state);
        Some(paused)
    }

    fn persist_locked(&self, state: &StoreState) {
        self.shared.persister.enqueue(state.snapshot());
    }

    fn emit(&self, event: TimerEvent) {
        // No subscribers is not an error.
        let _ = self.shared.events.send(event);
    }
}
