use crate::events::AlertInbox;
use crate::store::TimerStore;

#[derive(Clone)]
pub struct AppState {
    pub store: TimerStore,
    pub alerts: AlertInbox,
}

impl AppState {
    pub fn new(store: TimerStore) -> Self {
        let alerts = AlertInbox::listen(store.subscribe());
        Self { store, alerts }
    }

    /// Loads the stored timers and files one alert per timer the restart paused.
    pub async fn restore(&self) -> usize {
        let interrupted = self.store.load_all().await;
        let count = interrupted.len();
        for event in interrupted {
            self.alerts.push(event).await;
        }
        count
    }
}
