pub mod app;
pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod state;
pub mod storage;
pub mod store;
pub mod ticker;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use store::TimerStore;
