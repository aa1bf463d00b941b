use crate::errors::AppError;
use crate::events::Alert;
use crate::models::{CompletionRecord, NewTimerForm, Timer, TimerSpec, TimerView};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

pub async fn list_timers(State(state): State<AppState>) -> Json<Vec<TimerView>> {
    let timers = state.store.list().await;
    Json(timers.iter().map(TimerView::from).collect())
}

pub async fn create_timer(
    State(state): State<AppState>,
    Json(form): Json<NewTimerForm>,
) -> Result<(StatusCode, Json<TimerView>), AppError> {
    let timer = state.store.add_timer(TimerSpec::Form(form)).await?;
    Ok((StatusCode::CREATED, Json(TimerView::from(&timer))))
}

pub async fn quick_timer(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TimerView>), AppError> {
    let timer = state.store.add_timer(TimerSpec::Quick).await?;
    Ok((StatusCode::CREATED, Json(TimerView::from(&timer))))
}

pub async fn start_timer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TimerView>, AppError> {
    to_view(&id, state.store.start_timer(&id).await)
}

pub async fn pause_timer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TimerView>, AppError> {
    to_view(&id, state.store.pause_timer(&id).await)
}

pub async fn toggle_timer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TimerView>, AppError> {
    to_view(&id, state.store.toggle_timer(&id).await)
}

pub async fn reset_timer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TimerView>, AppError> {
    to_view(&id, state.store.reset_timer(&id).await)
}

pub async fn remove_timer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .store
        .remove_timer(&id)
        .await
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| timer_not_found(&id))
}

pub async fn get_history(State(state): State<AppState>) -> Json<Vec<CompletionRecord>> {
    Json(state.store.history().await)
}

pub async fn get_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.alerts.pending().await)
}

pub async fn dismiss_alert(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<StatusCode, AppError> {
    if state.alerts.dismiss(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found(format!("no alert with id {id}")))
    }
}

fn to_view(id: &str, timer: Option<Timer>) -> Result<Json<TimerView>, AppError> {
    timer
        .map(|timer| Json(TimerView::from(&timer)))
        .ok_or_else(|| timer_not_found(id))
}

fn timer_not_found(id: &str) -> AppError {
    AppError::not_found(format!("no timer with id {id}"))
}
