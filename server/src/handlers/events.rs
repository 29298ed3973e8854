use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;

use crate::models::{parse_timestamp, EventChanges, EventFilter, FieldUpdate, NewEvent};
use crate::repositories::event_repository::{DEFAULT_LIMIT, DEFAULT_OFFSET};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, ok, success};

const INVALID_ID: &str = "Invalid ID";
const EVENT_NOT_FOUND: &str = "Event not found";

#[derive(Debug, Default, Deserialize)]
pub struct ListEventsQuery {
    #[serde(rename = "startDate")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate")]
    pub end_date: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl ListEventsQuery {
    /// Blank values count as absent.
    pub fn into_filter(self) -> Result<EventFilter, AppError> {
        Ok(EventFilter {
            start_date: non_blank(self.start_date)
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            end_date: non_blank(self.end_date)
                .map(|s| parse_timestamp(&s))
                .transpose()?,
            limit: parse_count("limit", self.limit)?,
            offset: parse_count("offset", self.offset)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub start_time: Option<String>,
    pub location: Option<String>,
}

impl CreateEventRequest {
    pub fn into_new_event(self) -> Result<NewEvent, AppError> {
        let (Some(title), Some(start_time)) = (
            self.title.filter(|t| !t.is_empty()),
            non_blank(self.start_time),
        ) else {
            return Err(AppError::ValidationError(
                "Title and start time are required".to_string(),
            ));
        };

        Ok(NewEvent {
            title,
            start_time: parse_timestamp(&start_time)?,
            location: self.location,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateEventRequest {
    #[serde(default)]
    pub title: FieldUpdate<String>,
    #[serde(default)]
    pub start_time: FieldUpdate<String>,
    #[serde(default)]
    pub location: FieldUpdate<String>,
}

impl UpdateEventRequest {
    pub fn into_changes(self) -> Result<EventChanges, AppError> {
        let title = match self.title {
            FieldUpdate::Unchanged => None,
            FieldUpdate::Clear => return Err(required_field("title")),
            FieldUpdate::Set(t) if t.is_empty() => return Err(required_field("title")),
            FieldUpdate::Set(t) => Some(t),
        };

        let start_time = match self.start_time {
            FieldUpdate::Unchanged => None,
            FieldUpdate::Clear => return Err(required_field("start_time")),
            FieldUpdate::Set(s) => Some(parse_timestamp(&s)?),
        };

        Ok(EventChanges {
            title,
            start_time,
            location: self.location,
        })
    }
}

fn required_field(name: &str) -> AppError {
    AppError::ValidationError(format!("{} cannot be null or empty", name))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_count(name: &str, raw: Option<String>) -> Result<Option<i64>, AppError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };

    match raw.trim().parse::<i64>() {
        Ok(n) if n >= 0 => Ok(Some(n)),
        _ => Err(AppError::ValidationError(format!(
            "{} must be a non-negative integer",
            name
        ))),
    }
}

pub fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::ValidationError(INVALID_ID.to_string()))
}

fn path_id(path: Result<Path<String>, PathRejection>) -> Result<i64, AppError> {
    let Path(raw) = path?;
    parse_id(&raw)
}

fn not_found() -> AppError {
    AppError::NotFound(EVENT_NOT_FOUND.to_string())
}

pub async fn list_events(
    State(state): State<AppState>,
    query: Result<Query<ListEventsQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;

    let events = if filter.has_date_bounds() {
        state.events.find_by_date_range(&filter).await?
    } else {
        state
            .events
            .find_all(
                filter.limit.unwrap_or(DEFAULT_LIMIT),
                filter.offset.unwrap_or(DEFAULT_OFFSET),
            )
            .await?
    };

    Ok(ok(events))
}

pub async fn get_event(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    let id = path_id(id)?;

    let event = state.events.find_by_id(id).await?.ok_or_else(not_found)?;
    Ok(ok(event))
}

pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload?;
    let new_event = payload.into_new_event()?;

    let event = state.events.create(new_event).await?;
    tracing::info!(event_id = event.id, "Event created");

    Ok(created(event, "Event created successfully"))
}

pub async fn update_event(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
    payload: Result<Json<UpdateEventRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let id = path_id(id)?;
    let Json(payload) = payload?;
    let changes = payload.into_changes()?;

    let event = state
        .events
        .update(id, changes)
        .await?
        .ok_or_else(not_found)?;

    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Response, AppError> {
    let id = path_id(id)?;

    if !state.events.delete(id).await? {
        return Err(not_found());
    }

    tracing::info!(event_id = id, "Event deleted");
    Ok(empty_success("Event deleted successfully"))
}
