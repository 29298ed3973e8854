//! Data access for the `events` table.
//!
//! Each operation is split into a pure statement builder and the async call
//! that runs it, so the generated SQL and its parameter order can be checked
//! without a database.

use crate::db::{Clause, Database, SqlStatement, SqlValue};
use crate::models::{Event, EventChanges, EventFilter, FieldUpdate, NewEvent};

pub const DEFAULT_LIMIT: i64 = 100;
pub const DEFAULT_OFFSET: i64 = 0;

const SELECT_EVENTS: &str = "SELECT id, title, start_time, location FROM events";
const RETURNING_EVENT: &str = " RETURNING id, title, start_time, location";
const ORDER_BY_START: &str = " ORDER BY start_time ASC, id ASC";

#[derive(Debug, Clone)]
pub struct EventRepository {
    db: Database,
}

impl EventRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn create(&self, event: NewEvent) -> Result<Event, sqlx::Error> {
        self.db
            .fetch_optional(insert_statement(event))
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>, sqlx::Error> {
        self.db.fetch_optional(find_by_id_statement(id)).await
    }

    pub async fn find_all(&self, limit: i64, offset: i64) -> Result<Vec<Event>, sqlx::Error> {
        self.db.fetch_all(find_all_statement(limit, offset)).await
    }

    pub async fn find_by_date_range(&self, filter: &EventFilter) -> Result<Vec<Event>, sqlx::Error> {
        self.db.fetch_all(date_range_statement(filter)).await
    }

    /// Applies `changes` and returns the updated row. An empty change set is a
    /// plain lookup.
    pub async fn update(&self, id: i64, changes: EventChanges) -> Result<Option<Event>, sqlx::Error> {
        match update_statement(id, changes) {
            Some(statement) => self.db.fetch_optional(statement).await,
            None => self.find_by_id(id).await,
        }
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let affected = self.db.execute(delete_statement(id)).await?;
        Ok(affected > 0)
    }
}

pub fn insert_statement(event: NewEvent) -> SqlStatement {
    let location = event.location.filter(|l| !l.is_empty());

    let mut statement = SqlStatement::new("INSERT INTO events (title, start_time, location) VALUES (");
    statement
        .push_separated(
            [
                Clause::new("", event.title),
                Clause::new("", event.start_time),
                Clause::new("", SqlValue::NullableText(location)),
            ],
            ", ",
        )
        .push(")")
        .push(RETURNING_EVENT);
    statement
}

pub fn find_by_id_statement(id: i64) -> SqlStatement {
    let mut statement = SqlStatement::new(SELECT_EVENTS);
    statement.push_conditions([Clause::new("id = ", id)]);
    statement
}

pub fn find_all_statement(limit: i64, offset: i64) -> SqlStatement {
    let mut statement = SqlStatement::new(SELECT_EVENTS);
    statement
        .push(ORDER_BY_START)
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    statement
}

pub fn date_range_statement(filter: &EventFilter) -> SqlStatement {
    let mut conditions = Vec::new();
    if let Some(start) = filter.start_date {
        conditions.push(Clause::new("start_time >= ", start));
    }
    if let Some(end) = filter.end_date {
        conditions.push(Clause::new("start_time <= ", end));
    }

    let mut statement = SqlStatement::new(SELECT_EVENTS);
    statement.push_conditions(conditions).push(ORDER_BY_START);

    // LIMIT must precede OFFSET.
    if let Some(limit) = filter.limit {
        statement.push(" LIMIT ").push_bind(limit);
    }
    if let Some(offset) = filter.offset {
        statement.push(" OFFSET ").push_bind(offset);
    }
    statement
}

/// `None` when there is nothing to change.
pub fn update_statement(id: i64, changes: EventChanges) -> Option<SqlStatement> {
    if changes.is_empty() {
        return None;
    }

    let mut assignments = Vec::new();
    if let Some(title) = changes.title {
        assignments.push(Clause::new("title = ", title));
    }
    if let Some(start_time) = changes.start_time {
        assignments.push(Clause::new("start_time = ", start_time));
    }
    match changes.location {
        FieldUpdate::Unchanged => {}
        FieldUpdate::Clear => assignments.push(Clause::new("location = ", None::<String>)),
        FieldUpdate::Set(location) => {
            assignments.push(Clause::new("location = ", Some(location)))
        }
    }

    let mut statement = SqlStatement::new("UPDATE events SET ");
    statement
        .push_separated(assignments, ", ")
        .push_conditions([Clause::new("id = ", id)])
        .push(RETURNING_EVENT);
    Some(statement)
}

pub fn delete_statement(id: i64) -> SqlStatement {
    let mut statement = SqlStatement::new("DELETE FROM events");
    statement.push_conditions([Clause::new("id = ", id)]);
    statement
}
