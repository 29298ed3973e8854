pub mod event;

pub use event::{
    parse_timestamp, Event, EventChanges, EventFilter, FieldUpdate, InvalidTimestamp, NewEvent,
};
