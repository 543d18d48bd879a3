mod event_bus;

pub mod effects;
pub mod time;

pub use event_bus::{
    EventBus, ReviewCreatedPayload, ReviewDeletedPayload, ReviewEvent, ReviewUpdatedPayload,
};
