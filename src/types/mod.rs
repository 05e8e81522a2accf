// ABOUTME: Core domain types shared by the fetch, dispatch and deploy layers.
// ABOUTME: Event ids, stable handler ids and store object names.

mod event;
mod handler_id;
mod resource_name;

pub use event::{Event, EventId};
pub use handler_id::HandlerId;
pub use resource_name::{OWNER, ResourceName, ResourceNamer};
