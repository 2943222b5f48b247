//! Admission gate for batch send requests.
//!
//! Checks the one-time passcode, renders a body for every subscriber
//! and fans the batch out into the spool, one queue entry per
//! recipient. The HTTP surface, template engine and address storage
//! are the embedding application's concern; this crate defines the
//! contracts it plugs into.

mod book;
mod error;
mod gate;
mod render;

pub use book::{address_id, AddressBook, BookError, BookResult, FileAddressBook};
pub use error::{GateError, GateResult};
pub use gate::{BatchRequest, ScheduleGate};
pub use render::{Render, RenderContext, RenderError};
