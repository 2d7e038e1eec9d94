//! Order records, the status state machine, and persistence.

mod sqlite_store;
mod status;
mod store;
mod types;

pub use sqlite_store::{SqliteOrderStore, DEFAULT_CHANGE_CAPACITY};
pub use status::{Actor, InvalidStatus, OrderStatus, TransitionError};
pub use store::{
    ChangeKind, CreateOrderRequest, OrderChange, OrderError, OrderFilter, OrderStore,
};
pub use types::{FileRef, Order, StatusChange};
