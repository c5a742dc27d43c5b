//! Command dispatch for the LTZF admin panel
//!
//! The view layer talks to the backend exclusively through
//! [`Dispatcher::handle`]: it sends a [`Command`], gets an [`Event`] back,
//! and never sees an API key. Read requests without parameters are served
//! from the shared response cache.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod command;
pub mod connectivity;
pub mod dispatcher;
pub mod method;

pub use command::{Command, Event};
pub use connectivity::ConnectivityChecker;
pub use dispatcher::Dispatcher;
pub use method::{ApiCall, ApiMethod, BindError};
