//! Real-time push for the marketplace: a [`Dispatcher`] that fans events out
//! to connected clients, and the WebSocket connection loop that feeds it.

pub mod connection;
pub mod dispatcher;

pub use dispatcher::Dispatcher;
