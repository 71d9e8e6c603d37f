pub mod client;
pub mod dispatcher;

pub use client::{HttpInboxApi, InboxApi};
pub use dispatcher::ActionDispatcher;
