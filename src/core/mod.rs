pub mod chat_stream;
pub mod config;
pub mod error;
pub mod frame;
pub mod gateway;
pub mod message;
pub mod protocol;
pub mod search;
pub mod session;
pub mod tools;
