mod client;
mod conn;

pub use client::Client;
pub use conn::Conn;
