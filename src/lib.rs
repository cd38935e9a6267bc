//! Client side of the MySQL/MariaDB prepared statement handshake.
//!
//! - **Sans-I/O state machine**: [`protocol::command::prepared::Prepare`] assembles the
//!   COM_STMT_PREPARE response one packet at a time
//! - **Sync and async front ends** over an already-authenticated stream
//! - **Background client**: [`tokio::Client`] queues commands for a worker task and hands
//!   results back through a single-shot [`bridge`]
//!
//! # Example
//!
//! ```no_run
//! use std::net::TcpStream;
//! use zero_stmt::Opts;
//! use zero_stmt::sync::Conn;
//!
//! fn main() -> zero_stmt::Result<()> {
//!     // an authenticated session, e.g. handed over by a connection pool
//!     let stream = TcpStream::connect("127.0.0.1:3306")?;
//!     let mut conn = Conn::from_tcp(stream, &Opts::default())?;
//!
//!     let stmt = conn.prepare("SELECT name FROM users WHERE id = ?")?;
//!     assert_eq!(stmt.num_params(), 1);
//!     for column in stmt.columns() {
//!         println!("{}: {:?}", column.name, column.column_type());
//!     }
//!
//!     conn.reset_statement(&stmt)?;
//!     conn.close_statement(stmt)?;
//!     Ok(())
//! }
//! ```

pub mod buffer;
pub mod constant;
pub mod error;
mod opts;
mod prepared;
pub mod protocol;

#[cfg(feature = "tokio")]
pub mod bridge;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;

pub use error::{Error, Result};
pub use opts::Opts;
pub use prepared::PreparedStatement;
pub use protocol::command::FieldDefinition;
