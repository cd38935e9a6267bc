use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::bridge::{Completer, completion};
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::prepared::PreparedStatement;

use super::conn::Conn;

enum Command {
    Prepare {
        sql: Box<str>,
        tx: Completer<PreparedStatement>,
    },
    Reset {
        statement_id: u32,
        tx: Completer<()>,
    },
    Close {
        statement_id: u32,
    },
}

/// Cloneable handle to a connection driven by a background task
///
/// Commands are queued and executed one at a time in submission order. If the
/// connection breaks, the worker stops and every pending or later command fails
/// with [`Error::IncompleteResponse`].
#[derive(Debug, Clone)]
pub struct Client {
    command_tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Prepare { sql, .. } => f.debug_struct("Prepare").field("sql", sql).finish(),
            Command::Reset { statement_id, .. } => f
                .debug_struct("Reset")
                .field("statement_id", statement_id)
                .finish(),
            Command::Close { statement_id } => f
                .debug_struct("Close")
                .field("statement_id", statement_id)
                .finish(),
        }
    }
}

impl Client {
    /// Spawn the worker task for `conn` on the current tokio runtime
    pub fn spawn<S>(conn: Conn<S>, opts: &Opts) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        opts.validate()?;
        let (command_tx, command_rx) = mpsc::channel(opts.command_channel_size);
        tokio::spawn(worker(conn, command_rx).instrument(tracing::debug_span!("zero_stmt_worker")));
        Ok(Self { command_tx })
    }

    /// Prepare a statement
    pub async fn prepare(&self, sql: &str) -> Result<PreparedStatement> {
        let (tx, completion) = completion();
        self.send(Command::Prepare {
            sql: sql.into(),
            tx,
        })
        .await?;
        completion.await
    }

    /// Reset the data of a prepared statement on the server
    pub async fn reset_statement(&self, stmt: &PreparedStatement) -> Result<()> {
        let (tx, completion) = completion();
        self.send(Command::Reset {
            statement_id: stmt.id(),
            tx,
        })
        .await?;
        completion.await
    }

    /// Deallocate a prepared statement on the server
    ///
    /// Returns once the command is queued. Only a stopped worker is reported.
    pub async fn close_statement(&self, stmt: PreparedStatement) -> Result<()> {
        self.send(Command::Close {
            statement_id: stmt.id(),
        })
        .await
    }

    /// Whether the worker task has stopped
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| Error::IncompleteResponse)
    }
}

async fn worker<S>(mut conn: Conn<S>, mut command_rx: mpsc::Receiver<Command>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(command) = command_rx.recv().await {
        tracing::trace!(?command, "command");
        let broken = match command {
            Command::Prepare { sql, mut tx } => {
                if tx.is_abandoned() {
                    tracing::debug!("caller went away; skipping COM_STMT_PREPARE");
                    continue;
                }
                let result = conn.prepare(&sql).await;
                deliver(&mut tx, result)
            }
            Command::Reset {
                statement_id,
                mut tx,
            } => {
                if tx.is_abandoned() {
                    tracing::debug!(statement_id, "caller went away; skipping COM_STMT_RESET");
                    continue;
                }
                let result = conn.reset_statement_id(statement_id).await;
                deliver(&mut tx, result)
            }
            Command::Close { statement_id } => match conn.close_statement_id(statement_id).await {
                Ok(()) => false,
                Err(err) => {
                    tracing::debug!(%err, statement_id, "COM_STMT_CLOSE failed");
                    true
                }
            },
        };

        if broken {
            tracing::warn!("connection broken; stopping worker");
            break;
        }
    }

    // Queued commands are dropped with the receiver; their waiters see IncompleteResponse
    command_rx.close();
}

/// Resolve the bridge; returns true if the error left the connection unusable
fn deliver<T>(tx: &mut Completer<T>, result: Result<T>) -> bool {
    let broken = matches!(&result, Err(err) if err.is_connection_broken());
    tx.resolve(result);
    broken
}
