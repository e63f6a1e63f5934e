use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use ecomap_core::errors::{DatabaseError, Error, Result};
use log::error;
use std::any::Any;
use tokio::sync::{mpsc, oneshot};

// A write job runs against the actor's connection and reports a core Result.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;

type ErasedJob = Job<Box<dyn Any + Send + 'static>>;
type Reply = oneshot::Sender<Result<Box<dyn Any + Send + 'static>>>;

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<(ErasedJob, Reply)>,
}

fn actor_gone(detail: &str) -> Error {
    Error::Database(DatabaseError::Internal(format!("Writer actor unavailable: {}", detail)))
}

impl WriteHandle {
    /// Executes a job on the writer actor's dedicated connection, inside one
    /// immediate transaction.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as Box<dyn Any + Send>)),
                ret_tx,
            ))
            .await
            .map_err(|_| actor_gone("job channel closed"))?;

        let boxed = ret_rx
            .await
            .map_err(|_| actor_gone("reply dropped"))??;
        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| actor_gone("unexpected result type"))
    }
}

/// Spawns a background Tokio task that is the single writer to the database.
/// The actor holds one pooled connection for its lifetime and runs jobs
/// serially.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::channel::<(ErasedJob, Reply)>(1024);

    tokio::spawn(async move {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                let message = e.to_string();
                error!("Writer actor could not acquire a connection: {}", message);
                while let Some((_, reply_tx)) = rx.recv().await {
                    let _ = reply_tx.send(Err(Error::Database(DatabaseError::ConnectionFailed(
                        message.clone(),
                    ))));
                }
                return;
            }
        };

        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<Box<dyn Any + Send + 'static>> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| e.into());

            // The requester may have gone away.
            let _ = reply_tx.send(result);
        }
    });

    WriteHandle { tx }
}
