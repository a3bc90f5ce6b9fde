//! Background transaction worker
//!
//! A single dedicated thread consumes submitted transaction blocks from a
//! channel in FIFO order. Having exactly one consumer is what guarantees that
//! no two background transactions ever run concurrently.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::database::{run_transaction, TxOutcome};
use crate::{Result, StorageError};

type Job = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

pub(crate) struct TransactionWorker {
    sender: Mutex<Option<Sender<Job>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TransactionWorker {
    pub(crate) fn spawn(conn: Arc<Mutex<Connection>>) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<Job>();

        let handle = thread::Builder::new()
            .name("nimbus-storage-tx".to_string())
            .spawn(move || {
                for job in receiver {
                    let mut conn = conn.lock();
                    job(&mut conn);
                }
                tracing::debug!("Transaction worker stopped");
            })?;

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub(crate) fn submit<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Connection) -> Result<TxOutcome<()>> + Send + 'static,
    {
        let job: Job = Box::new(move |conn| match run_transaction(conn, f) {
            Ok(Some(())) => {}
            Ok(None) => tracing::debug!("Background transaction rolled back"),
            Err(e) => tracing::error!("Background transaction failed: {}", e),
        });

        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender.send(job).map_err(|_| StorageError::WorkerGone),
            None => Err(StorageError::WorkerGone),
        }
    }

    /// Stop accepting blocks, run the ones already queued, and join the thread.
    pub(crate) fn shutdown(&self) {
        // Dropping the sender closes the channel and ends the worker loop
        self.sender.lock().take();

        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                tracing::error!("Transaction worker panicked");
            }
        }
    }
}

impl Drop for TransactionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
