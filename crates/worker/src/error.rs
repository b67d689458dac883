use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("API lock is held by another thread")]
    WouldBlock,
    #[error("worker thread is already running")]
    AlreadyRunning,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
