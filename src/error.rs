//! Crate-wide error type

/// Errors raised by routine, per-message operations.
///
/// Programmer errors (broken invariants) still panic via `assert!`/`unreachable!`
/// in debug builds, per §9 DESIGN NOTES ("exceptions vs result types"); this
/// type only carries the class of error that must be reported and survived.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("MPI error: {0}")]
    Mpi(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("shared memory error: {0}")]
    SharedMemory(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("spawn failed: {0}")]
    Spawn(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("module error: {0}")]
    Module(String),
}

pub type Result<T> = std::result::Result<T, Error>;
