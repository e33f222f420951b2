//! The MPI transport underneath a cluster manager (§4.4, §5).
//!
//! Two logical channels ride the same communicator: `ToAny`, a
//! length-prefixed broadcast every rank posts a non-blocking receive
//! for, and `ToRank0`, a point-to-point upload channel only rank 0
//! polls (§6). Both are polled, never blocked on, from the dispatch
//! loop.

use crate::error::{Error, Result};

/// Wraps the MPI universe and communicator for one process.
pub struct MpiUniverse {
    universe: mpi::environment::Universe,
    rank: i32,
    size: i32,
}

impl MpiUniverse {
    pub fn initialize() -> Result<Self> {
        let universe = mpi::initialize()
            .ok_or_else(|| Error::Mpi("MPI_Init failed or was already called".to_string()))?;
        let world = universe.world();
        let rank = world.rank();
        let size = world.size();
        Ok(Self { universe, rank, size })
    }

    pub fn rank(&self) -> i32 {
        self.rank
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn world(&self) -> mpi::topology::SystemCommunicator {
        self.universe.world()
    }

    pub fn is_rank0(&self) -> bool {
        self.rank == 0
    }
}

/// Broadcasts a pre-serialized control message to every rank (§4.4
/// step 3: "after the length prefix is received, the payload is
/// delivered with `MPI_Bcast`").
pub fn broadcast_bytes(world: &mpi::topology::SystemCommunicator, root: i32, data: &mut Vec<u8>) {
    use mpi::traits::*;
    let mut len = data.len() as u32;
    world.process_at_rank(root).broadcast_into(&mut len);
    if world.rank() != root {
        data.resize(len as usize, 0);
    }
    world.process_at_rank(root).broadcast_into(&mut data[..]);
}

#[cfg(test)]
mod tests {
    // MPI requires a running universe; these primitives are exercised
    // through the cluster-manager integration tests, which start one.
}
