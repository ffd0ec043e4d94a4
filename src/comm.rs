//! Thin facade over inter-process message passing.
//!
//! Messages are contiguous byte slices. All handles are waitable but
//! non-blocking; schedule execution calls `.wait()` before it trusts that a
//! buffer is ready. Three backends: [`NoComm`] for pure serial runs,
//! [`RayonComm`] for rank-per-thread tests inside one process, and `MpiComm`
//! behind the `mpi-support` feature.
//!
//! Every collective entry point (schedule execution, `allgather_u64`) must be
//! called in the same relative order on every rank of a level; violating that
//! discipline deadlocks and cannot be detected here.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Non-blocking communication interface (minimal by design).
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// This process's rank.
    fn rank(&self) -> usize;
    /// Number of participating ranks.
    fn size(&self) -> usize;

    /// Post a non-blocking send of `buf` to `peer`.
    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a non-blocking receive of `len` bytes from `peer`.
    fn irecv(&self, peer: usize, tag: u16, len: usize) -> Self::RecvHandle;

    /// Collective: gather one `u64` from every rank, in rank order.
    fn allgather_u64(&self, value: u64, tag: u16) -> Vec<u64>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Compile-time no-op comm for pure serial runs and unit tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}

    fn irecv(&self, _peer: usize, _tag: u16, _len: usize) {}

    fn allgather_u64(&self, value: u64, _tag: u16) -> Vec<u64> {
        vec![value]
    }
}

// --- RayonComm: intra-process, rank-per-thread ---

type Key = (usize, usize, u16); // (src, dst, tag)

static MAILBOX: Lazy<DashMap<Key, Bytes>> = Lazy::new(DashMap::new);

/// Receive handle for [`RayonComm`]: a helper thread polling the mailbox.
pub struct LocalHandle {
    buf: Arc<Mutex<Option<Vec<u8>>>>,
    handle: Option<JoinHandle<()>>,
}

impl Wait for LocalHandle {
    fn wait(mut self) -> Option<Vec<u8>> {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        self.buf.lock().take()
    }
}

/// Mailbox-based communicator for running several ranks as threads of one
/// process. Tests that use it share the global mailbox and must not run
/// concurrently with each other.
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
}

impl RayonComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self { rank, size }
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        let key = (self.rank, peer, tag);
        // Keep per-key FIFO order: never clobber an unconsumed message.
        loop {
            if !MAILBOX.contains_key(&key) {
                match MAILBOX.entry(key) {
                    dashmap::mapref::entry::Entry::Vacant(e) => {
                        e.insert(Bytes::from(buf.to_vec()));
                        return;
                    }
                    dashmap::mapref::entry::Entry::Occupied(_) => {}
                }
            }
            std::thread::yield_now();
        }
    }

    fn irecv(&self, peer: usize, tag: u16, len: usize) -> LocalHandle {
        let key = (peer, self.rank, tag);
        let buf = Arc::new(Mutex::new(None));
        let buf_clone = buf.clone();
        let handle = std::thread::spawn(move || {
            loop {
                if let Some((_, bytes)) = MAILBOX.remove(&key) {
                    *buf_clone.lock() = Some(bytes[..len.min(bytes.len())].to_vec());
                    break;
                }
                std::thread::yield_now();
            }
        });
        LocalHandle {
            buf,
            handle: Some(handle),
        }
    }

    fn allgather_u64(&self, value: u64, tag: u16) -> Vec<u64> {
        let mut out = vec![0u64; self.size];
        out[self.rank] = value;
        let handles: Vec<(usize, LocalHandle)> = (0..self.size)
            .filter(|&peer| peer != self.rank)
            .map(|peer| (peer, self.irecv(peer, tag, 8)))
            .collect();
        for peer in 0..self.size {
            if peer != self.rank {
                self.isend(peer, tag, &value.to_le_bytes());
            }
        }
        for (peer, h) in handles {
            let data = h.wait().expect("allgather receive");
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data);
            out[peer] = u64::from_le_bytes(raw);
        }
        out
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{Communicator as _, CommunicatorCollectives, Destination, Source};

    /// MPI-backed communicator over the world communicator.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    impl MpiComm {
        /// Wrap an initialized MPI world communicator.
        pub fn new(world: SimpleCommunicator) -> Self {
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Self { world, rank, size }
        }
    }

    /// Deferred matched receive: the blocking receive happens at `wait`,
    /// after all sends of the exchange have been posted.
    pub struct MpiRecvHandle {
        world: SimpleCommunicator,
        peer: usize,
        tag: u16,
        len: usize,
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            let (data, _status) = self
                .world
                .process_at_rank(self.peer as i32)
                .receive_vec_with_tag::<u8>(self.tag as i32);
            (data.len() >= self.len).then_some(data)
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecvHandle;

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        fn irecv(&self, peer: usize, tag: u16, len: usize) -> MpiRecvHandle {
            MpiRecvHandle {
                world: self.world.duplicate(),
                peer,
                tag,
                len,
            }
        }

        fn allgather_u64(&self, value: u64, _tag: u16) -> Vec<u64> {
            let mut out = vec![0u64; self.size];
            self.world.all_gather_into(&value, &mut out[..]);
            out
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;
