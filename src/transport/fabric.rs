//! In-process transport: each partition is a thread.
//!
//! Ranks share a `P x P` mailbox matrix guarded by one mutex. Mailbox
//! `(src, dst)` holds the typed buffer `src` addressed to `dst`. Every
//! collective follows the same four steps:
//!
//! 1. post: each rank fills its outgoing row
//! 2. barrier
//! 3. collect: each rank drains its incoming column
//! 4. barrier, so no rank can post the next round into a mailbox that has
//!    not been drained yet
//!
//! A rank that fails local validation still joins both barriers but posts
//! nothing. Its peers then fail with a missing-payload error instead of
//! blocking forever.

use std::any::Any;
use std::fmt as StdFmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use super::{Segments, Transport, check_segments};
use crate::error::{PermuteError, Result};

type Payload = Box<dyn Any + Send>;

/// Mailboxes plus barrier bookkeeping.
struct Round {
    /// Bumped each time the last rank reaches the barrier.
    generation: u64,

    /// Ranks waiting at the current barrier.
    arrived: usize,

    /// Row-major `partitions x partitions`, indexed `src * P + dst`.
    mailboxes: Vec<Option<Payload>>,
}

struct Shared {
    partitions: usize,
    round: Mutex<Round>,

    /// Signalled when a barrier generation completes.
    released: Condvar,
}

// ============================================================================
//  ThreadFabric
// ============================================================================

/// A process-local group of `P` ranks.
///
/// # Example
///
/// ```rust
/// use std::thread;
/// use qureg_permute::{ThreadFabric, Transport};
///
/// let endpoints = ThreadFabric::new(2).unwrap().endpoints();
///
/// let gathered: Vec<Vec<u32>> = thread::scope(|s| {
///     let handles: Vec<_> = endpoints
///         .into_iter()
///         .map(|ep| {
///             s.spawn(move || {
///                 let mut recv = vec![0u32; 2];
///                 ep.all_gather(&[ep.rank() as u32], &mut recv).unwrap();
///                 recv
///             })
///         })
///         .collect();
///     handles.into_iter().map(|h| h.join().unwrap()).collect()
/// });
///
/// assert_eq!(gathered, vec![vec![0, 1], vec![0, 1]]);
/// ```
#[derive(Clone)]
pub struct ThreadFabric {
    shared: Arc<Shared>,
}

impl ThreadFabric {
    /// Create a group of `partitions` ranks.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidTopology`] if `partitions` is zero.
    pub fn new(partitions: usize) -> Result<Self> {
        if partitions == 0 {
            return Err(PermuteError::topology("fabric needs at least one partition"));
        }

        let mut mailboxes: Vec<Option<Payload>> = Vec::with_capacity(partitions * partitions);
        mailboxes.resize_with(partitions * partitions, || None);

        Ok(Self {
            shared: Arc::new(Shared {
                partitions,
                round: Mutex::new(Round {
                    generation: 0,
                    arrived: 0,
                    mailboxes,
                }),
                released: Condvar::new(),
            }),
        })
    }

    /// Number of ranks in the group.
    #[must_use]
    pub fn partitions(&self) -> usize {
        self.shared.partitions
    }

    /// Endpoint for one rank.
    ///
    /// # Errors
    ///
    /// [`PermuteError::InvalidTopology`] if `rank >= partitions()`.
    pub fn endpoint(&self, rank: usize) -> Result<FabricEndpoint> {
        if rank >= self.shared.partitions {
            return Err(PermuteError::topology(format!(
                "rank {rank} >= fabric size {}",
                self.shared.partitions
            )));
        }

        Ok(FabricEndpoint {
            rank,
            shared: Arc::clone(&self.shared),
        })
    }

    /// One endpoint per rank, in rank order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<FabricEndpoint> {
        (0..self.shared.partitions)
            .map(|rank| FabricEndpoint {
                rank,
                shared: Arc::clone(&self.shared),
            })
            .collect()
    }
}

impl StdFmt::Debug for ThreadFabric {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("ThreadFabric")
            .field("partitions", &self.shared.partitions)
            .finish_non_exhaustive()
    }
}

// ============================================================================
//  FabricEndpoint
// ============================================================================

/// One rank's handle on a [`ThreadFabric`]. Move it into the rank's thread.
pub struct FabricEndpoint {
    rank: usize,
    shared: Arc<Shared>,
}

impl StdFmt::Debug for FabricEndpoint {
    fn fmt(&self, f: &mut StdFmt::Formatter<'_>) -> StdFmt::Result {
        f.debug_struct("FabricEndpoint")
            .field("rank", &self.rank)
            .field("partitions", &self.shared.partitions)
            .finish()
    }
}

impl FabricEndpoint {
    #[inline]
    fn slot(&self, src: usize, dst: usize) -> usize {
        src * self.shared.partitions + dst
    }

    /// Block until every rank has called `barrier` for this generation.
    fn barrier(&self) {
        let mut round = self.shared.round.lock();
        let generation: u64 = round.generation;

        round.arrived += 1;

        if round.arrived == self.shared.partitions {
            round.arrived = 0;
            round.generation = generation.wrapping_add(1);
            self.shared.released.notify_all();
            return;
        }

        while round.generation == generation {
            self.shared.released.wait(&mut round);
        }
    }

    /// Take the buffer `src` addressed to this rank.
    fn take<E: Send + 'static>(&self, src: usize) -> Result<Vec<E>> {
        let slot: usize = self.slot(src, self.rank);
        let payload: Option<Payload> = self.shared.round.lock().mailboxes[slot].take();

        let Some(payload) = payload else {
            return Err(PermuteError::transport(format!(
                "rank {} received nothing from rank {src}",
                self.rank
            )));
        };

        payload.downcast::<Vec<E>>().map(|boxed| *boxed).map_err(|_| {
            PermuteError::transport(format!(
                "rank {} received a mistyped payload from rank {src}",
                self.rank
            ))
        })
    }

    /// Drop anything still addressed to this rank.
    fn clear_inbox(&self) {
        let mut round = self.shared.round.lock();

        for src in 0..self.shared.partitions {
            let slot: usize = self.slot(src, self.rank);
            round.mailboxes[slot] = None;
        }
    }

    /// Run one post/barrier/collect/barrier round.
    ///
    /// `outgoing` holds one buffer per destination rank, or the local
    /// validation error. `accept` is called once per source rank in order.
    fn exchange<E, F>(&self, outgoing: Result<Vec<Vec<E>>>, mut accept: F) -> Result<()>
    where
        E: Send + 'static,
        F: FnMut(usize, Vec<E>) -> Result<()>,
    {
        let posted: Result<()> = outgoing.map(|buckets| {
            debug_assert_eq!(buckets.len(), self.shared.partitions);

            let mut round = self.shared.round.lock();
            for (dst, bucket) in buckets.into_iter().enumerate() {
                let slot: usize = self.slot(self.rank, dst);
                round.mailboxes[slot] = Some(Box::new(bucket));
            }
        });

        self.barrier();

        let received: Result<()> = posted.and_then(|()| {
            (0..self.shared.partitions).try_for_each(|src| {
                let payload: Vec<E> = self.take(src)?;
                accept(src, payload)
            })
        });

        self.clear_inbox();
        self.barrier();

        #[cfg(feature = "tracing")]
        {
            if let Err(ref err) = received {
                tracing::warn!(rank = self.rank, %err, "fabric: collective failed");
            }
        }

        received
    }
}

impl Transport for FabricEndpoint {
    #[inline]
    fn partitions(&self) -> usize {
        self.shared.partitions
    }

    #[inline]
    fn rank(&self) -> usize {
        self.rank
    }

    fn all_gather<E>(&self, send: &[E], recv: &mut [E]) -> Result<()>
    where
        E: Copy + Send + 'static,
    {
        let partitions: usize = self.shared.partitions;
        let chunk: usize = send.len();

        let outgoing: Result<Vec<Vec<E>>> = if recv.len() == chunk * partitions {
            Ok((0..partitions).map(|_| send.to_vec()).collect())
        } else {
            Err(PermuteError::transport(format!(
                "all_gather: recv holds {}, expected {}",
                recv.len(),
                chunk * partitions
            )))
        };

        self.exchange(outgoing, |src, data: Vec<E>| {
            if data.len() != chunk {
                return Err(PermuteError::transport(format!(
                    "all_gather: rank {src} sent {}, expected {chunk}",
                    data.len()
                )));
            }

            recv[src * chunk..(src + 1) * chunk].copy_from_slice(&data);
            Ok(())
        })
    }

    fn all_to_all_counts(&self, send_counts: &[usize]) -> Result<Vec<usize>> {
        let partitions: usize = self.shared.partitions;

        let outgoing: Result<Vec<Vec<usize>>> = if send_counts.len() == partitions {
            Ok(send_counts.iter().map(|&count| vec![count]).collect())
        } else {
            Err(PermuteError::transport(format!(
                "all_to_all_counts: {} counts for a group of {partitions}",
                send_counts.len()
            )))
        };

        let mut recv_counts: Vec<usize> = vec![0; partitions];

        self.exchange(outgoing, |src, data: Vec<usize>| match data.as_slice() {
            [count] => {
                recv_counts[src] = *count;
                Ok(())
            }
            _ => Err(PermuteError::transport(format!(
                "all_to_all_counts: rank {src} sent {} values",
                data.len()
            ))),
        })?;

        Ok(recv_counts)
    }

    fn all_to_allv<E>(
        &self,
        send: &[E],
        send_segments: &Segments,
        recv: &mut [E],
        recv_segments: &Segments,
    ) -> Result<()>
    where
        E: Copy + Send + 'static,
    {
        let partitions: usize = self.shared.partitions;

        let outgoing: Result<Vec<Vec<E>>> = check_segments("send", send_segments, send.len(), partitions)
            .and_then(|()| check_segments("recv", recv_segments, recv.len(), partitions))
            .map(|()| {
                (0..partitions)
                    .map(|dst| send[send_segments.range(dst)].to_vec())
                    .collect()
            });

        self.exchange(outgoing, |src, data: Vec<E>| {
            let range = recv_segments.range(src);

            if data.len() != range.len() {
                return Err(PermuteError::transport(format!(
                    "all_to_allv: rank {src} sent {}, expected {}",
                    data.len(),
                    range.len()
                )));
            }

            recv[range].copy_from_slice(&data);
            Ok(())
        })
    }
}
