//! In-memory pipe with a bounded FIFO queue.
//!
//! A single buffer shared by many waiters: writers suspend while the queue
//! holds `high_water_mark` chunks, readers suspend while it is empty and the
//! pipe is open. Waiters on either side are served in arrival order.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::StreamError;
use crate::traits::ByteStream;

/// Default queue depth at which writers suspend.
pub const DEFAULT_HIGH_WATER_MARK: usize = 16;

/// Options for [`create_pipe_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeOptions {
    /// Queue depth at which writers suspend. Zero makes every write a
    /// rendezvous with a reader.
    pub high_water_mark: usize,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

/// Point-in-time view of a pipe's queue and waiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeStats {
    pub buffered: usize,
    pub waiting_readers: usize,
    pub waiting_writers: usize,
    pub high_water_mark: usize,
    pub closed: bool,
}

struct PendingWrite<T> {
    chunk: T,
    done: oneshot::Sender<Result<(), StreamError>>,
}

struct PipeState<T> {
    queue: VecDeque<T>,
    /// Suspended readers. Dropping a sender signals end-of-stream.
    readers: VecDeque<oneshot::Sender<T>>,
    writers: VecDeque<PendingWrite<T>>,
    closed: bool,
}

impl<T> PipeState<T> {
    /// Next chunk from a suspended writer whose caller is still waiting.
    fn take_writer(&mut self) -> Option<T> {
        while let Some(pending) = self.writers.pop_front() {
            if pending.done.is_closed() {
                // Caller gave up on this write; it never happened.
                continue;
            }
            let _ = pending.done.send(Ok(()));
            return Some(pending.chunk);
        }
        None
    }

    /// Hand `chunk` to the oldest live reader, or give it back.
    fn offer_reader(&mut self, mut chunk: T) -> Result<(), T> {
        while let Some(reader) = self.readers.pop_front() {
            match reader.send(chunk) {
                Ok(()) => return Ok(()),
                Err(returned) => chunk = returned,
            }
        }
        Err(chunk)
    }
}

struct PipeShared<T> {
    high_water_mark: usize,
    state: Mutex<PipeState<T>>,
}

/// A reader parked on an empty queue.
///
/// A writer may hand a chunk over just as the read future is dropped. The
/// drop puts such a chunk back: to the next parked reader, else to the front
/// of the queue.
struct ParkedRead<T> {
    rx: oneshot::Receiver<T>,
    shared: Arc<PipeShared<T>>,
}

impl<T> Drop for ParkedRead<T> {
    fn drop(&mut self) {
        self.rx.close();
        if let Ok(chunk) = self.rx.try_recv() {
            let mut state = self.shared.state.lock();
            if let Err(chunk) = state.offer_reader(chunk) {
                state.queue.push_front(chunk);
            }
            trace!("Chunk returned from a cancelled read");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipeSide {
    Reader,
    Writer,
}

/// One end of a pipe created by [`create_pipe`].
///
/// Both ends operate on the same queue; the labels only tell them apart in
/// logs. Closing either end closes the pipe: pending readers see
/// end-of-stream once the queue drains, pending and later writes fail.
pub struct PipeEnd<T = Bytes> {
    shared: Arc<PipeShared<T>>,
    side: PipeSide,
}

impl<T> Clone for PipeEnd<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
            side: self.side,
        }
    }
}

/// Connected `(reader, writer)` pair.
pub fn create_pipe<T: Send + 'static>(high_water_mark: usize) -> (PipeEnd<T>, PipeEnd<T>) {
    create_pipe_with(PipeOptions { high_water_mark })
}

pub fn create_pipe_with<T: Send + 'static>(options: PipeOptions) -> (PipeEnd<T>, PipeEnd<T>) {
    let shared = Arc::new(PipeShared {
        high_water_mark: options.high_water_mark,
        state: Mutex::new(PipeState {
            queue: VecDeque::new(),
            readers: VecDeque::new(),
            writers: VecDeque::new(),
            closed: false,
        }),
    });
    (
        PipeEnd {
            shared: shared.clone(),
            side: PipeSide::Reader,
        },
        PipeEnd {
            shared,
            side: PipeSide::Writer,
        },
    )
}

impl<T> PipeEnd<T> {
    pub fn stats(&self) -> PipeStats {
        let state = self.shared.state.lock();
        PipeStats {
            buffered: state.queue.len(),
            waiting_readers: state.readers.iter().filter(|r| !r.is_closed()).count(),
            waiting_writers: state.writers.iter().filter(|w| !w.done.is_closed()).count(),
            high_water_mark: self.shared.high_water_mark,
            closed: state.closed,
        }
    }

    pub fn high_water_mark(&self) -> usize {
        self.shared.high_water_mark
    }

    pub fn is_reader(&self) -> bool {
        self.side == PipeSide::Reader
    }
}

#[async_trait]
impl<T: Send + 'static> ByteStream<T> for PipeEnd<T> {
    async fn read(&self) -> Result<Option<T>, StreamError> {
        let mut waiter = {
            let mut state = self.shared.state.lock();

            if let Some(chunk) = state.queue.pop_front() {
                // Space freed: admit the oldest suspended writer.
                if let Some(next) = state.take_writer() {
                    state.queue.push_back(next);
                }
                return Ok(Some(chunk));
            }
            if let Some(chunk) = state.take_writer() {
                return Ok(Some(chunk));
            }
            if state.closed {
                return Ok(None);
            }

            let (tx, rx) = oneshot::channel();
            state.readers.push_back(tx);
            ParkedRead {
                rx,
                shared: self.shared.clone(),
            }
        };

        // A dropped sender means the pipe closed with nothing left to read.
        Ok((&mut waiter.rx).await.ok())
    }

    async fn write(&self, chunk: T) -> Result<(), StreamError> {
        let waiter = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(StreamError::Closed);
            }

            let chunk = match state.offer_reader(chunk) {
                Ok(()) => return Ok(()),
                Err(chunk) => chunk,
            };

            if state.queue.len() < self.shared.high_water_mark {
                state.queue.push_back(chunk);
                return Ok(());
            }

            let (done, rx) = oneshot::channel();
            state.writers.push_back(PendingWrite { chunk, done });
            trace!(side = ?self.side, "Pipe at high-water mark, writer suspended");
            rx
        };

        waiter.await.unwrap_or(Err(StreamError::Closed))
    }

    fn close(&self) {
        let mut state = self.shared.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        state.readers.clear();
        for pending in state.writers.drain(..) {
            let _ = pending.done.send(Err(StreamError::Closed));
        }
        trace!(side = ?self.side, buffered = state.queue.len(), "Pipe closed");
    }

    fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }
}
