//! Frame hand-off between the evaluation side and the draw side
//!
//! A bounded tokio channel carries submitted frames; both ends share the
//! frame pool so the draw side can recycle what the evaluation side will
//! acquire next. With a depth of 1 at most one frame waits while another
//! is drawn.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use super::frame::{Frame, FrameState};
use super::pool::{ObjectPool, Recycle};
use crate::core::config::FrameConfig;
use crate::core::error::{Error, Result};

type SharedPool<D, O> = Arc<Mutex<ObjectPool<Frame<D, O>>>>;

fn lock<D, O>(pool: &SharedPool<D, O>) -> MutexGuard<'_, ObjectPool<Frame<D, O>>> {
    pool.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Recycle a frame, then put it back on the free list
///
/// Recycling runs drawn listeners and resolves pick waiters, which may call
/// back into the sender or the pool, so it happens before the lock is taken.
fn return_to_pool<D, O>(pool: &SharedPool<D, O>, mut frame: Frame<D, O>) {
    frame.recycle();
    lock(pool).put_back(frame);
}

/// Create a connected sender/receiver pair
pub fn frame_channel<D, O>(config: &FrameConfig) -> (FrameSender<D, O>, FrameReceiver<D, O>)
where
    D: Send + 'static,
    O: Send + 'static,
{
    let mut pool = ObjectPool::new(Frame::new);
    pool.prewarm(config.prewarm);
    let pool = Arc::new(Mutex::new(pool));

    let (tx, rx) = mpsc::channel(config.channel_depth.max(1));
    log::info!(
        "Frame channel ready: depth {}, {} frames prewarmed",
        config.channel_depth.max(1),
        config.prewarm
    );

    let sender = FrameSender {
        tx,
        pool: Arc::clone(&pool),
        next_number: 1,
    };
    let receiver = FrameReceiver { rx, pool };
    (sender, receiver)
}

/// Evaluation side of the hand-off
pub struct FrameSender<D, O> {
    tx: mpsc::Sender<Frame<D, O>>,
    pool: SharedPool<D, O>,
    next_number: u64,
}

impl<D, O> FrameSender<D, O> {
    /// Take a cleared frame from the pool and start building it
    pub fn acquire_frame(&mut self) -> Frame<D, O> {
        let mut frame = lock(&self.pool).acquire();
        frame.set_number(self.next_number);
        self.next_number += 1;
        frame.transition(FrameState::Building);
        frame
    }

    /// Queue a frame for the draw side, waiting while the channel is full
    ///
    /// If the draw side is gone the frame is recycled, which resolves any
    /// pick waiter with an empty result.
    pub async fn submit_frame(&self, mut frame: Frame<D, O>) -> Result<()> {
        frame.transition(FrameState::Submitted);
        match self.tx.send(frame).await {
            Ok(()) => Ok(()),
            Err(mpsc::error::SendError(frame)) => {
                log::warn!("Draw side closed, dropping frame {}", frame.number());
                return_to_pool(&self.pool, frame);
                Err(Error::HandoffClosed)
            }
        }
    }

    /// Queue a frame without waiting
    ///
    /// # Returns
    /// The frame, back in the building state, if the channel is full or
    /// closed
    pub fn try_submit_frame(&self, mut frame: Frame<D, O>) -> std::result::Result<(), Frame<D, O>> {
        frame.transition(FrameState::Submitted);
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(mut frame))
            | Err(mpsc::error::TrySendError::Closed(mut frame)) => {
                frame.transition(FrameState::Building);
                Err(frame)
            }
        }
    }

    /// Return a frame without drawing it
    pub fn discard(&self, frame: Frame<D, O>) {
        return_to_pool(&self.pool, frame);
    }

    /// True once the receiver is gone
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Frames waiting in the pool
    pub fn pooled(&self) -> usize {
        lock(&self.pool).available()
    }
}

/// Draw side of the hand-off
pub struct FrameReceiver<D, O> {
    rx: mpsc::Receiver<Frame<D, O>>,
    pool: SharedPool<D, O>,
}

impl<D, O> FrameReceiver<D, O> {
    /// Wait for the next submitted frame; `None` once every sender is gone
    pub async fn drain_frame(&mut self) -> Option<Frame<D, O>> {
        let mut frame = self.rx.recv().await?;
        frame.transition(FrameState::Draining);
        Some(frame)
    }

    /// Take the next submitted frame if one is waiting
    pub fn try_drain_frame(&mut self) -> Option<Frame<D, O>> {
        let mut frame = self.rx.try_recv().ok()?;
        frame.transition(FrameState::Draining);
        Some(frame)
    }

    /// Finish a drawn frame: fire listeners, resolve its pick, return it to
    /// the pool
    pub fn recycle(&self, frame: Frame<D, O>) {
        log::trace!("Recycling frame {}", frame.number());
        return_to_pool(&self.pool, frame);
    }

    /// Frames created by the shared pool so far
    pub fn frames_created(&self) -> usize {
        lock(&self.pool).created()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::frame::DrawPass;
    use crate::pick::PickRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(depth: usize) -> FrameConfig {
        FrameConfig { channel_depth: depth, prewarm: 2 }
    }

    #[test]
    fn test_acquire_numbers_frames() {
        let (mut sender, _receiver) = frame_channel::<u32, u32>(&config(1));
        let a = sender.acquire_frame();
        let b = sender.acquire_frame();
        assert_eq!((a.number(), b.number()), (1, 2));
        assert_eq!(a.state(), FrameState::Building);
        assert_eq!(sender.pooled(), 0);
    }

    #[test]
    fn test_double_buffering() {
        let (mut sender, mut receiver) = frame_channel::<u32, u32>(&config(1));

        let first = sender.acquire_frame();
        assert!(sender.try_submit_frame(first).is_ok());

        // Channel holds one frame; the second comes back
        let second = sender.acquire_frame();
        let second = sender.try_submit_frame(second).unwrap_err();
        assert_eq!(second.state(), FrameState::Building);

        let drawing = receiver.try_drain_frame().unwrap();
        assert_eq!(drawing.number(), 1);
        assert_eq!(drawing.state(), FrameState::Draining);
        assert!(sender.try_submit_frame(second).is_ok());

        receiver.recycle(drawing);
        assert_eq!(receiver.try_drain_frame().map(|f| f.number()), Some(2));
        assert!(receiver.try_drain_frame().is_none());
    }

    #[test]
    fn test_recycled_frame_is_clean() {
        let (mut sender, mut receiver) = frame_channel::<u32, u32>(&config(1));
        let drawn = Arc::new(AtomicUsize::new(0));

        let mut frame = sender.acquire_frame();
        frame.push(DrawPass::Opaque, 7);
        let pick = frame.attach_pick(PickRequest::point(0, 0));
        let counter = Arc::clone(&drawn);
        frame.add_drawn_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(sender.try_submit_frame(frame).is_ok());

        let frame = receiver.try_drain_frame().unwrap();
        receiver.recycle(frame);
        assert_eq!(drawn.load(Ordering::SeqCst), 1);
        assert!(pick.try_get().is_some_and(|list| list.is_empty()));

        // Both prewarmed frames are back; no new frames were built
        let created = receiver.frames_created();
        let mut again = sender.acquire_frame();
        assert_eq!(receiver.frames_created(), created);
        assert_eq!(again.drawable_count(), 0);
        assert_eq!(again.drawn_listener_count(), 0);
        assert!(again.pick_request().is_none());
        assert!(again.pick_session().is_none());
    }

    #[test]
    fn test_listener_can_use_pool_during_recycle() {
        let (mut sender, mut receiver) = frame_channel::<u32, u32>(&config(1));
        let pool = Arc::clone(&receiver.pool);
        let (seen_tx, seen_rx) = std::sync::mpsc::channel();

        let mut frame = sender.acquire_frame();
        frame.add_drawn_listener(move |_| {
            let _ = seen_tx.send(lock(&pool).available());
        });
        assert!(sender.try_submit_frame(frame).is_ok());
        let frame = receiver.try_drain_frame().unwrap();

        let recycler = std::thread::spawn(move || {
            receiver.recycle(frame);
            receiver
        });

        // One prewarmed frame is free while the drawn one is still recycling
        let available = seen_rx.recv_timeout(std::time::Duration::from_secs(5));
        assert_eq!(available, Ok(1));
        let receiver = recycler.join().unwrap();
        assert_eq!(lock(&receiver.pool).available(), 2);
        assert_eq!(sender.pooled(), 2);
    }

    #[tokio::test]
    async fn test_submit_waits_for_draw_side() {
        let (mut sender, mut receiver) = frame_channel::<u32, u32>(&config(1));
        let first = sender.acquire_frame();
        sender.submit_frame(first).await.unwrap();

        let second = sender.acquire_frame();
        let submit = tokio::spawn(async move {
            sender.submit_frame(second).await.unwrap();
            sender
        });

        tokio::task::yield_now().await;
        let frame = receiver.drain_frame().await.unwrap();
        assert_eq!(frame.number(), 1);
        receiver.recycle(frame);

        let _sender = submit.await.unwrap();
        let frame = receiver.drain_frame().await.unwrap();
        assert_eq!(frame.number(), 2);
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (mut sender, receiver) = frame_channel::<u32, u32>(&config(1));
        drop(receiver);
        assert!(sender.is_closed());

        let mut frame = sender.acquire_frame();
        let pick = frame.attach_pick(PickRequest::point(0, 0));
        let result = sender.submit_frame(frame).await;
        assert!(matches!(result, Err(Error::HandoffClosed)));
        assert_eq!(pick.wait().await.map(|list| list.len()), Some(0));
    }

    #[tokio::test]
    async fn test_drain_ends_when_sender_dropped() {
        let (sender, mut receiver) = frame_channel::<u32, u32>(&config(1));
        drop(sender);
        assert!(receiver.drain_frame().await.is_none());
    }

    #[test]
    fn test_discard_returns_to_pool() {
        let (mut sender, _receiver) = frame_channel::<u32, u32>(&config(1));
        let frame = sender.acquire_frame();
        assert_eq!(sender.pooled(), 1);
        sender.discard(frame);
        assert_eq!(sender.pooled(), 2);
    }
}
