//! The draw-side loop: draw a frame, release evicted resources, resolve its
//! pick, recycle it.

use std::sync::Arc;

use crate::cache::release::{ReleaseDrain, ReleaseReport};
use crate::core::error::Result;
use crate::frame::{Frame, FrameReceiver};
use crate::pick::{resolve_pick, PickSession, PixelSource};

/// What actually puts pixels on screen
///
/// Implemented over a wgpu context in the application; tests use an
/// in-memory image.
pub trait DrawSurface<D, O> {
    /// Pixels the pick pass leaves behind
    type Pixels: PixelSource;

    /// Draw every pass of `frame`
    fn draw(&mut self, frame: &Frame<D, O>) -> Result<()>;

    /// Draw pickable objects in their pick colors
    ///
    /// Each object is registered with `session` and drawn with the color
    /// the registration returns.
    fn draw_pick_pass(&mut self, frame: &Frame<D, O>, session: &mut PickSession<O>) -> Result<Self::Pixels>;
}

/// Result of one [`DrawLoop::draw_next`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawOutcome {
    /// No frame was waiting
    Idle,
    Drawn {
        frame: u64,
        released: ReleaseReport,
        /// Objects in the pick result, if a pick was attached and resolved
        picked: Option<usize>,
        /// The draw or the pick pass failed; the frame was recycled anyway
        failed: bool,
    },
}

/// Owns the draw side of the frame hand-off
pub struct DrawLoop<D, O, S> {
    receiver: FrameReceiver<D, O>,
    surface: S,
    release_queues: Vec<Arc<dyn ReleaseDrain>>,
    frames_drawn: u64,
}

impl<D, O, S> DrawLoop<D, O, S>
where
    S: DrawSurface<D, O>,
{
    pub fn new(receiver: FrameReceiver<D, O>, surface: S) -> Self {
        Self {
            receiver,
            surface,
            release_queues: Vec::new(),
            frames_drawn: 0,
        }
    }

    /// Drain `queue` once per drawn frame
    pub fn add_release_queue(&mut self, queue: Arc<dyn ReleaseDrain>) {
        self.release_queues.push(queue);
    }

    /// Draw the next submitted frame, if any, without waiting
    pub fn draw_next(&mut self) -> DrawOutcome {
        match self.receiver.try_drain_frame() {
            Some(frame) => self.draw_frame(frame),
            None => DrawOutcome::Idle,
        }
    }

    /// Wait for the next frame and draw it
    ///
    /// # Returns
    /// `None` once the evaluation side has gone away
    pub async fn draw_next_async(&mut self) -> Option<DrawOutcome> {
        let frame = self.receiver.drain_frame().await?;
        Some(self.draw_frame(frame))
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn draw_frame(&mut self, mut frame: Frame<D, O>) -> DrawOutcome {
        let number = frame.number();
        let mut failed = false;

        if let Err(e) = self.surface.draw(&frame) {
            log::warn!("Frame {} failed to draw: {}", number, e);
            failed = true;
        }

        let mut released = ReleaseReport::default();
        for queue in &self.release_queues {
            released.merge(queue.release_pending());
        }

        let mut picked = None;
        let request = frame.pick_request().copied();
        if let (Some(request), Some(mut session)) = (request, frame.take_pick_session()) {
            match self.surface.draw_pick_pass(&frame, &mut session) {
                Ok(pixels) => {
                    let result = resolve_pick(&request, session, &pixels);
                    log::debug!("Frame {} picked {} objects", number, result.len());
                    picked = Some(result.len());
                    frame.set_pick_result(result);
                }
                Err(e) => {
                    log::warn!("Frame {} pick pass failed: {}", number, e);
                    failed = true;
                }
            }
        }

        self.receiver.recycle(frame);
        self.frames_drawn += 1;
        DrawOutcome::Drawn { frame: number, released, picked, failed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::release::ReleaseQueue;
    use crate::core::config::FrameConfig;
    use crate::core::error::Error;
    use crate::frame::{frame_channel, DrawPass, FrameSender};
    use crate::pick::{PickRect, PickRequest};
    use image::{Rgba, RgbaImage};

    /// A square of `size` pixels at `(x, y)` owned by `owner`
    #[derive(Clone, Copy, Debug)]
    struct Quad {
        x: u32,
        y: u32,
        size: u32,
        owner: &'static str,
        terrain: bool,
    }

    #[derive(Default)]
    struct ImageSurface {
        draws: usize,
        fail_draw: bool,
        fail_pick: bool,
    }

    impl DrawSurface<Quad, &'static str> for ImageSurface {
        type Pixels = RgbaImage;

        fn draw(&mut self, _frame: &Frame<Quad, &'static str>) -> Result<()> {
            if self.fail_draw {
                return Err(Error::Gpu("surface lost".into()));
            }
            self.draws += 1;
            Ok(())
        }

        fn draw_pick_pass(
            &mut self,
            frame: &Frame<Quad, &'static str>,
            session: &mut PickSession<&'static str>,
        ) -> Result<RgbaImage> {
            if self.fail_pick {
                return Err(Error::Gpu("pick target lost".into()));
            }
            let mut image = RgbaImage::new(16, 16);
            for pass in DrawPass::ALL {
                for quad in frame.drawables(pass) {
                    let color = if quad.terrain {
                        session.register_terrain(quad.owner)?
                    } else {
                        session.register(quad.owner)?
                    };
                    for y in quad.y..quad.y + quad.size {
                        for x in quad.x..quad.x + quad.size {
                            image.put_pixel(x, y, Rgba([color.r, color.g, color.b, color.a]));
                        }
                    }
                }
            }
            Ok(image)
        }
    }

    fn setup(surface: ImageSurface) -> (FrameSender<Quad, &'static str>, DrawLoop<Quad, &'static str, ImageSurface>) {
        let (sender, receiver) = frame_channel(&FrameConfig::default());
        (sender, DrawLoop::new(receiver, surface))
    }

    fn quad(x: u32, y: u32, size: u32, owner: &'static str) -> Quad {
        Quad { x, y, size, owner, terrain: false }
    }

    #[test]
    fn test_idle_without_frame() {
        let (_sender, mut draw_loop) = setup(ImageSurface::default());
        assert_eq!(draw_loop.draw_next(), DrawOutcome::Idle);
        assert_eq!(draw_loop.frames_drawn(), 0);
    }

    #[test]
    fn test_draw_releases_queued_resources() {
        let (mut sender, mut draw_loop) = setup(ImageSurface::default());
        let queue = Arc::new(ReleaseQueue::new("imagery"));
        queue.enqueue(RgbaImage::new(2, 2));
        queue.enqueue(RgbaImage::new(2, 2));
        draw_loop.add_release_queue(queue.clone());

        let frame = sender.acquire_frame();
        assert!(sender.try_submit_frame(frame).is_ok());

        match draw_loop.draw_next() {
            DrawOutcome::Drawn { frame, released, picked, failed } => {
                assert_eq!(frame, 1);
                assert_eq!(released.released, 2);
                assert_eq!(picked, None);
                assert!(!failed);
            }
            DrawOutcome::Idle => panic!("expected a frame"),
        }
        assert!(queue.is_empty());
        assert_eq!(draw_loop.surface().draws, 1);
    }

    #[test]
    fn test_pick_resolved_through_loop() {
        let (mut sender, mut draw_loop) = setup(ImageSurface::default());

        let mut frame = sender.acquire_frame();
        frame.push(DrawPass::Opaque, Quad { x: 0, y: 0, size: 16, owner: "ground", terrain: true });
        frame.push(DrawPass::Opaque, quad(4, 4, 2, "pin"));
        frame.push(DrawPass::Overlay, quad(10, 10, 3, "label"));
        let pick = frame.attach_pick(PickRequest::point(5, 5));
        assert!(sender.try_submit_frame(frame).is_ok());

        assert!(matches!(draw_loop.draw_next(), DrawOutcome::Drawn { picked: Some(1), .. }));
        let result = pick.try_get().unwrap();
        assert_eq!(result.top_object().map(|o| o.owner), Some("pin"));
    }

    #[test]
    fn test_rect_pick_through_loop() {
        let (mut sender, mut draw_loop) = setup(ImageSurface::default());

        let mut frame = sender.acquire_frame();
        frame.push(DrawPass::Opaque, Quad { x: 0, y: 0, size: 16, owner: "ground", terrain: true });
        frame.push(DrawPass::Opaque, quad(4, 4, 2, "pin"));
        frame.push(DrawPass::Overlay, quad(10, 10, 3, "label"));
        let pick = frame.attach_pick(PickRequest::rect(PickRect::new(0, 0, 16, 16)));
        assert!(sender.try_submit_frame(frame).is_ok());
        draw_loop.draw_next();

        let result = pick.try_get().unwrap();
        let owners: Vec<_> = result.top_objects().map(|o| o.owner).collect();
        assert_eq!(owners, vec!["pin", "label"]);
        assert_eq!(result.terrain_object().map(|o| o.owner), Some("ground"));
    }

    #[test]
    fn test_failed_pick_pass_still_resolves() {
        let surface = ImageSurface { fail_pick: true, ..Default::default() };
        let (mut sender, mut draw_loop) = setup(surface);

        let mut frame = sender.acquire_frame();
        frame.push(DrawPass::Opaque, quad(0, 0, 4, "pin"));
        let pick = frame.attach_pick(PickRequest::point(1, 1));
        assert!(sender.try_submit_frame(frame).is_ok());

        assert!(matches!(draw_loop.draw_next(), DrawOutcome::Drawn { failed: true, picked: None, .. }));
        assert!(pick.try_get().is_some_and(|list| list.is_empty()));
    }

    #[test]
    fn test_failed_draw_recycles_frame() {
        let surface = ImageSurface { fail_draw: true, ..Default::default() };
        let (mut sender, mut draw_loop) = setup(surface);
        let pooled = sender.pooled();

        let frame = sender.acquire_frame();
        assert!(sender.try_submit_frame(frame).is_ok());
        assert!(matches!(draw_loop.draw_next(), DrawOutcome::Drawn { failed: true, .. }));
        assert_eq!(sender.pooled(), pooled);
    }

    #[tokio::test]
    async fn test_async_loop_ends_with_sender() {
        let (mut sender, mut draw_loop) = setup(ImageSurface::default());
        let frame = sender.acquire_frame();
        sender.submit_frame(frame).await.unwrap();
        drop(sender);

        assert!(draw_loop.draw_next_async().await.is_some());
        assert!(draw_loop.draw_next_async().await.is_none());
        assert_eq!(draw_loop.frames_drawn(), 1);
    }
}
