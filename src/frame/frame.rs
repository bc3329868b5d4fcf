//! Frames handed from the evaluation side to the draw side
//!
//! A frame carries everything the draw side needs for one image: transforms,
//! viewport, per-pass drawables, an optional pick request and the listeners
//! to notify once the frame has been drawn. Frames are pooled; recycling
//! fires the listeners, resolves any pick waiter and clears the contents.

use glam::Mat4;

use super::deferred::{deferred, Deferred, DeferredResolver};
use super::pool::Recycle;
use crate::pick::{PickRequest, PickSession, PickedObjectList};

/// Lifecycle of a pooled frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameState {
    /// On the free list
    Pooled,
    /// Held by the evaluation side, being filled
    Building,
    /// Queued for the draw side
    Submitted,
    /// Held by the draw side
    Draining,
    /// Contents cleared, about to return to the pool
    Recycled,
}

impl FrameState {
    fn can_become(self, next: FrameState) -> bool {
        use FrameState::*;
        matches!(
            (self, next),
            (Pooled, Building)
                | (Building, Submitted)
                | (Submitted, Building)
                | (Submitted, Draining)
                | (Building, Recycled)
                | (Submitted, Recycled)
                | (Draining, Recycled)
                | (Recycled, Pooled)
        )
    }
}

/// Render target region in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Draw order buckets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawPass {
    Opaque,
    Translucent,
    Overlay,
}

impl DrawPass {
    pub const ALL: [DrawPass; 3] = [DrawPass::Opaque, DrawPass::Translucent, DrawPass::Overlay];

    fn index(self) -> usize {
        match self {
            DrawPass::Opaque => 0,
            DrawPass::Translucent => 1,
            DrawPass::Overlay => 2,
        }
    }
}

/// Called with the frame number once the frame was drawn
pub type DrawnListener = Box<dyn FnOnce(u64) + Send>;

struct PendingPick<O> {
    request: PickRequest,
    session: Option<PickSession<O>>,
    result: Option<PickedObjectList<O>>,
    resolver: DeferredResolver<PickedObjectList<O>>,
}

/// One frame's worth of draw state
pub struct Frame<D, O> {
    number: u64,
    state: FrameState,
    pub viewport: Viewport,
    pub projection: Mat4,
    pub modelview: Mat4,
    passes: [Vec<D>; 3],
    pick: Option<PendingPick<O>>,
    drawn_listeners: Vec<DrawnListener>,
}

impl<D, O> Default for Frame<D, O> {
    fn default() -> Self {
        Self {
            number: 0,
            state: FrameState::Pooled,
            viewport: Viewport::default(),
            projection: Mat4::IDENTITY,
            modelview: Mat4::IDENTITY,
            passes: [Vec::new(), Vec::new(), Vec::new()],
            pick: None,
            drawn_listeners: Vec::new(),
        }
    }
}

impl<D, O> Frame<D, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number assigned when the frame was acquired
    pub fn number(&self) -> u64 {
        self.number
    }

    pub(crate) fn set_number(&mut self, number: u64) {
        self.number = number;
    }

    pub fn state(&self) -> FrameState {
        self.state
    }

    pub(crate) fn transition(&mut self, next: FrameState) {
        debug_assert!(
            self.state.can_become(next),
            "frame {} cannot go from {:?} to {:?}",
            self.number,
            self.state,
            next
        );
        self.state = next;
    }

    /// Set both transforms
    pub fn set_view(&mut self, projection: Mat4, modelview: Mat4) {
        self.projection = projection;
        self.modelview = modelview;
    }

    /// Combined projection * modelview
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.modelview
    }

    /// Queue a drawable in `pass`
    pub fn push(&mut self, pass: DrawPass, drawable: D) {
        self.passes[pass.index()].push(drawable);
    }

    pub fn drawables(&self, pass: DrawPass) -> &[D] {
        &self.passes[pass.index()]
    }

    /// Total drawables over every pass
    pub fn drawable_count(&self) -> usize {
        self.passes.iter().map(Vec::len).sum()
    }

    /// Run `listener` once this frame has been drawn and recycled
    pub fn add_drawn_listener(&mut self, listener: impl FnOnce(u64) + Send + 'static) {
        self.drawn_listeners.push(Box::new(listener));
    }

    pub fn drawn_listener_count(&self) -> usize {
        self.drawn_listeners.len()
    }

    pub fn pick_request(&self) -> Option<&PickRequest> {
        self.pick.as_ref().map(|p| &p.request)
    }

    /// Session the pick pass registers objects with
    pub fn pick_session(&mut self) -> Option<&mut PickSession<O>> {
        self.pick.as_mut().and_then(|p| p.session.as_mut())
    }

    /// Hand the session over for resolution
    pub fn take_pick_session(&mut self) -> Option<PickSession<O>> {
        self.pick.as_mut().and_then(|p| p.session.take())
    }

    /// Store the resolved pick; delivered to waiters at recycle
    pub fn set_pick_result(&mut self, result: PickedObjectList<O>) {
        if let Some(pick) = self.pick.as_mut() {
            pick.result = Some(result);
        } else {
            log::warn!("Frame {} got a pick result without a pick request", self.number);
        }
    }

    /// Fire listeners and resolve the pick waiter
    fn finish(&mut self) {
        let number = self.number;
        for listener in self.drawn_listeners.drain(..) {
            listener(number);
        }
        if let Some(pick) = self.pick.take() {
            pick.resolver.resolve(pick.result.unwrap_or_default());
        }
    }
}

impl<D, O: Clone> Frame<D, O> {
    /// Request a pick in this frame
    ///
    /// The returned value resolves when the frame is recycled: with the
    /// picked objects if the draw side ran the pick pass, otherwise empty.
    pub fn attach_pick(&mut self, request: PickRequest) -> Deferred<PickedObjectList<O>> {
        debug_assert!(self.pick.is_none(), "frame {} already has a pick session", self.number);
        let (resolver, value) = deferred();
        self.pick = Some(PendingPick {
            request,
            session: Some(PickSession::new()),
            result: None,
            resolver,
        });
        value
    }
}

impl<D, O> Recycle for Frame<D, O> {
    fn recycle(&mut self) {
        if self.state != FrameState::Recycled {
            self.transition(FrameState::Recycled);
        }
        self.finish();
        for pass in &mut self.passes {
            pass.clear();
        }
        self.viewport = Viewport::default();
        self.projection = Mat4::IDENTITY;
        self.modelview = Mat4::IDENTITY;
        self.transition(FrameState::Pooled);
    }
}

impl<D, O> std::fmt::Debug for Frame<D, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("number", &self.number)
            .field("state", &self.state)
            .field("viewport", &self.viewport)
            .field("drawables", &self.drawable_count())
            .field("pick", &self.pick.as_ref().map(|p| p.request))
            .field("drawn_listeners", &self.drawn_listeners.len())
            .finish()
    }
}
