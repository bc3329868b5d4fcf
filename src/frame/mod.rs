//! Frame construction, pooling and hand-off to the draw side

pub mod deferred;
pub mod frame;
pub mod handoff;
pub mod pool;

pub use deferred::{deferred, Deferred, DeferredResolver};
pub use frame::{DrawPass, DrawnListener, Frame, FrameState, Viewport};
pub use handoff::{frame_channel, FrameReceiver, FrameSender};
pub use pool::{ObjectPool, Recycle};
