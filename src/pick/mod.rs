//! Color-coded picking
//!
//! Each pickable object is drawn in a flat color encoding a per-session id.
//! After the pick pass the pixels under the cursor (or a selection
//! rectangle) are read back and mapped to the registered objects.

pub mod color;
pub mod picked;
pub mod pixels;
pub mod resolve;
pub mod session;

pub use color::{decode_pick_id, encode_pick_id, Rgba8, MAX_PICK_ID, NO_PICK_ID};
pub use picked::{PickedObject, PickedObjectList};
pub use pixels::{PickRect, PixelSource, ReadbackPixels};
pub use resolve::{resolve_pick, PickRequest};
pub use session::PickSession;
