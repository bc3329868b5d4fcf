//! Turning pick-pass pixels into picked objects

use super::color::{decode_pick_id, NO_PICK_ID};
use super::picked::PickedObjectList;
use super::pixels::{PickRect, PixelSource};
use super::session::PickSession;

/// Where to pick, in render-target pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PickRequest {
    pub point: Option<[u32; 2]>,
    pub rect: Option<PickRect>,
}

impl PickRequest {
    /// Pick whatever is under one pixel
    pub fn point(x: u32, y: u32) -> Self {
        Self { point: Some([x, y]), rect: None }
    }

    /// Pick everything visible inside a rectangle
    pub fn rect(rect: PickRect) -> Self {
        Self { point: None, rect: Some(rect) }
    }

    /// Prefer the object under `point`, fall back to anything inside `rect`
    pub fn point_in_rect(x: u32, y: u32, rect: PickRect) -> Self {
        Self { point: Some([x, y]), rect: Some(rect) }
    }

    /// Tiny rectangles without a point become a point pick at their center
    pub fn normalized(self) -> Self {
        match (self.point, self.rect) {
            (None, Some(rect)) if rect.is_degenerate() => {
                let [x, y] = rect.center();
                Self::point(x, y)
            }
            _ => self,
        }
    }
}

/// Resolve a pick against the pixels of the session's pick pass
///
/// A point hit on a non-terrain object wins outright. Otherwise every
/// non-terrain object visible in the rectangle is reported on top. The
/// terrain entry is kept alongside either way, so callers get the ground
/// position under the cursor.
pub fn resolve_pick<O, P>(request: &PickRequest, session: PickSession<O>, pixels: &P) -> PickedObjectList<O>
where
    P: PixelSource + ?Sized,
{
    let request = request.normalized();
    let mut objects = session.into_objects();

    let mut found_top = false;
    if let Some([x, y]) = request.point {
        let id = pixels.read_pixel(x, y).map(decode_pick_id).unwrap_or(NO_PICK_ID);
        if id == NO_PICK_ID && request.rect.is_none() {
            log::trace!("Pick at ({}, {}) hit nothing", x, y);
            objects.clear();
            return objects;
        }

        let mut terrain_hit = false;
        if let Some(object) = objects.get_mut(id) {
            object.on_top = true;
            terrain_hit = object.terrain;
            found_top = !object.terrain;
        }
        if terrain_hit {
            objects.set_terrain(id);
        }

        if found_top || request.rect.is_none() {
            objects.retain_top_and_terrain();
            return objects;
        }
    }

    if let Some(rect) = request.rect {
        for pixel in pixels.read_rect(rect) {
            let id = decode_pick_id(pixel);
            if id == NO_PICK_ID {
                continue;
            }
            let has_terrain = objects.has_terrain();
            let Some(object) = objects.get_mut(id) else {
                continue;
            };
            if !object.terrain {
                object.on_top = true;
            } else if !has_terrain {
                objects.set_terrain(id);
            }
        }
        objects.retain_top_and_terrain();
    }

    objects
}
