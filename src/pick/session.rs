//! Pick sessions: id allocation for one pick request

use super::color::{encode_pick_id, Rgba8, MAX_PICK_ID};
use super::picked::{PickedObject, PickedObjectList};
use crate::core::error::{Error, Result};

/// Registers pickable objects for one pick pass
///
/// Ids start at 1 and increase by one per registration; 0 stays reserved
/// for "nothing".
#[derive(Debug)]
pub struct PickSession<O> {
    next_id: u32,
    objects: PickedObjectList<O>,
}

impl<O> Default for PickSession<O> {
    fn default() -> Self {
        Self {
            next_id: 1,
            objects: PickedObjectList::new(),
        }
    }
}

impl<O> PickSession<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an ordinary object
    ///
    /// # Returns
    /// The flat color to draw the object with in the pick pass
    pub fn register(&mut self, owner: O) -> Result<Rgba8> {
        self.add(owner, false)
    }

    /// Register a terrain tile
    pub fn register_terrain(&mut self, owner: O) -> Result<Rgba8> {
        self.add(owner, true)
    }

    /// The id the next registration receives
    pub fn next_id(&self) -> u32 {
        self.next_id
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> &PickedObjectList<O> {
        &self.objects
    }

    /// End the session, handing over the registered objects
    pub fn into_objects(self) -> PickedObjectList<O> {
        self.objects
    }

    fn add(&mut self, owner: O, terrain: bool) -> Result<Rgba8> {
        let id = self.next_id;
        if id > MAX_PICK_ID {
            return Err(Error::Pick(format!(
                "pick id space exhausted after {} objects",
                MAX_PICK_ID
            )));
        }
        self.next_id += 1;
        self.objects.add(PickedObject { id, owner, terrain, on_top: false });
        Ok(encode_pick_id(id))
    }
}
