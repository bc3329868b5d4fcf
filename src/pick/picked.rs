//! Pick results

/// One object that took part in a pick session
#[derive(Clone, Debug, PartialEq)]
pub struct PickedObject<O> {
    /// Unique within the session, never 0
    pub id: u32,
    /// Scene object this entry stands for
    pub owner: O,
    /// Terrain entries report ground position, not draw order
    pub terrain: bool,
    /// Frontmost hit at the picked location
    pub on_top: bool,
}

/// Objects of one pick session, ordered by id
///
/// The terrain entry is tracked separately: callers usually want the ground
/// position under the cursor even when something else is on top.
#[derive(Clone, Debug, PartialEq)]
pub struct PickedObjectList<O> {
    objects: Vec<PickedObject<O>>,
    terrain: Option<u32>,
}

impl<O> Default for PickedObjectList<O> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            terrain: None,
        }
    }
}

impl<O> PickedObjectList<O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an object; ids must be added in increasing order
    pub fn add(&mut self, object: PickedObject<O>) {
        debug_assert!(
            self.objects.last().is_none_or(|last| last.id < object.id),
            "pick ids must be added in increasing order"
        );
        self.objects.push(object);
    }

    /// Find an object by pick id
    pub fn get(&self, id: u32) -> Option<&PickedObject<O>> {
        self.index_of(id).map(|i| &self.objects[i])
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut PickedObject<O>> {
        self.index_of(id).map(move |i| &mut self.objects[i])
    }

    /// The terrain entry, if terrain was hit
    pub fn terrain_object(&self) -> Option<&PickedObject<O>> {
        self.terrain.and_then(|id| self.get(id))
    }

    pub fn has_terrain(&self) -> bool {
        self.terrain.is_some()
    }

    pub(crate) fn set_terrain(&mut self, id: u32) {
        self.terrain = Some(id);
    }

    /// The first non-terrain object marked on top
    pub fn top_object(&self) -> Option<&PickedObject<O>> {
        self.objects.iter().find(|o| o.on_top && !o.terrain)
    }

    /// Every non-terrain object marked on top
    pub fn top_objects(&self) -> impl Iterator<Item = &PickedObject<O>> {
        self.objects.iter().filter(|o| o.on_top && !o.terrain)
    }

    /// Keep only objects marked on top and the terrain entry
    pub(crate) fn retain_top_and_terrain(&mut self) {
        let terrain = self.terrain;
        self.objects.retain(|o| o.on_top || Some(o.id) == terrain);
    }

    pub fn iter(&self) -> impl Iterator<Item = &PickedObject<O>> {
        self.objects.iter()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Drop every object and the terrain entry
    pub fn clear(&mut self) {
        self.objects.clear();
        self.terrain = None;
    }

    fn index_of(&self, id: u32) -> Option<usize> {
        self.objects.binary_search_by_key(&id, |o| o.id).ok()
    }
}

impl<O> IntoIterator for PickedObjectList<O> {
    type Item = PickedObject<O>;
    type IntoIter = std::vec::IntoIter<PickedObject<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_iter()
    }
}
