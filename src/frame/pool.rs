//! Free-list pool for reusable frame-sized objects

/// Objects that can be returned to a pool
pub trait Recycle {
    /// Drop every reference the object holds to external state
    ///
    /// Allocations may be kept; contents may not.
    fn recycle(&mut self);
}

/// Unbounded free list with a factory for misses
pub struct ObjectPool<T> {
    free: Vec<T>,
    factory: Box<dyn Fn() -> T + Send>,
    created: usize,
}

impl<T: Recycle> ObjectPool<T> {
    /// Create an empty pool that builds new objects with `factory`
    pub fn new(factory: impl Fn() -> T + Send + 'static) -> Self {
        Self {
            free: Vec::new(),
            factory: Box::new(factory),
            created: 0,
        }
    }

    /// Build `count` objects up front
    pub fn prewarm(&mut self, count: usize) {
        self.free.reserve(count);
        for _ in 0..count {
            let item = (self.factory)();
            self.created += 1;
            self.free.push(item);
        }
    }

    /// Take a free object, or build one
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(item) => item,
            None => {
                self.created += 1;
                log::trace!("Object pool miss, {} objects created", self.created);
                (self.factory)()
            }
        }
    }

    /// Recycle an object and put it back on the free list
    pub fn release(&mut self, mut item: T) {
        item.recycle();
        self.free.push(item);
    }

    /// Put back an object the caller already recycled
    ///
    /// Lets callers run [`Recycle::recycle`] outside whatever lock guards
    /// the pool.
    pub fn put_back(&mut self, item: T) {
        self.free.push(item);
    }

    /// Objects waiting on the free list
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Objects the factory has built so far
    pub fn created(&self) -> usize {
        self.created
    }
}

impl<T> std::fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("available", &self.free.len())
            .field("created", &self.created)
            .finish()
    }
}
