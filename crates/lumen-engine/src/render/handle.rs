//! Generation-checked resource handles.
//!
//! Every GPU resource owned by a [`RenderContext`](super::RenderContext) lives in a
//! [`Pool`] slot. A [`Handle`] carries the slot index together with the slot's
//! generation, so a handle to a destroyed resource is detected even after the slot
//! has been reused by a newer resource.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use generational_arena::{Arena, Index};

/// Typed, copyable identifier of a resource of kind `T`.
pub struct Handle<T> {
    index: Index,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: Index) -> Self {
        Self {
            index,
            _marker: PhantomData,
        }
    }

    /// Untyped form, used as the key in backend-side resource tables.
    #[inline]
    pub fn raw(&self) -> RawHandle {
        RawHandle(self.index)
    }
}

// Manual impls: deriving would put bounds on `T`.
impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.index.into_raw_parts();
        write!(f, "Handle<{}>({slot}v{generation})", short_type_name::<T>())
    }
}

/// Type-erased handle.
///
/// Backends keep one table per resource kind, so two raw handles of different
/// kinds never share a table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(Index);

impl RawHandle {
    /// Returns `(slot, generation)`.
    pub fn parts(&self) -> (usize, u64) {
        self.0.into_raw_parts()
    }
}

/// Arena of resources of kind `T`, addressed by [`Handle<T>`].
pub struct Pool<T> {
    slots: Arena<T>,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            slots: Arena::new(),
        }
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        Handle::new(self.slots.insert(value))
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots.get(handle.index)
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots.get_mut(handle.index)
    }

    /// Removes the resource. Returns `None` if the handle is stale.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        self.slots.remove(handle.index)
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.slots.contains(handle.index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().map(|(index, value)| (Handle::new(index), value))
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn short_type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Dummy(u32);

    #[test]
    fn insert_then_get() {
        let mut pool = Pool::new();
        let h = pool.insert(Dummy(7));
        assert_eq!(pool.get(h), Some(&Dummy(7)));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn removed_handle_is_stale() {
        let mut pool = Pool::new();
        let h = pool.insert(Dummy(1));
        assert_eq!(pool.remove(h), Some(Dummy(1)));
        assert!(pool.get(h).is_none());
        assert!(pool.remove(h).is_none());
    }

    #[test]
    fn reused_slot_does_not_revive_old_handle() {
        let mut pool = Pool::new();
        let old = pool.insert(Dummy(1));
        pool.remove(old);
        let new = pool.insert(Dummy(2));

        // Same slot, newer generation.
        assert_eq!(old.raw().parts().0, new.raw().parts().0);
        assert_ne!(old, new);
        assert!(!pool.contains(old));
        assert_eq!(pool.get(new), Some(&Dummy(2)));
    }

    #[test]
    fn debug_names_the_resource_kind() {
        let mut pool = Pool::new();
        let h = pool.insert(Dummy(0));
        assert!(format!("{h:?}").starts_with("Handle<Dummy>("));
    }
}
