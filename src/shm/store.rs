//! The shared-memory object store (§4.1).
//!
//! One named, fixed-size segment per node backs every object created
//! locally. Two recursive mutexes guard it: `lifetime` serialises
//! delete-vs-lookup races on a single object, `dictionary` guards the
//! name→entry map used to resolve handles. Readers take `lifetime`
//! only across "translate name, bump refcount, release" — the smart
//! pointer returned afterwards needs no further locking.

use std::collections::HashMap;

use parking_lot::ReentrantMutex;
use shared_memory::{Shmem, ShmemConf};
use std::cell::RefCell;
use std::sync::Arc;

use crate::config::SHM_ALLOC_FLOOR;
use crate::error::{Error, Result};
use crate::object::{ObjectName, ObjectRecord, TypeTag};

struct Entry {
    tag: TypeTag,
    record: ObjectRecord,
    refcount: usize,
    destroyed: bool,
}

/// A reference-bumped handle to a resident object. Dropping it releases
/// the reference; the backing entry is only actually freed once the
/// count reaches zero and [`SharedStore::remove`] has been called.
pub struct ObjectHandle {
    store: Arc<SharedStoreInner>,
    name: ObjectName,
}

impl ObjectHandle {
    pub fn name(&self) -> &ObjectName {
        &self.name
    }

    pub fn record(&self) -> Option<ObjectRecord> {
        let guard = self.store.dictionary.lock();
        guard.borrow().get(&self.name).map(|e| e.record.clone())
    }
}

impl Clone for ObjectHandle {
    fn clone(&self) -> Self {
        let guard = self.store.dictionary.lock();
        if let Some(entry) = guard.borrow_mut().get_mut(&self.name) {
            entry.refcount += 1;
        }
        Self {
            store: self.store.clone(),
            name: self.name.clone(),
        }
    }
}

impl Drop for ObjectHandle {
    fn drop(&mut self) {
        let _lifetime = self.store.lifetime.lock();
        let guard = self.store.dictionary.lock();
        let mut map = guard.borrow_mut();
        if let Some(entry) = map.get_mut(&self.name) {
            entry.refcount = entry.refcount.saturating_sub(1);
            if entry.destroyed && entry.refcount == 0 {
                map.remove(&self.name);
            }
        }
    }
}

struct SharedStoreInner {
    #[allow(dead_code)]
    segment: Shmem,
    segment_name: String,
    dictionary: ReentrantMutex<RefCell<HashMap<ObjectName, Entry>>>,
    lifetime: ReentrantMutex<()>,
}

/// A single node's shared-memory object arena.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<SharedStoreInner>,
}

impl SharedStore {
    /// Create a fresh segment, retrying with the requested size halved
    /// until a 4 KiB floor is reached (§4.1).
    pub fn create(segment_name: &str, requested_size: usize) -> Result<Self> {
        let mut size = requested_size.max(SHM_ALLOC_FLOOR);
        loop {
            match ShmemConf::new().size(size).flink(segment_name).create() {
                Ok(segment) => {
                    return Ok(Self {
                        inner: Arc::new(SharedStoreInner {
                            segment,
                            segment_name: segment_name.to_string(),
                            dictionary: ReentrantMutex::new(RefCell::new(HashMap::new())),
                            lifetime: ReentrantMutex::new(()),
                        }),
                    });
                }
                Err(e) if size > SHM_ALLOC_FLOOR => {
                    tracing::warn!(segment = segment_name, size, error = %e, "shm allocation failed, halving");
                    size = (size / 2).max(SHM_ALLOC_FLOOR);
                }
                Err(e) => {
                    return Err(Error::SharedMemory(format!(
                        "failed to create segment '{}' at the {}-byte floor: {}",
                        segment_name, SHM_ALLOC_FLOOR, e
                    )));
                }
            }
        }
    }

    /// Attach to an existing segment; fails loudly if it doesn't exist
    /// (§4.1 "attempting to attach to a non-existent segment throws").
    pub fn attach(segment_name: &str) -> Result<Self> {
        let segment = ShmemConf::new().flink(segment_name).open().map_err(|e| {
            Error::SharedMemory(format!("no such segment '{}': {}", segment_name, e))
        })?;
        Ok(Self {
            inner: Arc::new(SharedStoreInner {
                segment,
                segment_name: segment_name.to_string(),
                dictionary: ReentrantMutex::new(RefCell::new(HashMap::new())),
                lifetime: ReentrantMutex::new(()),
            }),
        })
    }

    pub fn segment_name(&self) -> &str {
        &self.inner.segment_name
    }

    /// Construct a new named object, replacing any prior entry of the
    /// same name.
    pub fn construct(&self, name: ObjectName, tag: TypeTag, record: ObjectRecord) -> Result<ObjectHandle> {
        let guard = self.inner.dictionary.lock();
        guard.borrow_mut().insert(
            name.clone(),
            Entry {
                tag,
                record,
                refcount: 1,
                destroyed: false,
            },
        );
        Ok(ObjectHandle {
            store: self.inner.clone(),
            name,
        })
    }

    /// Look up a name without type-checking; `None` if absent or
    /// marked destroyed.
    pub fn find(&self, name: &ObjectName) -> Option<ObjectHandle> {
        let guard = self.inner.dictionary.lock();
        let mut map = guard.borrow_mut();
        let entry = map.get_mut(name)?;
        if entry.destroyed {
            return None;
        }
        entry.refcount += 1;
        Some(ObjectHandle {
            store: self.inner.clone(),
            name: name.clone(),
        })
    }

    /// Resolve a handle, rejecting a type-tag mismatch (§4.1: "looking
    /// up a handle whose type tag is not OBJECT returns null and logs").
    pub fn get_object_from_handle(&self, handle: &ObjectHandle) -> Option<ObjectRecord> {
        let guard = self.inner.dictionary.lock();
        let map = guard.borrow();
        let entry = map.get(&handle.name)?;
        if entry.tag != TypeTag::Object {
            tracing::warn!(name = %handle.name, "handle does not name an object");
            return None;
        }
        Some(entry.record.clone())
    }

    /// `onlyComplete` mirrors §4.1's `getObjectFromName`: when true,
    /// an object whose references aren't all resident yet is reported
    /// absent rather than partially materialised.
    pub fn get_object_from_name(&self, name: &ObjectName, only_complete: bool) -> Option<ObjectRecord> {
        let guard = self.inner.dictionary.lock();
        let map = guard.borrow();
        let entry = map.get(name)?;
        if entry.destroyed || entry.tag != TypeTag::Object {
            return None;
        }
        if only_complete && !self.is_complete_locked(&map, name, &mut Vec::new()) {
            return None;
        }
        Some(entry.record.clone())
    }

    fn is_complete_locked(
        &self,
        map: &HashMap<ObjectName, Entry>,
        name: &ObjectName,
        visiting: &mut Vec<ObjectName>,
    ) -> bool {
        if visiting.contains(name) {
            return true; // a cycle can't block completeness further
        }
        let Some(entry) = map.get(name) else { return false };
        if entry.destroyed {
            return false;
        }
        visiting.push(name.clone());
        let complete = entry
            .record
            .direct_references()
            .iter()
            .all(|r| self.is_complete_locked(map, r, visiting));
        visiting.pop();
        complete
    }

    /// Mark an object destroyed. It is actually freed once its
    /// refcount reaches zero (debug builds assert against a double
    /// remove; §4.1 "asserted single-delete under debug builds").
    pub fn remove(&self, name: &ObjectName) -> Result<()> {
        let _lifetime = self.inner.lifetime.lock();
        let guard = self.inner.dictionary.lock();
        let mut map = guard.borrow_mut();
        match map.get_mut(name) {
            Some(entry) => {
                debug_assert!(!entry.destroyed, "double remove of {}", name);
                if entry.destroyed {
                    return Err(Error::SharedMemory(format!("double remove of {}", name)));
                }
                entry.destroyed = true;
                if entry.refcount == 0 {
                    map.remove(name);
                }
                Ok(())
            }
            None => Err(Error::SharedMemory(format!("no such object {}", name))),
        }
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.dictionary.lock();
        guard.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectType, ObjectRecord};

    fn store() -> SharedStore {
        let name = format!("vistle_test_{}_{}", std::process::id(), uuid::Uuid::new_v4());
        SharedStore::create(&name, SHM_ALLOC_FLOOR).unwrap()
    }

    #[test]
    fn construct_then_find_round_trips() {
        let s = store();
        let name = ObjectName::from_wire("1m0o0r");
        let rec = ObjectRecord::new(name.clone(), ObjectType::Points, 1, vec![1, 2, 3]);
        let handle = s.construct(name.clone(), TypeTag::Object, rec).unwrap();
        assert_eq!(handle.name(), &name);
        assert!(s.find(&name).is_some());
    }

    #[test]
    fn removed_object_is_freed_once_refcount_drops() {
        let s = store();
        let name = ObjectName::from_wire("1m1o0r");
        let rec = ObjectRecord::new(name.clone(), ObjectType::Points, 1, vec![]);
        let handle = s.construct(name.clone(), TypeTag::Object, rec).unwrap();
        s.remove(&name).unwrap();
        assert_eq!(s.len(), 1);
        drop(handle);
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn double_remove_is_rejected() {
        let s = store();
        let name = ObjectName::from_wire("1m2o0r");
        let rec = ObjectRecord::new(name.clone(), ObjectType::Points, 1, vec![]);
        let _handle = s.construct(name.clone(), TypeTag::Object, rec).unwrap();
        s.remove(&name).unwrap();
        assert!(s.remove(&name).is_err());
    }

    #[test]
    fn incomplete_object_is_hidden_until_its_reference_resolves() {
        let s = store();
        let grid_name = ObjectName::from_wire("1m3o0r");
        let data_name = ObjectName::from_wire("1m4o0r");

        let data_rec = ObjectRecord::new(data_name.clone(), ObjectType::Vec, 1, vec![])
            .with_reference(grid_name.clone());
        let _data_handle = s.construct(data_name.clone(), TypeTag::Object, data_rec).unwrap();

        assert!(s.get_object_from_name(&data_name, true).is_none());

        let grid_rec = ObjectRecord::new(grid_name.clone(), ObjectType::UniformGrid, 1, vec![]);
        let _grid_handle = s.construct(grid_name, TypeTag::Object, grid_rec).unwrap();

        assert!(s.get_object_from_name(&data_name, true).is_some());
    }
}
