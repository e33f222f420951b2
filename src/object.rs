//! The object model (§3 DATA MODEL, §4.1): opaque, content-addressed
//! payloads arranged in a reference-counted DAG. The core never
//! interprets the payload bytes — that is a Non-goal (§1) — it only
//! carries the metadata needed to route, schedule, and garbage-collect
//! objects.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::Id;

/// A cluster-unique opaque name of the form `<id>m<counter>o<rank>r`
/// (§4.1 `createObjectId`/`createArrayId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectName(String);

impl ObjectName {
    fn format(creator: Id, counter: u64, rank: i32) -> String {
        format!("{}m{}o{}r", creator, counter, rank)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap an already-formatted name, e.g. one received over the wire
    /// from a peer hub.
    pub fn from_wire(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a name refers to a complete object or a raw array (used to
/// reject a type-mismatched handle lookup without touching the payload;
/// §4.1 "type tag is not OBJECT returns null and logs").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Object,
    Array,
}

/// Monotone per-(creator, rank) counter backing [`ObjectName`] generation.
#[derive(Debug, Default)]
pub struct NameGenerator {
    creator: Id,
    rank: i32,
    counter: std::sync::atomic::AtomicU64,
}

impl NameGenerator {
    pub fn new(creator: Id, rank: i32) -> Self {
        Self {
            creator,
            rank,
            counter: std::sync::atomic::AtomicU64::new(0),
        }
    }

    pub fn create_object_id(&self) -> ObjectName {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        ObjectName(ObjectName::format(self.creator, n, self.rank))
    }

    pub fn create_array_id(&self) -> ObjectName {
        self.create_object_id()
    }
}

/// The geometry/data kind a payload holds. The core only needs this to
/// decide whether an object represents complete geometry or bare
/// numeric data for routing and logging; it never unpacks the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ObjectType {
    Unknown = 0,
    Empty = 1,
    Placeholder = 11,
    Points = 18,
    Lines = 20,
    Triangles = 22,
    Polygons = 23,
    UnstructuredGrid = 24,
    UniformGrid = 25,
    RectilinearGrid = 26,
    StructuredGrid = 27,
    Quads = 28,
    Vec = 100,
}

/// Per-object metadata carried alongside every payload (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub block: i32,
    pub num_blocks: i32,
    pub timestep: i32,
    pub num_timesteps: i32,
    pub iteration: i32,
    pub generation: i32,
    /// ID of the module that produced this object; used to stamp and
    /// compare execution counters (§4.5).
    pub creator: Id,
    pub execution_counter: u64,
    pub real_time: f64,
    pub transform: nalgebra::Matrix4<f32>,
}

impl Default for ObjectMeta {
    fn default() -> Self {
        Self {
            block: 0,
            num_blocks: 1,
            timestep: -1,
            num_timesteps: -1,
            iteration: -1,
            generation: 0,
            creator: crate::id::INVALID,
            execution_counter: 0,
            real_time: 0.0,
            transform: nalgebra::Matrix4::identity(),
        }
    }
}

/// A node in the object DAG: a name, its metadata, the archive-version
/// tagged opaque bytes, and the names of the objects it references
/// (e.g. a data array referencing the grid it is defined on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: ObjectName,
    pub object_type: ObjectType,
    pub meta: ObjectMeta,
    pub archive_version: i32,
    pub attributes: HashMap<String, String>,
    pub references: Vec<ObjectName>,
    pub payload: Vec<u8>,
}

impl ObjectRecord {
    pub fn new(name: ObjectName, object_type: ObjectType, archive_version: i32, payload: Vec<u8>) -> Self {
        Self {
            name,
            object_type,
            meta: ObjectMeta::default(),
            archive_version,
            attributes: HashMap::new(),
            references: Vec::new(),
            payload,
        }
    }

    pub fn with_reference(mut self, reference: ObjectName) -> Self {
        self.references.push(reference);
        self
    }

    /// An object is complete once every object it references is itself
    /// resident and complete; the store resolves this transitively
    /// rather than the record carrying the bit directly.
    pub fn direct_references(&self) -> &[ObjectName] {
        &self.references
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_are_unique_and_carry_creator_and_rank() {
        let gen = NameGenerator::new(7, 2);
        let a = gen.create_object_id();
        let b = gen.create_object_id();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("7m"));
        assert!(a.as_str().ends_with("o2r"));
    }

    #[test]
    fn references_are_recorded_in_insertion_order() {
        let grid = ObjectName("1m0o0r".to_string());
        let normals = ObjectName("1m1o0r".to_string());
        let rec = ObjectRecord::new(
            ObjectName("1m2o0r".to_string()),
            ObjectType::Triangles,
            1,
            vec![],
        )
        .with_reference(grid.clone())
        .with_reference(normals.clone());

        assert_eq!(rec.direct_references(), &[grid, normals]);
    }
}
