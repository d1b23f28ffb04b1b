//! Result type descriptors
//!
//! Every GraphQL object backed by a table declares its fields once, as a
//! static table, tagging each as [`FieldKind::Stored`] (a column) or
//! [`FieldKind::Computed`] (produced by a resolver). The derived [`Shape`] of a
//! descriptor is computed on first use and kept for the life of the process.

use once_cell::sync::Lazy;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

/// Semantic type of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Float,
    Boolean,
    Timestamp,
    Id,
    StringList,
    /// A nested result type, by name.
    Object(&'static str),
    ObjectList(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Stored,
    Computed,
}

/// One declared field, named in storage (snake case) convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: &'static str,
    pub ty: FieldType,
    pub kind: FieldKind,
}

impl FieldDecl {
    pub const fn stored(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            kind: FieldKind::Stored,
        }
    }

    pub const fn computed(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            kind: FieldKind::Computed,
        }
    }
}

/// Static shape of one result type
#[derive(Debug)]
pub struct Descriptor {
    /// GraphQL type name; also the memoization key.
    pub name: &'static str,
    /// Row store table the stored fields live in.
    pub table: &'static str,
    pub fields: &'static [FieldDecl],
}

/// Implemented by every GraphQL object with a descriptor
pub trait Described {
    fn descriptor() -> &'static Descriptor;
}

/// Stored and computed field names of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Declaration order.
    pub stored: Vec<&'static str>,
    pub computed: BTreeSet<&'static str>,
}

/// Classify every declared field.
///
/// A name that is declared both ways counts as computed: a resolver shadows
/// the column.
pub fn partition_attributes(descriptor: &Descriptor) -> Partition {
    let computed: BTreeSet<&'static str> = descriptor
        .fields
        .iter()
        .filter(|f| f.kind == FieldKind::Computed)
        .map(|f| f.name)
        .collect();

    let mut stored = Vec::new();
    for field in descriptor.fields {
        if field.kind == FieldKind::Stored
            && !computed.contains(field.name)
            && !stored.contains(&field.name)
        {
            stored.push(field.name);
        }
    }

    Partition { stored, computed }
}

/// `household_id` -> `householdId`
pub fn snake_to_camel(name: &str) -> String {
    let mut parts = name.split('_');
    let mut out = parts.next().unwrap_or_default().to_lowercase();
    for part in parts {
        let mut chars = part.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

/// Map wire names and storage names to storage names.
///
/// Identity entries always win, so a storage name is never redirected. When
/// two storage names share a wire name the first declared keeps it.
pub fn build_naming_map(stored: &[&'static str]) -> HashMap<String, &'static str> {
    let mut map: HashMap<String, &'static str> = HashMap::new();
    for &name in stored {
        let wire = snake_to_camel(name);
        if wire == name {
            continue;
        }
        match map.get(&wire) {
            Some(existing) if *existing != name => {
                tracing::warn!(
                    wire = %wire,
                    kept = *existing,
                    dropped = name,
                    "stored fields collide on wire name"
                );
            }
            Some(_) => {}
            None => {
                map.insert(wire, name);
            }
        }
    }
    for &name in stored {
        map.insert(name.to_string(), name);
    }
    map
}

/// Everything projection needs to know about a descriptor
#[derive(Debug)]
pub struct Shape {
    pub partition: Partition,
    pub naming: HashMap<String, &'static str>,
}

impl Shape {
    fn build(descriptor: &Descriptor) -> Self {
        let partition = partition_attributes(descriptor);
        let naming = build_naming_map(&partition.stored);
        Self { partition, naming }
    }

    /// Storage name for a wire or storage name, when it is a stored field.
    pub fn column(&self, name: &str) -> Option<&'static str> {
        self.naming.get(name).copied()
    }

    pub fn is_stored(&self, column: &str) -> bool {
        self.partition.stored.iter().any(|s| *s == column)
    }
}

static SHAPES: Lazy<RwLock<HashMap<&'static str, Arc<Shape>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Memoized shape of `descriptor`.
pub fn shape(descriptor: &'static Descriptor) -> Arc<Shape> {
    if let Some(shape) = SHAPES
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(descriptor.name)
    {
        return shape.clone();
    }

    let mut shapes = SHAPES.write().unwrap_or_else(PoisonError::into_inner);
    shapes
        .entry(descriptor.name)
        .or_insert_with(|| Arc::new(Shape::build(descriptor)))
        .clone()
}
