//! Structural type descriptors.
//!
//! A `Type` describes the expected shape of one payload node: its native
//! scalar classification, how many times a conforming value may repeat under
//! its parent's named slot, and (for closed shapes) the exact set of named
//! subtypes. Descriptors live in a `TypeTable` arena and reference each other
//! by `TypeId`, so recursive and mutually-recursive shapes are ordinary table
//! entries that point back at themselves. A built table is immutable and can
//! be shared across threads.

use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;

/// Native scalar classification of a payload node.
///
/// `Undefined` means "not yet constrained" and accepts anything; `Void`
/// demands the absence of a payload. The tag set is closed: unknown spellings
/// are rejected when a shape document is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeType {
    Any,
    Double,
    Int,
    String,
    Void,
    Undefined,
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeType::Any => "any",
            NativeType::Double => "double",
            NativeType::Int => "int",
            NativeType::String => "string",
            NativeType::Void => "void",
            NativeType::Undefined => "undefined",
        };
        write!(f, "{name}")
    }
}

/// Permitted repetition count, as a closed interval. `u32::MAX` renders the
/// unbounded `*` upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: u32,
    pub max: u32,
}

impl Range {
    pub const ONE: Range = Range { min: 1, max: 1 };
    pub const OPTIONAL: Range = Range { min: 0, max: 1 };
    pub const ANY: Range = Range { min: 0, max: u32::MAX };

    /// Callers keep `min <= max`; the declaration loader enforces this for
    /// user input.
    pub fn new(min: u32, max: u32) -> Self {
        Range { min, max }
    }

    pub fn contains(self, n: usize) -> bool {
        self.min as u64 <= n as u64 && n as u64 <= self.max as u64
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.max == u32::MAX {
            write!(f, "[{},*]", self.min)
        } else {
            write!(f, "[{},{}]", self.min, self.max)
        }
    }
}

/// Handle to a descriptor in a `TypeTable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One immutable shape descriptor.
#[derive(Debug, Clone)]
pub struct Type {
    pub native_type: NativeType,
    /// How many times a conforming value may repeat under its parent's named
    /// slot. Ignored when this descriptor is the root of a check.
    pub cardinality: Range,
    /// Closed: the declared subtype set is exact. Open: children are
    /// unconstrained and unchecked.
    pub closed_shape: bool,
    /// Unique names, iteration pinned to declaration order.
    pub sub_types: IndexMap<String, TypeId>,
}

impl Type {
    pub fn new(
        native_type: NativeType,
        cardinality: Range,
        closed_shape: bool,
        sub_types: IndexMap<String, TypeId>,
    ) -> Self {
        Type { native_type, cardinality, closed_shape, sub_types }
    }

    /// Closed shape with no subtypes: the value must have no children at all.
    pub fn leaf(native_type: NativeType, cardinality: Range) -> Self {
        Type::new(native_type, cardinality, true, IndexMap::new())
    }

    /// Open shape: children are not checked.
    pub fn open(native_type: NativeType, cardinality: Range) -> Self {
        Type::new(native_type, cardinality, false, IndexMap::new())
    }
}

/// Arena of descriptors. Slots can be reserved first and filled once their
/// referents exist, which is how self-referential shapes get built.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    types: Vec<Option<Type>>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(Some(ty));
        id
    }

    /// Reserve a slot so a definition can reference itself or a later one.
    pub fn reserve(&mut self) -> TypeId {
        let id = TypeId(self.types.len());
        self.types.push(None);
        id
    }

    pub fn fill(&mut self, id: TypeId, ty: Type) {
        self.types[id.0] = Some(ty);
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.types[id.0]
            .as_ref()
            .expect("BUG: reserved type slot was never filled")
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// One-line rendering of a descriptor, child slots shown by id.
    pub fn describe(&self, id: TypeId) -> String {
        let ty = self.get(id);
        let mut out = format!("{} {}", ty.native_type, ty.cardinality);
        if !ty.closed_shape {
            out.push_str(" open");
        } else if !ty.sub_types.is_empty() {
            out.push_str(" {");
            for (i, (name, child)) in ty.sub_types.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{name}: {child}"));
            }
            out.push('}');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_contains_and_rendering() {
        let r = Range::new(1, 3);
        assert!(!r.contains(0));
        assert!(r.contains(1));
        assert!(r.contains(3));
        assert!(!r.contains(4));
        assert_eq!(r.to_string(), "[1,3]");
        assert!(Range::ANY.contains(1_000_000));
        assert_eq!(Range::ANY.to_string(), "[0,*]");
        assert_eq!(Range::OPTIONAL.to_string(), "[0,1]");
    }

    #[test]
    fn reserve_then_fill_allows_self_reference() {
        let mut table = TypeTable::new();
        let node = table.reserve();
        table.fill(
            node,
            Type::new(
                NativeType::Int,
                Range::OPTIONAL,
                true,
                IndexMap::from([("next".to_string(), node)]),
            ),
        );
        assert_eq!(table.get(node).sub_types["next"], node);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn describe_renders_one_level() {
        let mut table = TypeTable::new();
        let label = table.insert(Type::leaf(NativeType::String, Range::ONE));
        let node = table.insert(Type::new(
            NativeType::Void,
            Range::ONE,
            true,
            IndexMap::from([("label".to_string(), label)]),
        ));
        assert_eq!(table.describe(label), "string [1,1]");
        assert_eq!(table.describe(node), "void [1,1] {label: #0}");
        let open = table.insert(Type::open(NativeType::Any, Range::ONE));
        assert_eq!(table.describe(open), "any [1,1] open");
    }

    #[test]
    fn sub_types_iterate_in_declaration_order() {
        let mut table = TypeTable::new();
        let leaf = table.insert(Type::leaf(NativeType::Any, Range::ONE));
        let mut subs = IndexMap::new();
        subs.insert("zeta".to_string(), leaf);
        subs.insert("alpha".to_string(), leaf);
        subs.insert("mid".to_string(), leaf);
        let parent = table.insert(Type::new(NativeType::Void, Range::ONE, true, subs));
        let names: Vec<&String> = table.get(parent).sub_types.keys().collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }
}
