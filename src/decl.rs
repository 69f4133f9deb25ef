//! Shape declarations.
//!
//! Shapes are declared in a JSON document: a map of named type definitions
//! plus a `root` entry point. Definitions reference each other by name, so
//! recursive and mutually-recursive shapes are plain declarations:
//!
//! ```json
//! {
//!   "types": {
//!     "node": {
//!       "native": "int",
//!       "subtypes": {
//!         "label": { "native": "string" },
//!         "next":  { "ref": "node" }
//!       }
//!     }
//!   },
//!   "root": "node"
//! }
//! ```
//!
//! Defaults: `native` is `void`, cardinality is `[1,1]` (`min` alone gives
//! `[min, max(min,1)]`, `"max": "*"` is unbounded), shapes are closed unless
//! `"open": true`. A `ref` carrying `min`/`max` compiles to a variant of the
//! target with the overridden cardinality.
//!
//! Loading compiles the document into an immutable `TypeTable`; all name
//! resolution happens here, so checking never sees a dangling reference.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::ty::{NativeType, Range, Type, TypeId, TypeTable};

// ----------------------------- Document form ------------------------------ //

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShapeDoc {
    #[serde(default)]
    types: IndexMap<String, TypeDecl>,
    root: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    /// Reference to a top-level definition instead of an inline body.
    #[serde(rename = "ref")]
    ref_: Option<String>,
    native: Option<NativeType>,
    min: Option<u32>,
    max: Option<MaxDecl>,
    #[serde(default)]
    open: bool,
    #[serde(default)]
    subtypes: IndexMap<String, TypeDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MaxDecl {
    Count(u32),
    /// Only `"*"` is accepted.
    Star(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeclError {
    #[error("shape document does not parse: at JSON path {path}: {message}")]
    Parse { path: String, message: String },

    #[error("bad type name {0:?}: names match [A-Za-z_][A-Za-z0-9_]*")]
    BadName(String),

    #[error("{name}: max must be a number or \"*\", got {got:?}")]
    BadBound { name: String, got: String },

    #[error("{name}: bad cardinality [{min},{max}]")]
    BadRange { name: String, min: u32, max: u32 },

    #[error("{name}: reference to unknown type {target:?}")]
    UnknownRef { name: String, target: String },

    #[error("{0}: a ref takes only min/max, not a body")]
    RefWithBody(String),

    #[error("{0}: a top-level definition cannot be a bare ref")]
    TopLevelRef(String),

    #[error("{0}: an open shape cannot declare subtypes")]
    OpenWithSubtypes(String),

    #[error("root type {0:?} is not declared")]
    NoRoot(String),
}

// ------------------------------ Compilation ------------------------------- //

/// A loaded shape: the descriptor arena, the named definitions, and the
/// entry point documents are checked against.
#[derive(Debug, Clone)]
pub struct CompiledShape {
    pub table: TypeTable,
    pub root: TypeId,
    pub names: IndexMap<String, TypeId>,
}

impl CompiledShape {
    /// Parse and compile a shape document. Parse failures carry the JSON
    /// path of the offending field.
    pub fn from_str(src: &str) -> Result<Self, DeclError> {
        let de = &mut serde_json::Deserializer::from_str(src);
        let doc: ShapeDoc =
            serde_path_to_error::deserialize(de).map_err(|err| DeclError::Parse {
                path: err.path().to_string(),
                message: err.into_inner().to_string(),
            })?;
        Self::compile(&doc)
    }

    pub fn compile(doc: &ShapeDoc) -> Result<Self, DeclError> {
        let mut table = TypeTable::new();
        let mut names: IndexMap<String, TypeId> = IndexMap::new();

        // pass 1: reserve a slot per named definition, so references to any
        // definition (including the one being compiled) already resolve
        for name in doc.types.keys() {
            check_name(name)?;
            names.insert(name.clone(), table.reserve());
        }

        // pass 2: resolve bodies; ref sites with a cardinality override
        // become variants, filled after every named definition exists
        let mut variants: Vec<VariantSite> = Vec::new();
        for (name, decl) in &doc.types {
            if decl.ref_.is_some() {
                return Err(DeclError::TopLevelRef(name.clone()));
            }
            let ty = resolve(decl, name, &names, &mut table, &mut variants)?;
            table.fill(names[name.as_str()], ty);
        }

        // pass 3: variants clone their (now filled) target with the new range
        for site in variants {
            let mut ty = table.get(names[site.target.as_str()]).clone();
            ty.cardinality = site.cardinality;
            table.fill(site.slot, ty);
        }

        let root = *names
            .get(&doc.root)
            .ok_or_else(|| DeclError::NoRoot(doc.root.clone()))?;
        Ok(CompiledShape { table, root, names })
    }
}

struct VariantSite {
    slot: TypeId,
    target: String,
    cardinality: Range,
}

fn resolve(
    decl: &TypeDecl,
    name: &str,
    names: &IndexMap<String, TypeId>,
    table: &mut TypeTable,
    variants: &mut Vec<VariantSite>,
) -> Result<Type, DeclError> {
    if decl.open && !decl.subtypes.is_empty() {
        return Err(DeclError::OpenWithSubtypes(name.to_string()));
    }

    let cardinality = cardinality_of(decl, name)?;
    let mut sub_types = IndexMap::new();
    for (child_name, child_decl) in &decl.subtypes {
        check_name(child_name)?;
        let child_id = match &child_decl.ref_ {
            Some(target) => {
                if child_decl.native.is_some()
                    || child_decl.open
                    || !child_decl.subtypes.is_empty()
                {
                    return Err(DeclError::RefWithBody(child_name.clone()));
                }
                if !names.contains_key(target) {
                    return Err(DeclError::UnknownRef {
                        name: child_name.clone(),
                        target: target.clone(),
                    });
                }
                if child_decl.min.is_none() && child_decl.max.is_none() {
                    // share the target definition as-is
                    names[target.as_str()]
                } else {
                    let slot = table.reserve();
                    variants.push(VariantSite {
                        slot,
                        target: target.clone(),
                        cardinality: cardinality_of(child_decl, child_name)?,
                    });
                    slot
                }
            }
            None => {
                let child_ty = resolve(child_decl, child_name, names, table, variants)?;
                table.insert(child_ty)
            }
        };
        sub_types.insert(child_name.clone(), child_id);
    }

    Ok(Type::new(
        decl.native.unwrap_or(NativeType::Void),
        cardinality,
        !decl.open,
        sub_types,
    ))
}

fn cardinality_of(decl: &TypeDecl, name: &str) -> Result<Range, DeclError> {
    let min = decl.min.unwrap_or(1);
    let max = match &decl.max {
        None => min.max(1),
        Some(MaxDecl::Count(n)) => *n,
        Some(MaxDecl::Star(s)) if s == "*" => u32::MAX,
        Some(MaxDecl::Star(s)) => {
            return Err(DeclError::BadBound { name: name.to_string(), got: s.clone() })
        }
    };
    if min > max {
        return Err(DeclError::BadRange { name: name.to_string(), min, max });
    }
    Ok(Range::new(min, max))
}

static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

fn check_name(name: &str) -> Result<(), DeclError> {
    if NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(DeclError::BadName(name.to_string()))
    }
}

// -------------------------------- Tests ----------------------------------- //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use serde_json::json;

    fn compile(doc: serde_json::Value) -> Result<CompiledShape, DeclError> {
        CompiledShape::from_str(&doc.to_string())
    }

    #[test]
    fn defaults_are_void_closed_one_to_one() {
        let shape = compile(json!({
            "types": {"t": {}},
            "root": "t"
        }))
        .unwrap();
        let ty = shape.table.get(shape.root);
        assert_eq!(ty.native_type, NativeType::Void);
        assert_eq!(ty.cardinality, Range::ONE);
        assert!(ty.closed_shape);
        assert!(ty.sub_types.is_empty());
    }

    #[test]
    fn min_alone_and_star_bounds() {
        let shape = compile(json!({
            "types": {
                "t": {"subtypes": {
                    "opt":  {"min": 0},
                    "some": {"min": 3},
                    "many": {"min": 0, "max": "*"}
                }}
            },
            "root": "t"
        }))
        .unwrap();
        let ty = shape.table.get(shape.root);
        let card = |name: &str| shape.table.get(ty.sub_types[name]).cardinality;
        assert_eq!(card("opt"), Range::OPTIONAL);
        assert_eq!(card("some"), Range::new(3, 3));
        assert_eq!(card("many"), Range::ANY);
    }

    #[test]
    fn subtype_declaration_order_is_preserved() {
        let shape = compile(json!({
            "types": {"t": {"subtypes": {"zeta": {}, "alpha": {}, "mid": {}}}},
            "root": "t"
        }))
        .unwrap();
        let names: Vec<&String> = shape.table.get(shape.root).sub_types.keys().collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn refs_resolve_including_self_reference() {
        let shape = compile(json!({
            "types": {
                "node": {
                    "native": "int",
                    "subtypes": {
                        "label": {"native": "string", "min": 0},
                        "next":  {"ref": "node", "min": 0}
                    }
                }
            },
            "root": "node"
        }))
        .unwrap();
        // the variant slot points back at a clone of node with range [0,1]
        let node = shape.table.get(shape.root);
        let next = shape.table.get(node.sub_types["next"]);
        assert_eq!(next.native_type, NativeType::Int);
        assert_eq!(next.cardinality, Range::OPTIONAL);
        assert_eq!(next.sub_types.keys().collect::<Vec<_>>(), ["label", "next"]);

        // and the compiled shape actually checks a chain
        let chain = Value::from_json(&json!({
            "$": 1, "label": ["a"], "next": {"$": 2, "label": [], "next": []}
        }))
        .unwrap();
        assert_eq!(shape.table.check(shape.root, &chain), Ok(()));
    }

    #[test]
    fn mutual_recursion_compiles() {
        let shape = compile(json!({
            "types": {
                "ping": {"subtypes": {"pong": {"ref": "pong", "min": 0}}},
                "pong": {"subtypes": {"ping": {"ref": "ping", "min": 0}}}
            },
            "root": "ping"
        }))
        .unwrap();
        let doc = Value::from_json(&json!({
            "pong": {"ping": {"pong": []}}
        }))
        .unwrap();
        assert_eq!(shape.table.check(shape.root, &doc), Ok(()));
    }

    #[test]
    fn plain_ref_shares_the_target_definition() {
        let shape = compile(json!({
            "types": {
                "id":  {"native": "string"},
                "t":   {"subtypes": {"a": {"ref": "id"}, "b": {"ref": "id"}}}
            },
            "root": "t"
        }))
        .unwrap();
        let ty = shape.table.get(shape.root);
        assert_eq!(ty.sub_types["a"], ty.sub_types["b"]);
        assert_eq!(ty.sub_types["a"], shape.names["id"]);
    }

    #[test]
    fn unknown_native_spelling_is_a_parse_error_with_a_path() {
        let err = compile(json!({
            "types": {"t": {"native": "quaternion"}},
            "root": "t"
        }))
        .unwrap_err();
        match err {
            DeclError::Parse { path, .. } => assert!(path.contains("types.t")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn bad_declarations_are_rejected() {
        assert_eq!(
            compile(json!({"types": {"3x": {}}, "root": "3x"})).unwrap_err(),
            DeclError::BadName("3x".to_string())
        );
        assert_eq!(
            compile(json!({"types": {"t": {"subtypes": {"x": {"min": 2, "max": 1}}}}, "root": "t"}))
                .unwrap_err(),
            DeclError::BadRange { name: "x".to_string(), min: 2, max: 1 }
        );
        assert_eq!(
            compile(json!({"types": {"t": {"subtypes": {"x": {"max": "+"}}}}, "root": "t"}))
                .unwrap_err(),
            DeclError::BadBound { name: "x".to_string(), got: "+".to_string() }
        );
        assert_eq!(
            compile(json!({"types": {"t": {"subtypes": {"x": {"ref": "ghost"}}}}, "root": "t"}))
                .unwrap_err(),
            DeclError::UnknownRef { name: "x".to_string(), target: "ghost".to_string() }
        );
        assert_eq!(
            compile(json!({
                "types": {
                    "u": {},
                    "t": {"subtypes": {"x": {"ref": "u", "native": "int"}}}
                },
                "root": "t"
            }))
            .unwrap_err(),
            DeclError::RefWithBody("x".to_string())
        );
        assert_eq!(
            compile(json!({"types": {"u": {}, "t": {"ref": "u"}}, "root": "t"})).unwrap_err(),
            DeclError::TopLevelRef("t".to_string())
        );
        assert_eq!(
            compile(json!({"types": {"t": {"open": true, "subtypes": {"x": {}}}}, "root": "t"}))
                .unwrap_err(),
            DeclError::OpenWithSubtypes("t".to_string())
        );
        assert_eq!(
            compile(json!({"types": {"t": {}}, "root": "ghost"})).unwrap_err(),
            DeclError::NoRoot("ghost".to_string())
        );
    }

    #[test]
    fn open_shapes_skip_child_checks() {
        let shape = compile(json!({
            "types": {"t": {"native": "string", "open": true}},
            "root": "t"
        }))
        .unwrap();
        let doc = Value::from_json(&json!({"$": "s", "anything": [1, 2, 3]})).unwrap();
        assert_eq!(shape.table.check(shape.root, &doc), Ok(()));
    }
}
