//! The recursive structural check.
//!
//! `TypeTable::check` walks a value depth-first against a descriptor and
//! fails fast on the first violation, in declaration order of the subtype
//! names. Descriptor graphs may be cyclic (recursive shapes); termination is
//! bounded by the finite depth of the value tree, so callers must hand in
//! finite values. The walk is read-only on both sides, which is what makes a
//! compiled table safe to share across threads.
//!
//! Closed shapes gate on the NUMBER of distinct child names, not on the name
//! sets themselves. That gate is historical and kept as-is: a value whose
//! name set differs from the declared set but matches in size slips through
//! it, and the per-name pass afterwards catches most but not all such values
//! (an undeclared extra name balancing one missing optional name passes).
//! `check_strict` closes that hole behind an explicit opt-in.

use thiserror::Error;

use crate::ty::{NativeType, Range, TypeId, TypeTable};
use crate::value::{Value, ValueKind};

/// A structural conformance violation. The first one found aborts the walk;
/// nothing is accumulated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TypeCheckingError {
    #[error("invalid native type: expected {expected}, found {found}")]
    NativeTypeMismatch { expected: NativeType, found: ValueKind },

    #[error("invalid number of child nodes: {declared} declared, {found} present")]
    ChildNameCountMismatch { declared: usize, found: usize },

    #[error("undefined required child node: {name}")]
    MissingRequiredChild { name: String },

    #[error(
        "child node {name} has a wrong number of occurrences: \
         permitted range is {range}, found {found}"
    )]
    CardinalityViolation { name: String, range: Range, found: usize },

    /// Only produced by `check_strict`.
    #[error("undeclared child node: {name}")]
    UndeclaredChild { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NameGate {
    /// Legacy closed-shape gate: distinct-name counts only.
    CountOnly,
    /// Additionally reject names the shape never declared.
    Exact,
}

impl TypeTable {
    /// Check `value` against the descriptor `id`, legacy name gate.
    pub fn check(&self, id: TypeId, value: &Value) -> Result<(), TypeCheckingError> {
        self.check_gate(id, value, NameGate::CountOnly)
    }

    /// Like `check`, but closed shapes also reject undeclared child names.
    pub fn check_strict(&self, id: TypeId, value: &Value) -> Result<(), TypeCheckingError> {
        self.check_gate(id, value, NameGate::Exact)
    }

    fn check_gate(
        &self,
        id: TypeId,
        value: &Value,
        gate: NameGate,
    ) -> Result<(), TypeCheckingError> {
        let ty = self.get(id);

        if !native_accepts(ty.native_type, value) {
            return Err(TypeCheckingError::NativeTypeMismatch {
                expected: ty.native_type,
                found: value.kind(),
            });
        }

        if ty.closed_shape {
            if value.children().len() != ty.sub_types.len() {
                return Err(TypeCheckingError::ChildNameCountMismatch {
                    declared: ty.sub_types.len(),
                    found: value.children().len(),
                });
            }
            if gate == NameGate::Exact {
                for name in value.children().keys() {
                    if !ty.sub_types.contains_key(name) {
                        return Err(TypeCheckingError::UndeclaredChild { name: name.clone() });
                    }
                }
            }
            for (name, &child_id) in &ty.sub_types {
                self.check_sub_type(name, child_id, value, gate)?;
            }
        }

        Ok(())
    }

    fn check_sub_type(
        &self,
        name: &str,
        id: TypeId,
        parent: &Value,
        gate: NameGate,
    ) -> Result<(), TypeCheckingError> {
        let ty = self.get(id);

        if !parent.has_children(name) && ty.cardinality.min > 0 {
            return Err(TypeCheckingError::MissingRequiredChild { name: name.to_string() });
        }

        let instances = parent.get_children(name);
        if !ty.cardinality.contains(instances.len()) {
            return Err(TypeCheckingError::CardinalityViolation {
                name: name.to_string(),
                range: ty.cardinality,
                found: instances.len(),
            });
        }

        for instance in instances {
            self.check_gate(id, instance, gate)?;
        }

        Ok(())
    }
}

fn native_accepts(native: NativeType, value: &Value) -> bool {
    match native {
        NativeType::Any | NativeType::Undefined => true,
        NativeType::Double => value.is_double(),
        NativeType::Int => value.is_int(),
        NativeType::String => value.is_string(),
        NativeType::Void => value.payload().is_none(),
    }
}

// -------------------------------- Tests ----------------------------------- //
