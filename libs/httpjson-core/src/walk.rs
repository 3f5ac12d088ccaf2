//! Diffing a parsed value against a shape.

use std::convert::Infallible;
use std::ops::ControlFlow;

use crate::diagnostic::UnknownField;
use crate::shape::{Shape, ShapeKind};
use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Cause {
    /// Key not claimed by any visible field of a struct shape.
    UnknownKey,
    /// Value structure does not match the container kind of the shape.
    Mismatch,
}

struct Finding<'s, 'v> {
    cause: Cause,
    structure: &'s str,
    path: String,
    value: &'v Value,
}

type Sink<'f, B> = dyn FnMut(Finding<'_, '_>) -> ControlFlow<B> + 'f;

/// Lists every key of `value` that `shape` does not declare, depth first in
/// document order.
///
/// `prefix` is prepended to every reported path; pass `""` at the root.
/// Subtrees under an unknown key are not inspected. Null values and scalar
/// shapes produce nothing, and keys of open maps are never reported. A
/// struct or map shape facing a non-object value (or a sequence shape facing
/// a non-array value) yields a single finding for the value itself.
#[must_use]
pub fn find_unknown_fields(shape: &Shape, value: &Value, prefix: &str) -> Vec<UnknownField> {
    let mut found = Vec::new();
    let ControlFlow::Continue(()) = walk::<Infallible>(
        shape,
        value,
        prefix.to_owned(),
        &mut |finding| {
            found.push(UnknownField::new(
                finding.structure,
                finding.path,
                finding.value,
            ));
            ControlFlow::Continue(())
        },
    );
    found
}

/// Path of the first key in document order that `shape` does not declare.
///
/// Structural mismatches are left to the typed deserializer.
pub fn first_unknown_key(shape: &Shape, value: &Value) -> Option<String> {
    walk(shape, value, String::new(), &mut |finding| match finding.cause {
        Cause::UnknownKey => ControlFlow::Break(finding.path),
        Cause::Mismatch => ControlFlow::Continue(()),
    })
    .break_value()
}

fn walk<B>(shape: &Shape, value: &Value, path: String, sink: &mut Sink<'_, B>) -> ControlFlow<B> {
    if value.is_null() {
        return ControlFlow::Continue(());
    }
    match shape.kind() {
        ShapeKind::Wrapped { inner } => walk(&inner(), value, path, sink),
        ShapeKind::Struct(fields) => {
            let Value::Object(entries) = value else {
                return sink(mismatch(shape, value, path));
            };
            for (key, entry) in entries {
                let child = join_key(&path, key);
                match fields.resolve(key) {
                    Some(nested) => walk(&nested(), entry, child, sink)?,
                    None => sink(Finding {
                        cause: Cause::UnknownKey,
                        structure: shape.label(),
                        path: child,
                        value: entry,
                    })?,
                }
            }
            ControlFlow::Continue(())
        }
        ShapeKind::Map { values } => {
            let Value::Object(entries) = value else {
                return sink(mismatch(shape, value, path));
            };
            let values = values();
            for (key, entry) in entries {
                walk(&values, entry, join_key(&path, key), sink)?;
            }
            ControlFlow::Continue(())
        }
        ShapeKind::Sequence { element } => {
            let Value::Array(items) = value else {
                return sink(mismatch(shape, value, path));
            };
            let element = element();
            for (index, item) in items.iter().enumerate() {
                walk(&element, item, format!("{path}[{index}]"), sink)?;
            }
            ControlFlow::Continue(())
        }
        ShapeKind::Tuple { elements } => {
            let Value::Array(items) = value else {
                return sink(mismatch(shape, value, path));
            };
            for (index, (element, item)) in elements.iter().zip(items).enumerate() {
                walk(&element(), item, format!("{path}[{index}]"), sink)?;
            }
            ControlFlow::Continue(())
        }
        ShapeKind::Scalar => ControlFlow::Continue(()),
    }
}

fn mismatch<'s, 'v>(shape: &'s Shape, value: &'v Value, path: String) -> Finding<'s, 'v> {
    Finding {
        cause: Cause::Mismatch,
        structure: shape.label(),
        path,
        value,
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
