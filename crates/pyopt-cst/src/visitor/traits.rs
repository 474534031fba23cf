// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Visitor and transformer trait definitions for syntax tree traversal.

use crate::nodes::{
    ClassDef, Comprehension, ExceptHandler, Expression, For, FunctionDef, Module, Statement,
    While,
};

/// Result of visiting a node; controls traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VisitResult {
    /// Descend into children, then call `leave_*`.
    #[default]
    Continue,
    /// Skip children; `leave_*` is still called.
    SkipChildren,
    /// Halt traversal. No further `visit_*` or `leave_*` calls are made.
    Stop,
}

/// Transform result for list contexts such as statement blocks.
#[derive(Debug, Clone)]
pub enum Transform<T> {
    Keep(T),
    Remove,
    /// Replace the node with zero or more nodes.
    Flatten(Vec<T>),
}

impl<T> Transform<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Self::Keep(_))
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, Self::Remove)
    }

    pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> Transform<U> {
        match self {
            Transform::Keep(t) => Transform::Keep(f(t)),
            Transform::Remove => Transform::Remove,
            Transform::Flatten(v) => Transform::Flatten(v.into_iter().map(f).collect()),
        }
    }

    /// Append the result to `out`.
    pub fn extend_into(self, out: &mut Vec<T>) {
        match self {
            Transform::Keep(t) => out.push(t),
            Transform::Remove => {}
            Transform::Flatten(v) => out.extend(v),
        }
    }
}

impl<T> From<T> for Transform<T> {
    fn from(value: T) -> Self {
        Transform::Keep(value)
    }
}

/// Generates `visit_*`/`leave_*` pairs with no-op defaults.
macro_rules! visitor_methods {
    (
        $(
            $base_name:ident : $node_type:ty
        ),* $(,)?
    ) => {
        paste::paste! {
            $(
                #[doc = concat!("Visit a [`", stringify!($node_type), "`] before its children.")]
                #[allow(unused_variables)]
                fn [<visit_ $base_name>](&mut self, node: &$node_type) -> VisitResult {
                    VisitResult::Continue
                }

                #[doc = concat!("Leave a [`", stringify!($node_type), "`] after its children.")]
                #[allow(unused_variables)]
                fn [<leave_ $base_name>](&mut self, node: &$node_type) {}
            )*
        }
    };
}

/// Read-only traversal.
///
/// `visit_*` is called pre-order and `leave_*` post-order. Children are
/// visited in source order. Kind-specific hooks (`visit_for_stmt`, ...) are
/// called after the generic `visit_statement` for the same node and only
/// when it returned `Continue`.
pub trait Visitor {
    visitor_methods! {
        module: Module,
        statement: Statement,
        expression: Expression,
    }

    visitor_methods! {
        function_def: FunctionDef,
        class_def: ClassDef,
        for_stmt: For,
        while_stmt: While,
        except_handler: ExceptHandler,
        comprehension: Comprehension,
    }
}

/// Owned, bottom-up rewriting.
///
/// Children are transformed before their parent. Statement blocks are list
/// contexts: a statement may be kept, removed, or replaced by several.
pub trait Transformer {
    #[allow(unused_variables)]
    fn transform_statement(&mut self, node: Statement) -> Transform<Statement> {
        Transform::Keep(node)
    }

    fn transform_expression(&mut self, node: Expression) -> Expression {
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_result_defaults_to_continue() {
        assert_eq!(VisitResult::default(), VisitResult::Continue);
    }

    #[test]
    fn transform_map_and_extend() {
        let mut out = vec![];
        Transform::Keep(1).map(|x| x * 2).extend_into(&mut out);
        Transform::<i32>::Remove.extend_into(&mut out);
        Transform::Flatten(vec![3, 4]).map(|x| x + 1).extend_into(&mut out);
        assert_eq!(out, vec![2, 4, 5]);
    }

    #[test]
    fn transform_from_value_keeps() {
        let t: Transform<&str> = "x".into();
        assert!(t.is_keep());
        assert!(!t.is_remove());
    }
}
