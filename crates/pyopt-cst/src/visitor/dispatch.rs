// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Walk functions driving [`Visitor`] and [`Transformer`] implementations.

use super::traits::{Transform, Transformer, VisitResult, Visitor};
use crate::nodes::{
    Comprehension, Constant, ExceptHandler, ExprKind, Expression, Module, Statement, StatementKind,
};

macro_rules! propagate_stop {
    ($walk:expr) => {
        if $walk == VisitResult::Stop {
            return VisitResult::Stop;
        }
    };
}

/// Walk a module. Returns `Stop` if the visitor halted traversal.
pub fn walk_module<V: Visitor + ?Sized>(visitor: &mut V, module: &Module) -> VisitResult {
    match visitor.visit_module(module) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::Continue => propagate_stop!(walk_block(visitor, &module.body)),
        VisitResult::SkipChildren => {}
    }
    visitor.leave_module(module);
    VisitResult::Continue
}

pub fn walk_block<V: Visitor + ?Sized>(visitor: &mut V, block: &[Statement]) -> VisitResult {
    for stmt in block {
        propagate_stop!(walk_statement(visitor, stmt));
    }
    VisitResult::Continue
}

pub fn walk_statement<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Statement) -> VisitResult {
    match visitor.visit_statement(stmt) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {
            visitor.leave_statement(stmt);
            return VisitResult::Continue;
        }
        VisitResult::Continue => {}
    }

    let hook = match &stmt.kind {
        StatementKind::FunctionDef(node) => visitor.visit_function_def(node),
        StatementKind::ClassDef(node) => visitor.visit_class_def(node),
        StatementKind::For(node) => visitor.visit_for_stmt(node),
        StatementKind::While(node) => visitor.visit_while_stmt(node),
        _ => VisitResult::Continue,
    };
    match hook {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::Continue => propagate_stop!(walk_statement_children(visitor, stmt)),
        VisitResult::SkipChildren => {}
    }

    match &stmt.kind {
        StatementKind::FunctionDef(node) => visitor.leave_function_def(node),
        StatementKind::ClassDef(node) => visitor.leave_class_def(node),
        StatementKind::For(node) => visitor.leave_for_stmt(node),
        StatementKind::While(node) => visitor.leave_while_stmt(node),
        _ => {}
    }
    visitor.leave_statement(stmt);
    VisitResult::Continue
}

fn walk_statement_children<V: Visitor + ?Sized>(visitor: &mut V, stmt: &Statement) -> VisitResult {
    if let StatementKind::Try(node) = &stmt.kind {
        propagate_stop!(walk_block(visitor, &node.body));
        for handler in &node.handlers {
            propagate_stop!(walk_except_handler(visitor, handler));
        }
        propagate_stop!(walk_block(visitor, &node.orelse));
        return walk_block(visitor, &node.finalbody);
    }
    for expr in stmt.expressions() {
        propagate_stop!(walk_expression(visitor, expr));
    }
    for block in stmt.blocks() {
        propagate_stop!(walk_block(visitor, block));
    }
    VisitResult::Continue
}

pub fn walk_except_handler<V: Visitor + ?Sized>(
    visitor: &mut V,
    handler: &ExceptHandler,
) -> VisitResult {
    match visitor.visit_except_handler(handler) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::Continue => {
            if let Some(typ) = &handler.typ {
                propagate_stop!(walk_expression(visitor, typ));
            }
            propagate_stop!(walk_block(visitor, &handler.body));
        }
        VisitResult::SkipChildren => {}
    }
    visitor.leave_except_handler(handler);
    VisitResult::Continue
}

pub fn walk_expression<V: Visitor + ?Sized>(visitor: &mut V, expr: &Expression) -> VisitResult {
    match visitor.visit_expression(expr) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::SkipChildren => {
            visitor.leave_expression(expr);
            return VisitResult::Continue;
        }
        VisitResult::Continue => {}
    }

    match &expr.kind {
        ExprKind::ListComp { elt, generators }
        | ExprKind::SetComp { elt, generators }
        | ExprKind::GeneratorExp { elt, generators } => {
            propagate_stop!(walk_expression(visitor, elt));
            for generator in generators {
                propagate_stop!(walk_comprehension(visitor, generator));
            }
        }
        ExprKind::DictComp {
            key,
            value,
            generators,
        } => {
            propagate_stop!(walk_expression(visitor, key));
            propagate_stop!(walk_expression(visitor, value));
            for generator in generators {
                propagate_stop!(walk_comprehension(visitor, generator));
            }
        }
        _ => {
            for child in expr.children() {
                propagate_stop!(walk_expression(visitor, child));
            }
        }
    }

    visitor.leave_expression(expr);
    VisitResult::Continue
}

pub fn walk_comprehension<V: Visitor + ?Sized>(
    visitor: &mut V,
    comp: &Comprehension,
) -> VisitResult {
    match visitor.visit_comprehension(comp) {
        VisitResult::Stop => return VisitResult::Stop,
        VisitResult::Continue => {
            propagate_stop!(walk_expression(visitor, &comp.target));
            propagate_stop!(walk_expression(visitor, &comp.iter));
            for cond in &comp.ifs {
                propagate_stop!(walk_expression(visitor, cond));
            }
        }
        VisitResult::SkipChildren => {}
    }
    visitor.leave_comprehension(comp);
    VisitResult::Continue
}

// ---------------------------------------------------------------------------
// Transformation
// ---------------------------------------------------------------------------

fn take_expression(slot: &mut Expression) -> Expression {
    let placeholder = Expression::new(ExprKind::Constant(Constant::None), slot.span);
    std::mem::replace(slot, placeholder)
}

/// Transform every statement and expression of `module`, bottom-up.
pub fn transform_module<T: Transformer + ?Sized>(transformer: &mut T, module: Module) -> Module {
    Module {
        body: transform_block(transformer, module.body),
        span: module.span,
    }
}

pub fn transform_block<T: Transformer + ?Sized>(
    transformer: &mut T,
    block: Vec<Statement>,
) -> Vec<Statement> {
    let mut out = Vec::with_capacity(block.len());
    for stmt in block {
        transform_statement(transformer, stmt).extend_into(&mut out);
    }
    out
}

pub fn transform_statement<T: Transformer + ?Sized>(
    transformer: &mut T,
    mut stmt: Statement,
) -> Transform<Statement> {
    for slot in stmt.expressions_mut() {
        let expr = take_expression(slot);
        *slot = transform_expression(transformer, expr);
    }
    for block in stmt.blocks_mut() {
        let body = std::mem::take(block);
        *block = transform_block(transformer, body);
    }
    transformer.transform_statement(stmt)
}

pub fn transform_expression<T: Transformer + ?Sized>(
    transformer: &mut T,
    mut expr: Expression,
) -> Expression {
    for slot in expr.children_mut() {
        let child = take_expression(slot);
        *slot = transform_expression(transformer, child);
    }
    transformer.transform_expression(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{module_to_source, parse_module};

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
        stop_at: Option<&'static str>,
    }

    impl Visitor for Recorder {
        fn visit_statement(&mut self, node: &Statement) -> VisitResult {
            self.events.push(format!("stmt@{}", node.span.start));
            VisitResult::Continue
        }

        fn visit_expression(&mut self, node: &Expression) -> VisitResult {
            if let Some(id) = node.as_name() {
                self.events.push(id.to_string());
                if self.stop_at == Some(id) {
                    return VisitResult::Stop;
                }
            }
            VisitResult::Continue
        }

        fn visit_function_def(&mut self, _node: &crate::nodes::FunctionDef) -> VisitResult {
            VisitResult::SkipChildren
        }

        fn visit_comprehension(&mut self, _node: &Comprehension) -> VisitResult {
            self.events.push("comp".to_string());
            VisitResult::Continue
        }
    }

    mod visitor_tests {
        use super::*;

        #[test]
        fn names_visited_in_source_order() {
            let module = parse_module("a = b + c\nd(e)\n").unwrap();
            let mut rec = Recorder::default();
            assert_eq!(walk_module(&mut rec, &module), VisitResult::Continue);
            assert_eq!(rec.events, vec!["stmt@0", "a", "b", "c", "stmt@10", "d", "e"]);
        }

        #[test]
        fn stop_halts_traversal() {
            let module = parse_module("a = b\nc = d\n").unwrap();
            let mut rec = Recorder {
                stop_at: Some("b"),
                ..Default::default()
            };
            assert_eq!(walk_module(&mut rec, &module), VisitResult::Stop);
            assert_eq!(rec.events, vec!["stmt@0", "a", "b"]);
        }

        #[test]
        fn skipped_function_body_is_not_visited() {
            let module = parse_module("def f(x):\n    y = x\nz = 1\n").unwrap();
            let mut rec = Recorder::default();
            walk_module(&mut rec, &module);
            assert!(!rec.events.contains(&"y".to_string()));
            assert!(rec.events.contains(&"z".to_string()));
        }

        #[test]
        fn comprehension_clauses_follow_element() {
            let module = parse_module("r = [x for x in xs]\n").unwrap();
            let mut rec = Recorder::default();
            walk_module(&mut rec, &module);
            assert_eq!(rec.events, vec!["stmt@0", "r", "x", "comp", "x", "xs"]);
        }
    }

    mod transformer_tests {
        use super::*;

        struct RenameAndDropPass;

        impl Transformer for RenameAndDropPass {
            fn transform_statement(&mut self, node: Statement) -> Transform<Statement> {
                if matches!(node.kind, StatementKind::Pass) {
                    Transform::Remove
                } else {
                    Transform::Keep(node)
                }
            }

            fn transform_expression(&mut self, mut node: Expression) -> Expression {
                if let ExprKind::Name(id) = &mut node.kind {
                    if id == "old" {
                        *id = "new".to_string();
                    }
                }
                node
            }
        }

        #[test]
        fn rewrites_nested_blocks() {
            let module = parse_module("if old:\n    pass\n    x = old + 1\n").unwrap();
            let out = transform_module(&mut RenameAndDropPass, module);
            assert_eq!(module_to_source(&out), "if new:\n    x = new + 1\n");
        }
    }
}
