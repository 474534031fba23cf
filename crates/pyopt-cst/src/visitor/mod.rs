// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Visitor and transformer infrastructure for syntax tree traversal.
//!
//! - [`Visitor`]: read-only, depth-first. `visit_*` runs pre-order and
//!   `leave_*` post-order.
//! - [`Transformer`]: owned, bottom-up rewriting. Statements in blocks may be
//!   kept, removed, or flattened into several statements.
//!
//! ```
//! use pyopt_cst::visitor::{walk_module, VisitResult, Visitor};
//! use pyopt_cst::{parse_module, Expression};
//!
//! struct NameCounter(usize);
//!
//! impl Visitor for NameCounter {
//!     fn visit_expression(&mut self, node: &Expression) -> VisitResult {
//!         if node.as_name().is_some() {
//!             self.0 += 1;
//!         }
//!         VisitResult::Continue
//!     }
//! }
//!
//! let module = parse_module("x = y + z\n").unwrap();
//! let mut counter = NameCounter(0);
//! walk_module(&mut counter, &module);
//! assert_eq!(counter.0, 3);
//! ```

mod dispatch;
mod traits;

pub use dispatch::{
    transform_block, transform_expression, transform_module, transform_statement, walk_block,
    walk_comprehension, walk_except_handler, walk_expression, walk_module, walk_statement,
};
pub use traits::{Transform, Transformer, VisitResult, Visitor};
