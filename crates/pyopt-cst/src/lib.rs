// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! Parser and syntax tree for the Python subset analyzed by pyopt.
//!
//! - **Parsing**: [`parse_module`], [`parse_statements`], [`parse_expression`].
//! - **Serialization**: the [`Codegen`] trait and [`module_to_source`] print a
//!   tree back to canonical source text.
//! - **Traversal**: see [`visitor`].
//!
//! ```
//! use pyopt_cst::{module_to_source, parse_module};
//!
//! let module = parse_module("result = [x*x for x in range(10)]\n").expect("parse error");
//! assert_eq!(module_to_source(&module), "result = [x * x for x in range(10)]\n");
//! ```

pub mod nodes;
pub use nodes::*;

pub mod tokenizer;
pub use tokenizer::{tokenize, TokError, TokErrorKind, TokType, Token};

mod parser;
pub use parser::ParseError;

pub mod visitor;
pub use visitor::{Transform, Transformer, VisitResult, Visitor};

/// Parse a complete source file.
///
/// A leading byte-order mark is ignored. Spans index into `source` as given.
///
/// # Errors
///
/// Returns a [`ParseError`] for tokenizer failures (unterminated strings,
/// unbalanced brackets, inconsistent dedents) and grammar failures.
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tokens = tokenize(source)?;
    parser::parse_tokens(&tokens)
}

/// Parse a statement sequence, such as a replacement snippet.
pub fn parse_statements(text: &str) -> Result<Vec<Statement>, ParseError> {
    parse_module(text).map(|m| m.body)
}

/// Parse a single expression (a bare tuple is allowed).
///
/// ```
/// use pyopt_cst::{expression_to_source, parse_expression};
///
/// let expr = parse_expression("a+b*c").expect("parse error");
/// assert_eq!(expression_to_source(&expr), "a + b * c");
/// ```
pub fn parse_expression(text: &str) -> Result<Expression, ParseError> {
    let tokens = tokenize(text)?;
    parser::parse_expression_tokens(&tokens)
}

/// Byte offset of the beginning of 1-indexed line `n`.
fn bol_offset(source: &str, n: u32) -> usize {
    if n <= 1 {
        return 0;
    }
    source
        .match_indices('\n')
        .nth((n - 2) as usize)
        .map(|(index, _)| index + 1)
        .unwrap_or(source.len())
}

/// Render a parse error with the surrounding source lines.
///
/// ```
/// use pyopt_cst::{parse_module, prettify_error};
///
/// let source = "for x in range(10:\n    pass\n";
/// let err = parse_module(source).unwrap_err();
/// let text = prettify_error(&err, source, "example.py");
/// assert!(text.contains("example.py"));
/// ```
pub fn prettify_error(err: &ParseError, source: &str, label: &str) -> String {
    use annotate_snippets::{Level, Renderer, Snippet};

    let context = 1;
    let line_start = err.line.saturating_sub(context).max(1);
    let start_offset = bol_offset(source, line_start);
    let end_offset = bol_offset(source, err.line + context + 1).max(start_offset);
    let snippet = &source[start_offset..end_offset];
    let start = err.offset.clamp(start_offset, end_offset) - start_offset;
    let end = snippet[start..]
        .chars()
        .next()
        .map_or(start + 1, |c| start + c.len_utf8());
    let message = err.to_string();

    let rendered = Renderer::plain()
        .render(
            Level::Error.title(label).snippet(
                Snippet::source(snippet)
                    .line_start(line_start as usize)
                    .fold(false)
                    .annotations(vec![Level::Error.span(start..end).label(&message)]),
            ),
        )
        .to_string();
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;

    mod parse_tests {
        use super::*;

        #[test]
        fn empty_source_is_an_empty_module() {
            let module = parse_module("").unwrap();
            assert!(module.body.is_empty());
            let module = parse_module("# only a comment\n\n").unwrap();
            assert!(module.body.is_empty());
        }

        #[test]
        fn byte_order_mark_is_skipped() {
            let source = "\u{feff}x = 1\n";
            let module = parse_module(source).unwrap();
            assert_eq!(module.body[0].span.start, 3);
            assert_eq!(&source[module.body[0].span.start..module.body[0].span.end], "x = 1");
        }

        #[test]
        fn statement_spans_exclude_trailing_newline() {
            let source = "for x in xs:\n    total += x\nprint(total)\n";
            let module = parse_module(source).unwrap();
            let spans: Vec<&str> = module
                .body
                .iter()
                .map(|s| &source[s.span.start..s.span.end])
                .collect();
            assert_eq!(spans, vec!["for x in xs:\n    total += x", "print(total)"]);
        }

        #[test]
        fn parse_statements_returns_every_statement() {
            let stmts = parse_statements("a = 1; b = 2\nc = 3\n").unwrap();
            assert_eq!(stmts.len(), 3);
        }

        #[test]
        fn unclosed_bracket_reports_open_position() {
            let err = parse_module("for x in range(10:\n    pass\n").unwrap_err();
            assert_eq!((err.line, err.column), (1, 15));
        }

        #[test]
        fn grammar_error_reports_token_position() {
            let err = parse_module("x = = 1\n").unwrap_err();
            assert_eq!((err.line, err.column), (1, 5));
            assert!(err.message.contains("unexpected '='"));
        }

        #[test]
        fn invalid_targets_are_rejected() {
            assert!(parse_module("f() = 1\n").is_err());
            assert!(parse_module("a + b += 1\n").is_err());
            assert!(parse_module("*a = b\n").is_err());
            assert!(parse_module("*a, b = c\n").is_ok());
        }

        #[test]
        fn invalid_parameter_lists_are_rejected() {
            assert!(parse_module("def f(a=1, b): pass\n").is_err());
            assert!(parse_module("def f(*): pass\n").is_err());
            assert!(parse_module("def f(**kw, a): pass\n").is_err());
            assert!(parse_module("def f(a, /, b=2, *args, c, **kw): pass\n").is_ok());
        }

        #[test]
        fn try_requires_handler_or_finally() {
            assert!(parse_module("try:\n    x\n").is_err());
            assert!(parse_module("try:\n    x\nfinally:\n    y\n").is_ok());
        }

        #[test]
        fn positional_after_keyword_is_rejected() {
            assert!(parse_module("f(a=1, b)\n").is_err());
        }
    }

    mod expression_tests {
        use super::*;

        #[test]
        fn chained_comparison_is_one_node() {
            let expr = parse_expression("a < b <= c").unwrap();
            match expr.kind {
                ExprKind::Compare { comparisons, .. } => assert_eq!(comparisons.len(), 2),
                other => panic!("expected comparison, got {:?}", other),
            }
        }

        #[test]
        fn not_in_is_a_single_operator() {
            let expr = parse_expression("x not in ys").unwrap();
            match expr.kind {
                ExprKind::Compare { comparisons, .. } => assert_eq!(comparisons[0].0, CompOp::NotIn),
                other => panic!("expected comparison, got {:?}", other),
            }
        }

        #[test]
        fn parenthesized_span_includes_parens() {
            let expr = parse_expression("(a + b)").unwrap();
            assert_eq!(expr.span, Span::new(0, 7));
        }

        #[test]
        fn call_with_generator_argument() {
            let expr = parse_expression("sum(x for x in xs)").unwrap();
            match expr.kind {
                ExprKind::Call { args, .. } => {
                    assert!(matches!(args[0].value().kind, ExprKind::GeneratorExp { .. }));
                }
                other => panic!("expected call, got {:?}", other),
            }
        }

        #[test]
        fn bare_tuple_expression() {
            let expr = parse_expression("1, 2").unwrap();
            assert!(matches!(expr.kind, ExprKind::Tuple(ref items) if items.len() == 2));
        }
    }

    mod prettify_tests {
        use super::*;

        #[test]
        fn bol_offsets() {
            assert_eq!(bol_offset("hello", 1), 0);
            assert_eq!(bol_offset("hello\nhello", 2), 6);
            assert_eq!(bol_offset("hello\nhello", 3), 11);
        }

        #[test]
        fn prettified_error_shows_source_line() {
            let source = "x = 1\ny = = 2\nz = 3\n";
            let err = parse_module(source).unwrap_err();
            let text = prettify_error(&err, source, "input.py");
            assert!(text.contains("input.py"));
            assert!(text.contains("y = = 2"));
        }

        #[test]
        fn prettified_error_at_end_of_file() {
            let source = "x = (";
            let err = parse_module(source).unwrap_err();
            let text = prettify_error(&err, source, "eof.py");
            assert!(text.contains("eof.py"));
        }
    }
}
