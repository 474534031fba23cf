// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::tokenizer::core::{tokenize, TokError, TokErrorKind, TokType};

fn tokenize_with_end_marker(text: &str) -> Result<Vec<(TokType, &str)>, TokError> {
    Ok(tokenize(text)?
        .into_iter()
        .map(|tok| (tok.kind, tok.text))
        .collect())
}

fn tokenize_all(text: &str) -> Result<Vec<(TokType, &str)>, TokError> {
    let mut result = tokenize_with_end_marker(text)?;
    // Remove the EndMarker, since it's on every non-error token stream.
    assert_eq!(result.pop().expect("EndMarker").0, TokType::EndMarker);
    // Also remove fake newline at the end
    if let Some((TokType::Newline, "")) = result.last() {
        result.pop();
    }
    Ok(result)
}

fn error_kind(text: &str) -> TokErrorKind {
    tokenize(text).expect_err("expected a tokenizer error").kind
}

#[test]
fn test_identifier() {
    assert_eq!(
        tokenize_all("test input"),
        Ok(vec![(TokType::Name, "test"), (TokType::Name, "input")])
    );
    assert_eq!(
        tokenize_all("{ends_with_op}"),
        Ok(vec![
            (TokType::Op, "{"),
            (TokType::Name, "ends_with_op"),
            (TokType::Op, "}")
        ])
    );
    assert_eq!(
        tokenize_all("\u{0100}\u{0101}\u{0102}unicode"),
        Ok(vec![(TokType::Name, "\u{0100}\u{0101}\u{0102}unicode")])
    );
}

#[test]
fn test_operators_longest_match() {
    assert_eq!(
        tokenize_all("a **= b // c ... -> :="),
        Ok(vec![
            (TokType::Name, "a"),
            (TokType::Op, "**="),
            (TokType::Name, "b"),
            (TokType::Op, "//"),
            (TokType::Name, "c"),
            (TokType::Op, "..."),
            (TokType::Op, "->"),
            (TokType::Op, ":="),
        ])
    );
    assert_eq!(
        tokenize_all("x<=y!=z"),
        Ok(vec![
            (TokType::Name, "x"),
            (TokType::Op, "<="),
            (TokType::Name, "y"),
            (TokType::Op, "!="),
            (TokType::Name, "z"),
        ])
    );
}

#[test]
fn test_numbers() {
    for literal in [
        "0", "42", "1_000", "0x_FF", "0o17", "0b1010", "3.14", "1.", ".5", "1e10", "1.5E-3",
        "2j", "1.5J",
    ] {
        assert_eq!(
            tokenize_all(literal),
            Ok(vec![(TokType::Number, literal)]),
            "literal {}",
            literal
        );
    }
    assert_eq!(error_kind("0x"), TokErrorKind::InvalidNumber);
}

#[test]
fn test_strings_with_prefixes() {
    for literal in [
        r#""hello""#,
        "'it'",
        r#"r"\d+""#,
        r#"Rb'\x00'"#,
        r#"f"{x!r}""#,
        r#""escaped \" quote""#,
        r#"r"raw \" quote""#,
    ] {
        assert_eq!(
            tokenize_all(literal),
            Ok(vec![(TokType::String, literal)]),
            "literal {}",
            literal
        );
    }
    assert_eq!(
        tokenize_all(r#"rb"x""#),
        Ok(vec![(TokType::String, r#"rb"x""#)])
    );
    // "ur" is not a prefix: a name followed by a string
    assert_eq!(
        tokenize_all(r#"ur"x""#),
        Ok(vec![(TokType::Name, "ur"), (TokType::String, r#""x""#)])
    );
}

#[test]
fn test_triple_quoted_string_spans_lines() {
    let text = "x = \"\"\"a\nb \"quoted\" c\n\"\"\"\n";
    assert_eq!(
        tokenize_all(text),
        Ok(vec![
            (TokType::Name, "x"),
            (TokType::Op, "="),
            (TokType::String, "\"\"\"a\nb \"quoted\" c\n\"\"\""),
            (TokType::Newline, "\n"),
        ])
    );
}

#[test]
fn test_unterminated_strings() {
    assert_eq!(error_kind("'abc\n"), TokErrorKind::UnterminatedString);
    assert_eq!(error_kind("\"abc"), TokErrorKind::UnterminatedString);
    assert_eq!(
        error_kind("'''abc\n\n"),
        TokErrorKind::UnterminatedTripleQuotedString
    );
}

#[test]
fn test_indent_dedent() {
    let text = "if x:\n    y\nz\n";
    assert_eq!(
        tokenize_all(text),
        Ok(vec![
            (TokType::Name, "if"),
            (TokType::Name, "x"),
            (TokType::Op, ":"),
            (TokType::Newline, "\n"),
            (TokType::Indent, ""),
            (TokType::Name, "y"),
            (TokType::Newline, "\n"),
            (TokType::Dedent, ""),
            (TokType::Name, "z"),
            (TokType::Newline, "\n"),
        ])
    );
}

#[test]
fn test_dedent_at_eof_without_trailing_newline() {
    let tokens = tokenize_with_end_marker("for a in b:\n    c").unwrap();
    let kinds: Vec<TokType> = tokens.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokType::Name,
            TokType::Name,
            TokType::Name,
            TokType::Name,
            TokType::Op,
            TokType::Newline,
            TokType::Indent,
            TokType::Name,
            TokType::Newline,
            TokType::Dedent,
            TokType::EndMarker,
        ]
    );
}

#[test]
fn test_blank_and_comment_lines_are_ignored() {
    let text = "def f():\n\n    # comment\n        \n    return 1  # trailing\n";
    let tokens = tokenize_all(text).unwrap();
    assert_eq!(
        tokens
            .iter()
            .filter(|(kind, _)| *kind == TokType::Indent)
            .count(),
        1
    );
    assert!(!tokens.iter().any(|(_, text)| text.contains("comment")));
}

#[test]
fn test_tabs_indent_to_multiples_of_eight() {
    // One tab and eight spaces are the same indentation level.
    let text = "if x:\n\ty\n        z\n";
    let tokens = tokenize_all(text).unwrap();
    assert_eq!(
        tokens
            .iter()
            .filter(|(kind, _)| *kind == TokType::Indent)
            .count(),
        1
    );
}

#[test]
fn test_inconsistent_dedent() {
    assert_eq!(
        error_kind("if x:\n    y\n  z\n"),
        TokErrorKind::InconsistentDedent
    );
}

#[test]
fn test_implicit_line_joining_in_brackets() {
    let text = "x = [\n    1,\n    2,\n]\n";
    let tokens = tokenize_all(text).unwrap();
    assert_eq!(
        tokens
            .iter()
            .filter(|(kind, _)| *kind == TokType::Newline)
            .count(),
        1
    );
    assert!(!tokens.iter().any(|(kind, _)| *kind == TokType::Indent));
}

#[test]
fn test_backslash_continuation() {
    assert_eq!(
        tokenize_all("x = 1 + \\\n    2\n"),
        Ok(vec![
            (TokType::Name, "x"),
            (TokType::Op, "="),
            (TokType::Number, "1"),
            (TokType::Op, "+"),
            (TokType::Number, "2"),
            (TokType::Newline, "\n"),
        ])
    );
    assert_eq!(error_kind("x = \\"), TokErrorKind::EofAfterContinuation);
    assert_eq!(
        error_kind("x = \\ y"),
        TokErrorKind::UnexpectedCharacter('\\')
    );
}

#[test]
fn test_bracket_errors() {
    assert_eq!(error_kind("f(x]"), TokErrorKind::MismatchedBracket {
        open: '(',
        close: ']'
    });
    assert_eq!(error_kind("x)"), TokErrorKind::UnmatchedBracket(')'));
    assert_eq!(error_kind("f(x\n"), TokErrorKind::UnclosedBracket('('));
}

#[test]
fn test_unclosed_bracket_reports_opening_position() {
    let err = tokenize("for x in range(10:\n    pass\n").unwrap_err();
    assert_eq!(err.kind, TokErrorKind::UnclosedBracket('('));
    assert_eq!((err.line, err.column), (1, 15));
}

#[test]
fn test_unexpected_character() {
    assert_eq!(error_kind("a $ b"), TokErrorKind::UnexpectedCharacter('$'));
    assert_eq!(error_kind("a ? b"), TokErrorKind::UnexpectedCharacter('?'));
}

#[test]
fn test_token_positions() {
    let tokens = tokenize("x = 1\nyé = 'z'\n").unwrap();
    let z = tokens
        .iter()
        .find(|tok| tok.kind == TokType::String)
        .unwrap();
    assert_eq!((z.line, z.col), (2, 6));
    assert_eq!(z.span.start, 12);
}

#[test]
fn test_empty_input() {
    assert_eq!(
        tokenize_with_end_marker(""),
        Ok(vec![(TokType::EndMarker, "")])
    );
    assert_eq!(
        tokenize_with_end_marker("# only a comment\n"),
        Ok(vec![(TokType::EndMarker, "")])
    );
}
