//! Validation of native Java expressions embedded in templates.
//!
//! Native code is pasted into generated sources, so it must be a single,
//! side-effect free expression: balanced brackets, terminated literals and
//! comments, and none of the assignment, increment or bitwise operators.

use chumsky::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'code> {
    Literal(&'code str),
    UnterminatedLiteral,
    Comment(&'code str),
    UnterminatedComment,
    Operator(&'code str),
    Open(char),
    Close(char),
    Word(&'code str),
    Whitespace,
    Other(char),
}

const FORBIDDEN_OPERATORS: [&str; 21] = [
    "^", "~", "&", "<<", ">>", ">>>", "|", "--", "-=", "/=", "*=", "&=", "%=", "++", "+=", "<<=",
    "=", ">>=", ">>>=", "|=", "^=",
];

const FORBIDDEN_WORDS: [&str; 1] = ["instanceof"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpressionProblem {
    /// Unterminated literal or comment, unbalanced brackets, or no code.
    Illegal,
    Operator(String),
}

fn quoted<'code>(
    quote: char,
) -> impl Parser<'code, &'code str, Token<'code>, extra::Err<Rich<'code, char>>> + Clone {
    let forbidden: &'static str = if quote == '"' { "\\\"\n" } else { "\\'\n" };
    let body = choice((
        just('\\').then(any()).ignored(),
        none_of(forbidden).ignored(),
    ))
    .repeated();
    let terminated = just(quote)
        .then(body.clone())
        .then(just(quote))
        .to_slice()
        .map(Token::Literal);
    let unterminated = just(quote).then(body).to(Token::UnterminatedLiteral);
    choice((terminated, unterminated))
}

pub fn lexer<'code>()
-> impl Parser<'code, &'code str, Vec<Token<'code>>, extra::Err<Rich<'code, char>>> {
    let block_comment = just("/*")
        .then(any().and_is(just("*/").not()).repeated())
        .then(just("*/"))
        .to_slice()
        .map(Token::Comment);

    let unterminated_comment = just("/*")
        .then(any().repeated())
        .to(Token::UnterminatedComment);

    // the generated code follows on the same line
    let line_comment = just("//")
        .then(none_of('\n').repeated())
        .then(just('\n'))
        .to_slice()
        .map(Token::Comment);

    let unterminated_line_comment = just("//")
        .then(any().repeated())
        .to(Token::UnterminatedComment);

    // longest first
    let operator = choice([
        just(">>>="),
        just("<<="),
        just(">>="),
        just(">>>"),
        just("<<"),
        just(">>"),
        just("++"),
        just("--"),
        just("+="),
        just("-="),
        just("*="),
        just("/="),
        just("%="),
        just("&="),
        just("|="),
        just("^="),
        just("&&"),
        just("||"),
        just("=="),
        just("!="),
        just("<="),
        just(">="),
        just("->"),
        just("::"),
        just("="),
        just("<"),
        just(">"),
        just("+"),
        just("-"),
        just("*"),
        just("/"),
        just("%"),
        just("&"),
        just("|"),
        just("^"),
        just("~"),
        just("!"),
        just("?"),
        just(":"),
        just("."),
        just(","),
        just(";"),
        just("@"),
    ])
    .to_slice()
    .map(Token::Operator);

    let open = one_of("([{").map(Token::Open);
    let close = one_of(")]}").map(Token::Close);

    let word = any()
        .filter(|character: &char| {
            character.is_alphanumeric() || *character == '_' || *character == '$'
        })
        .repeated()
        .at_least(1)
        .to_slice()
        .map(Token::Word);

    let whitespace = any()
        .filter(|character: &char| character.is_whitespace())
        .repeated()
        .at_least(1)
        .to(Token::Whitespace);

    let other = any().map(Token::Other);

    choice((
        block_comment,
        unterminated_comment,
        line_comment,
        unterminated_line_comment,
        quoted('"'),
        quoted('\''),
        operator,
        open,
        close,
        word,
        whitespace,
        other,
    ))
    .repeated()
    .collect()
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn next_significant<'a, 'code>(tokens: &'a [Token<'code>]) -> Option<&'a Token<'code>> {
    tokens
        .iter()
        .find(|token| !matches!(token, Token::Whitespace | Token::Comment(_)))
}

/// Checks `code` is an acceptable native expression.
pub fn check_expression(code: &str) -> Result<(), ExpressionProblem> {
    let tokens = lexer()
        .parse(code)
        .into_result()
        .map_err(|_| ExpressionProblem::Illegal)?;
    if next_significant(&tokens).is_none() {
        return Err(ExpressionProblem::Illegal);
    }
    let mut brackets = Vec::new();
    for (index, token) in tokens.iter().enumerate() {
        match token {
            Token::UnterminatedLiteral | Token::UnterminatedComment => {
                return Err(ExpressionProblem::Illegal);
            }
            Token::Open(open) => brackets.push(closing(*open)),
            Token::Close(close) => {
                if brackets.pop() != Some(*close) {
                    return Err(ExpressionProblem::Illegal);
                }
            }
            Token::Operator(operator) if FORBIDDEN_OPERATORS.contains(operator) => {
                // closes nested type arguments, e.g. `(Map<List<List<A>>, B>) x`
                let closes_generics = matches!(*operator, ">>" | ">>>")
                    && matches!(
                        next_significant(&tokens[index + 1..]),
                        Some(Token::Close(')') | Token::Operator("," | ">"))
                    );
                if !closes_generics {
                    return Err(ExpressionProblem::Operator(operator.to_string()));
                }
            }
            Token::Word(word) if FORBIDDEN_WORDS.contains(word) => {
                return Err(ExpressionProblem::Operator(word.to_string()));
            }
            _ => {}
        }
    }
    if !brackets.is_empty() {
        return Err(ExpressionProblem::Illegal);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_ordinary_expressions() {
        for code in [
            "user.getName()",
            "a && (b || !c)",
            "items.size() > 0 ? \"many\" : \"none\"",
            "x == 'q'",
            "map.get(\"a\\\"b\")[0]",
            "(java.util.List<java.util.List<String>>) raw",
            "value /* why */ + 1",
            "value // why\n + 1",
            "(java.util.Map<java.util.List<java.util.List<A>>, B>) raw",
            "(Map<String, List<List<A>>>) raw",
            "list.stream().map(x -> x + 1)",
        ] {
            assert_eq!(check_expression(code), Ok(()), "{code}");
        }
    }

    #[test]
    fn test_rejects_forbidden_operators() {
        for (code, operator) in [
            ("x = 1", "="),
            ("i++", "++"),
            ("a += b", "+="),
            ("a & b", "&"),
            ("a >> 2", ">>"),
            ("a >>> b", ">>>"),
            ("~a", "~"),
            ("o instanceof String", "instanceof"),
        ] {
            assert_eq!(
                check_expression(code),
                Err(ExpressionProblem::Operator(operator.to_string())),
                "{code}"
            );
        }
    }

    #[test]
    fn test_rejects_malformed_code() {
        for code in [
            "\"open",
            "'x",
            "a /* never closed",
            "f(a",
            "a)",
            "(a]",
            "",
            "  // only",
            "user.name // trailing note",
        ] {
            assert_eq!(check_expression(code), Err(ExpressionProblem::Illegal), "{code:?}");
        }
    }

    #[test]
    fn test_lexer_tokens() {
        let tokens = lexer().parse("a<=\"s\"").into_result().unwrap();
        assert_eq!(
            tokens,
            [Token::Word("a"), Token::Operator("<="), Token::Literal("\"s\"")]
        );
    }
}
