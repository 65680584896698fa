//! Parser for the SQL-like search predicate subset.
//!
//! Boolean combinations (`AND`, `OR`, `NOT`, parentheses) of atoms
//! `fieldPath <op> literal` with operators
//! `=  !=  <>  <  <=  >  >=  LIKE  IN (...)  IS [NOT] NULL`.
//! The result is an expression tree over [`SearchFilter`] atoms which the
//! search planner evaluates exactly like structured filters.

use serde_json::Value;

use crate::filter::{SearchCondition, SearchFilter};

/// Parsed predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Atom(SearchFilter),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

/// Parse failure with a human-readable reason.
#[derive(Debug, thiserror::Error)]
#[error("invalid expression: {0}")]
pub struct ExprError(String);

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Num(String),
    Sym(&'static str),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' | ',' => {
                chars.next();
                tokens.push(Token::Sym(match c {
                    '(' => "(",
                    ')' => ")",
                    _ => ",",
                }));
            }
            '=' => {
                chars.next();
                tokens.push(Token::Sym("="));
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Sym("!="));
                } else {
                    return Err(ExprError("expected '=' after '!'".into()));
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Sym("<="));
                } else if chars.next_if_eq(&'>').is_some() {
                    tokens.push(Token::Sym("!="));
                } else {
                    tokens.push(Token::Sym("<"));
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Sym(">="));
                } else {
                    tokens.push(Token::Sym(">"));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => {
                            // SQL-style doubled quote inside the literal.
                            if chars.next_if_eq(&quote).is_some() {
                                s.push(quote);
                            } else {
                                break;
                            }
                        }
                        Some(ch) => s.push(ch),
                        None => return Err(ExprError("unterminated string literal".into())),
                    }
                }
                tokens.push(Token::Str(s));
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut s = String::new();
                s.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Num(s));
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut s = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' || d == '.' {
                        s.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(s));
            }
            other => {
                return Err(ExprError(format!("unexpected character {other:?}")));
            }
        }
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parses the SQL-like predicate subset into an [`Expr`] tree.
pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    if input.trim().is_empty() {
        return Err(ExprError("expression is empty".into()));
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError(format!(
            "unexpected trailing input at token {}",
            parser.pos
        )));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    /// Consumes the next token if it is the given case-insensitive keyword.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if let Some(Token::Ident(s)) = self.peek() {
            if s.eq_ignore_ascii_case(keyword) {
                self.pos += 1;
                return true;
            }
        }
        false
    }

    fn expect_sym(&mut self, sym: &str) -> Result<(), ExprError> {
        match self.next() {
            Some(Token::Sym(s)) if s == sym => Ok(()),
            other => Err(ExprError(format!("expected {sym:?}, found {other:?}"))),
        }
    }

    fn or_expr(&mut self) -> Result<Expr, ExprError> {
        let mut terms = vec![self.and_expr()?];
        while self.eat_keyword("OR") {
            terms.push(self.and_expr()?);
        }
        Ok(if terms.len() == 1 {
            terms.swap_remove(0)
        } else {
            Expr::Or(terms)
        })
    }

    fn and_expr(&mut self) -> Result<Expr, ExprError> {
        let mut terms = vec![self.unary()?];
        while self.eat_keyword("AND") {
            terms.push(self.unary()?);
        }
        Ok(if terms.len() == 1 {
            terms.swap_remove(0)
        } else {
            Expr::And(terms)
        })
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_keyword("NOT") {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        if matches!(self.peek(), Some(Token::Sym("("))) {
            self.pos += 1;
            let inner = self.or_expr()?;
            self.expect_sym(")")?;
            return Ok(inner);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        let field = match self.next() {
            Some(Token::Ident(s)) => s,
            other => return Err(ExprError(format!("expected field path, found {other:?}"))),
        };

        // IS [NOT] NULL
        if self.eat_keyword("IS") {
            let negated = self.eat_keyword("NOT");
            if !self.eat_keyword("NULL") {
                return Err(ExprError("expected NULL after IS".into()));
            }
            let condition = if negated {
                SearchCondition::IsNotNull
            } else {
                SearchCondition::IsNull
            };
            return Ok(Expr::Atom(SearchFilter::new(field, condition, Value::Null)));
        }

        // [NOT] IN (...)
        let negated_in = self.eat_keyword("NOT");
        if self.eat_keyword("IN") {
            self.expect_sym("(")?;
            let mut items = Vec::new();
            loop {
                items.push(self.literal()?);
                match self.next() {
                    Some(Token::Sym(",")) => continue,
                    Some(Token::Sym(")")) => break,
                    other => {
                        return Err(ExprError(format!("expected ',' or ')', found {other:?}")));
                    }
                }
            }
            let condition = if negated_in {
                SearchCondition::NotIn
            } else {
                SearchCondition::In
            };
            return Ok(Expr::Atom(SearchFilter::new(
                field,
                condition,
                Value::Array(items),
            )));
        }
        if negated_in {
            return Err(ExprError("expected IN after NOT".into()));
        }

        // LIKE 'pattern'
        if self.eat_keyword("LIKE") {
            let pattern = match self.next() {
                Some(Token::Str(s)) => s,
                other => {
                    return Err(ExprError(format!(
                        "expected string after LIKE, found {other:?}"
                    )));
                }
            };
            let (condition, needle) = like_to_condition(&pattern)?;
            return Ok(Expr::Atom(SearchFilter::new(
                field,
                condition,
                Value::String(needle),
            )));
        }

        // fieldPath <op> literal
        let condition = match self.next() {
            Some(Token::Sym("=")) => SearchCondition::Equals,
            Some(Token::Sym("!=")) => SearchCondition::NotEquals,
            Some(Token::Sym("<")) => SearchCondition::LessThan,
            Some(Token::Sym("<=")) => SearchCondition::LessThanOrEqual,
            Some(Token::Sym(">")) => SearchCondition::GreaterThan,
            Some(Token::Sym(">=")) => SearchCondition::GreaterThanOrEqual,
            other => return Err(ExprError(format!("expected operator, found {other:?}"))),
        };
        let value = self.literal()?;
        Ok(Expr::Atom(SearchFilter::new(field, condition, value)))
    }

    fn literal(&mut self) -> Result<Value, ExprError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Num(s)) => {
                if let Ok(i) = s.parse::<i64>() {
                    Ok(Value::from(i))
                } else {
                    s.parse::<f64>()
                        .map(Value::from)
                        .map_err(|_| ExprError(format!("invalid number literal {s:?}")))
                }
            }
            other => Err(ExprError(format!("expected literal, found {other:?}"))),
        }
    }
}

/// Maps a LIKE pattern to a planner condition by `%` placement.
/// Interior wildcards are not supported.
fn like_to_condition(pattern: &str) -> Result<(SearchCondition, String), ExprError> {
    if pattern.contains('_') {
        return Err(ExprError(
            "LIKE '_' wildcard is not supported".into(),
        ));
    }
    let starts = pattern.starts_with('%');
    let ends = pattern.ends_with('%') && pattern.len() > 1;
    let inner = pattern.trim_matches('%');
    if inner.contains('%') {
        return Err(ExprError(format!(
            "unsupported LIKE pattern {pattern:?}: interior wildcards"
        )));
    }
    let condition = match (starts, ends) {
        (true, true) => SearchCondition::Contains,
        (true, false) => SearchCondition::EndsWith,
        (false, true) => SearchCondition::StartsWith,
        (false, false) => SearchCondition::Equals,
    };
    Ok((condition, inner.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn atom(expr: &Expr) -> &SearchFilter {
        match expr {
            Expr::Atom(f) => f,
            other => panic!("expected atom, got {other:?}"),
        }
    }

    #[test]
    fn simple_equals() {
        let e = parse_expression("title = 'X'").unwrap();
        let f = atom(&e);
        assert_eq!(f.field, "title");
        assert_eq!(f.condition, SearchCondition::Equals);
        assert_eq!(f.value, Value::String("X".into()));
    }

    #[test]
    fn numeric_comparison() {
        let e = parse_expression("year >= 1999").unwrap();
        let f = atom(&e);
        assert_eq!(f.condition, SearchCondition::GreaterThanOrEqual);
        assert_eq!(f.value, Value::from(1999));
    }

    #[test]
    fn dotted_field_path() {
        let e = parse_expression("author.name != 'Ada'").unwrap();
        assert_eq!(atom(&e).field, "author.name");
        assert_eq!(atom(&e).condition, SearchCondition::NotEquals);
    }

    #[test]
    fn angle_bracket_not_equals() {
        let e = parse_expression("year <> 2000").unwrap();
        assert_eq!(atom(&e).condition, SearchCondition::NotEquals);
    }

    #[test]
    fn and_or_precedence() {
        let e = parse_expression("a = 1 OR b = 2 AND c = 3").unwrap();
        match e {
            Expr::Or(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[0], Expr::Atom(_)));
                assert!(matches!(&terms[1], Expr::And(inner) if inner.len() == 2));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn parentheses_override_precedence() {
        let e = parse_expression("(a = 1 OR b = 2) AND c = 3").unwrap();
        match e {
            Expr::And(terms) => {
                assert!(matches!(&terms[0], Expr::Or(_)));
                assert!(matches!(&terms[1], Expr::Atom(_)));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn not_expression() {
        let e = parse_expression("NOT year = 1999").unwrap();
        assert!(matches!(e, Expr::Not(_)));
    }

    #[test]
    fn like_placement() {
        let contains = parse_expression("title LIKE '%rust%'").unwrap();
        assert_eq!(atom(&contains).condition, SearchCondition::Contains);
        assert_eq!(atom(&contains).value, Value::String("rust".into()));

        let starts = parse_expression("title LIKE 'rust%'").unwrap();
        assert_eq!(atom(&starts).condition, SearchCondition::StartsWith);

        let ends = parse_expression("title LIKE '%rust'").unwrap();
        assert_eq!(atom(&ends).condition, SearchCondition::EndsWith);
    }

    #[test]
    fn in_list() {
        let e = parse_expression("state IN ('draft', 'final', 3)").unwrap();
        let f = atom(&e);
        assert_eq!(f.condition, SearchCondition::In);
        assert_eq!(
            f.value,
            serde_json::json!(["draft", "final", 3])
        );
    }

    #[test]
    fn not_in_list() {
        let e = parse_expression("state NOT IN ('gone')").unwrap();
        assert_eq!(atom(&e).condition, SearchCondition::NotIn);
    }

    #[test]
    fn is_null_forms() {
        let e = parse_expression("isbn IS NULL").unwrap();
        assert_eq!(atom(&e).condition, SearchCondition::IsNull);
        let e = parse_expression("isbn IS NOT NULL").unwrap();
        assert_eq!(atom(&e).condition, SearchCondition::IsNotNull);
    }

    #[test]
    fn doubled_quote_escape() {
        let e = parse_expression("title = 'it''s'").unwrap();
        assert_eq!(atom(&e).value, Value::String("it's".into()));
    }

    #[test]
    fn keywords_case_insensitive() {
        assert!(parse_expression("a = 1 and b = 2 or not c is null").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_expression("").is_err());
        assert!(parse_expression("title =").is_err());
        assert!(parse_expression("= 'x'").is_err());
        assert!(parse_expression("title = 'x' extra").is_err());
        assert!(parse_expression("title LIKE 'a%b'").is_err());
    }
}
