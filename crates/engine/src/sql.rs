//! The SQL subset understood by the reference engine
//!
//! ```text
//! statement := agg_wrapper | query | write_statement | utility_statement
//! query     := SELECT list [FROM name [WHERE column = expr]] [;]
//!            | WITH name AS ( query ) query
//! list      := * | expr [AS name] {, expr [AS name]}
//! expr      := integer | 'string' | TRUE | FALSE | NULL | $n | column
//! ```
//!
//! `agg_wrapper` is the JSON aggregation the executor wraps user queries in;
//! it is recognized verbatim and its inner text parsed as a query.

use asof_core::HostError;
use serde_json::Value as JsonValue;

/// Prefix of the JSON aggregation wrapper
pub const AGG_PREFIX: &str = "SELECT COALESCE(json_agg(row_to_json(q)), '[]'::json)::jsonb FROM (";
/// Suffix of the JSON aggregation wrapper
pub const AGG_SUFFIX: &str = ") q";

const WRITE_VERBS: [&str; 5] = ["INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE"];
const UTILITY_VERBS: [&str; 4] = ["CREATE", "DROP", "ALTER", "VACUUM"];

/// A parsed statement
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Query wrapped in `json_agg(row_to_json(q))`
    JsonAgg(Query),
    /// Plain row-returning query
    Query(Query),
    /// Data-modifying statement, identified by its verb only
    Write(String),
    /// DDL or maintenance statement, identified by its verb only
    Utility(String),
}

/// A row-returning query
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// `SELECT ...`
    Select(Select),
    /// `WITH name AS (body) then`
    With {
        /// Name the body is bound to
        name: String,
        /// Common table expression
        body: Box<Query>,
        /// Query that may reference `name`
        then: Box<Query>,
    },
}

/// `SELECT list [FROM name [WHERE column = expr]]`
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    /// Output columns
    pub projection: Projection,
    /// Relation scanned, if any
    pub from: Option<String>,
    /// Equality filter on one column
    pub filter: Option<(String, Expr)>,
}

/// Select list
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// `*`
    Star,
    /// Expressions with output names
    Items(Vec<(Expr, String)>),
}

/// Scalar expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Constant
    Literal(JsonValue),
    /// Positional parameter, 1-based
    Param(usize),
    /// Column reference
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Number(i64),
    Str(String),
    Param(usize),
    Symbol(char),
}

impl Statement {
    /// Parse `sql`
    pub fn parse(sql: &str) -> Result<Statement, HostError> {
        let trimmed = sql.trim();
        if let Some(inner) = trimmed
            .strip_prefix(AGG_PREFIX)
            .and_then(|rest| rest.strip_suffix(AGG_SUFFIX))
        {
            return Ok(Statement::JsonAgg(parse_query(inner)?));
        }

        let verb = trimmed
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        if WRITE_VERBS.contains(&verb.as_str()) {
            return Ok(Statement::Write(verb));
        }
        if UTILITY_VERBS.contains(&verb.as_str()) {
            return Ok(Statement::Utility(verb));
        }
        Ok(Statement::Query(parse_query(trimmed)?))
    }
}

fn syntax_error(detail: impl std::fmt::Display) -> HostError {
    HostError::new(format!("syntax error: {}", detail))
}

fn tokenize(sql: &str) -> Result<Vec<Token>, HostError> {
    let chars: Vec<char> = sql.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Word(chars[start..i].iter().collect()));
        } else if c.is_ascii_digit()
            || (c == '-' && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit()))
        {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<i64>()
                .map_err(|_| syntax_error(format!("integer out of range: {}", text)))?;
            tokens.push(Token::Number(n));
        } else if c == '\'' {
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(syntax_error("unterminated quoted string")),
                    Some('\'') if chars.get(i + 1) == Some(&'\'') => {
                        s.push('\'');
                        i += 2;
                    }
                    Some('\'') => {
                        i += 1;
                        break;
                    }
                    Some(ch) => {
                        s.push(*ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(s));
        } else if c == '$' {
            let start = i + 1;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| syntax_error("bad parameter reference"))?;
            tokens.push(Token::Param(n));
        } else if "(),=*;".contains(c) {
            tokens.push(Token::Symbol(c));
            i += 1;
        } else {
            return Err(syntax_error(format!("unexpected character '{}'", c)));
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse_query(sql: &str) -> Result<Query, HostError> {
    let mut parser = Parser {
        tokens: tokenize(sql)?,
        pos: 0,
    };
    let query = parser.query()?;
    parser.eat_symbol(';');
    if parser.pos != parser.tokens.len() {
        return Err(syntax_error(format!(
            "unexpected trailing input at token {}",
            parser.pos + 1
        )));
    }
    Ok(query)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn peek_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Word(w)) if w.eq_ignore_ascii_case(kw))
    }

    fn eat_keyword(&mut self, kw: &str) -> bool {
        if self.peek_keyword(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), HostError> {
        if self.eat_keyword(kw) {
            Ok(())
        } else {
            Err(syntax_error(format!("expected {}", kw)))
        }
    }

    fn eat_symbol(&mut self, sym: char) -> bool {
        if self.peek() == Some(&Token::Symbol(sym)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, sym: char) -> Result<(), HostError> {
        if self.eat_symbol(sym) {
            Ok(())
        } else {
            Err(syntax_error(format!("expected '{}'", sym)))
        }
    }

    fn identifier(&mut self) -> Result<String, HostError> {
        match self.bump() {
            Some(Token::Word(w)) => Ok(w.to_ascii_lowercase()),
            other => Err(syntax_error(format!("expected identifier, found {:?}", other))),
        }
    }

    fn query(&mut self) -> Result<Query, HostError> {
        if self.eat_keyword("WITH") {
            let name = self.identifier()?;
            self.expect_keyword("AS")?;
            self.expect_symbol('(')?;
            let body = self.query()?;
            self.expect_symbol(')')?;
            let then = self.query()?;
            return Ok(Query::With {
                name,
                body: Box::new(body),
                then: Box::new(then),
            });
        }

        self.expect_keyword("SELECT")?;
        let projection = if self.eat_symbol('*') {
            Projection::Star
        } else {
            let mut items = Vec::new();
            loop {
                let expr = self.expr()?;
                let name = if self.eat_keyword("AS") {
                    self.identifier()?
                } else {
                    match &expr {
                        Expr::Column(c) => c.clone(),
                        _ => "?column?".to_string(),
                    }
                };
                items.push((expr, name));
                if !self.eat_symbol(',') {
                    break;
                }
            }
            Projection::Items(items)
        };

        let mut from = None;
        let mut filter = None;
        if self.eat_keyword("FROM") {
            from = Some(self.identifier()?);
            if self.eat_keyword("WHERE") {
                let column = self.identifier()?;
                self.expect_symbol('=')?;
                filter = Some((column, self.expr()?));
            }
        } else if projection == Projection::Star {
            return Err(syntax_error("SELECT * with no tables specified"));
        }

        Ok(Query::Select(Select {
            projection,
            from,
            filter,
        }))
    }

    fn expr(&mut self) -> Result<Expr, HostError> {
        match self.bump() {
            Some(Token::Number(n)) => Ok(Expr::Literal(JsonValue::from(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(JsonValue::String(s))),
            Some(Token::Param(n)) => Ok(Expr::Param(n)),
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("true") => {
                Ok(Expr::Literal(JsonValue::Bool(true)))
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("false") => {
                Ok(Expr::Literal(JsonValue::Bool(false)))
            }
            Some(Token::Word(w)) if w.eq_ignore_ascii_case("null") => {
                Ok(Expr::Literal(JsonValue::Null))
            }
            Some(Token::Word(w)) => Ok(Expr::Column(w.to_ascii_lowercase())),
            other => Err(syntax_error(format!("expected expression, found {:?}", other))),
        }
    }
}
