//! Statement guard - allowlist and operation checks for synthesized SQL.
//!
//! Statements produced by the reasoning service are never trusted. Before a
//! statement reaches the executor the guard verifies that:
//!
//! - it is exactly one statement of the expected class (read or insert)
//! - it contains no schema-altering or connection-level operations
//! - every table it references is on the domain's allowlist
//!
//! String literals and comments are masked before any keyword or table scan,
//! so `WHERE note = 'drop table'` is not mistaken for DDL.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static FENCED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

static SCHEMA_ALTERING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(CREATE|ALTER|DROP|TRUNCATE|ATTACH|DETACH|PRAGMA|VACUUM|REINDEX|ANALYZE|GRANT|REVOKE)\b")
        .expect("schema keyword pattern is valid")
});

static DATA_MODIFYING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|REPLACE\s+INTO|UPSERT)\b")
        .expect("dml keyword pattern is valid")
});

/// Words that close a FROM clause opened at the same depth.
const FROM_TERMINATORS: &[&str] = &[
    "where", "group", "order", "limit", "having", "union", "except", "intersect", "select",
    "values", "set", "returning",
];

/// Why a statement was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsafeStatement {
    #[error("no statement was produced")]
    Empty,

    #[error("multiple statements are not allowed")]
    MultipleStatements,

    #[error("only SELECT statements may be used to read data (found {0})")]
    NotReadOnly(String),

    #[error("only INSERT statements may be used to create records (found {0})")]
    NotInsert(String),

    #[error("schema-altering operation {0} is not allowed")]
    SchemaAltering(String),

    #[error("data-modifying operation {0} is not allowed in a read")]
    WriteInRead(String),

    #[error("schema-qualified table {0} is not allowed")]
    QualifiedTable(String),

    #[error("table {0} is outside this domain's allowlist")]
    TableNotAllowed(String),

    #[error("a table position holds something other than a table name")]
    OpaqueTableReference,
}

/// Class of statement a caller intends to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementClass {
    Read,
    Write,
}

/// Per-domain statement guard.
#[derive(Debug, Clone)]
pub struct StatementGuard {
    allowed: HashSet<String>,
}

impl StatementGuard {
    /// Creates a guard permitting only `tables`.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: tables
                .into_iter()
                .map(|t| t.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn allows_table(&self, table: &str) -> bool {
        self.allowed.contains(&table.to_ascii_lowercase())
    }

    /// Checks a bare table name against the allowlist.
    pub fn check_table(&self, table: &str) -> Result<(), UnsafeStatement> {
        if self.allows_table(table) {
            Ok(())
        } else {
            Err(UnsafeStatement::TableNotAllowed(table.to_string()))
        }
    }

    /// Validates a read statement and returns it cleaned of fences and
    /// trailing terminators, ready for execution.
    pub fn check_read(&self, raw: &str) -> Result<String, UnsafeStatement> {
        self.check(raw, StatementClass::Read)
    }

    /// Validates an insert statement.
    pub fn check_write(&self, raw: &str) -> Result<String, UnsafeStatement> {
        self.check(raw, StatementClass::Write)
    }

    pub fn check(&self, raw: &str, class: StatementClass) -> Result<String, UnsafeStatement> {
        let text = unfence(raw);
        let masked = mask_literals_and_comments(text);

        let end = single_statement_end(&masked)?;
        let statement = text[..end].trim();
        let masked = masked[..end].trim();
        if masked.is_empty() {
            return Err(UnsafeStatement::Empty);
        }

        let tokens = tokenize(masked);
        let leading = tokens
            .iter()
            .find_map(|t| match t {
                Token::Word(w) => Some(w.to_ascii_uppercase()),
                _ => None,
            })
            .unwrap_or_default();

        match class {
            StatementClass::Read if leading != "SELECT" && leading != "WITH" => {
                return Err(UnsafeStatement::NotReadOnly(leading));
            }
            StatementClass::Write if leading != "INSERT" => {
                return Err(UnsafeStatement::NotInsert(leading));
            }
            _ => {}
        }

        if let Some(m) = SCHEMA_ALTERING.find(masked) {
            return Err(UnsafeStatement::SchemaAltering(m.as_str().to_ascii_uppercase()));
        }
        if class == StatementClass::Read {
            if let Some(m) = DATA_MODIFYING.find(masked) {
                return Err(UnsafeStatement::WriteInRead(m.as_str().to_ascii_uppercase()));
            }
        }

        let ctes = cte_names(&tokens);
        for table in referenced_tables(&tokens)? {
            if ctes.contains(&table) {
                continue;
            }
            self.check_table(&table)?;
        }

        Ok(statement.to_string())
    }
}

/// Extracts the body of the first fenced code block, if any.
fn unfence(raw: &str) -> &str {
    match FENCED.captures(raw).and_then(|c| c.get(1)) {
        Some(body) => body.as_str(),
        None => raw,
    }
}

/// Replaces string-literal contents and comments with spaces, keeping byte
/// offsets aligned with the input.
fn mask_literals_and_comments(text: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        Literal,
        LineComment,
        BlockComment,
    }

    let mut out = String::with_capacity(text.len());
    let mut state = State::Code;
    let mut chars = text.chars().peekable();
    let blank = |out: &mut String, c: char| {
        for _ in 0..c.len_utf8() {
            out.push(' ');
        }
    };

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '\'' => {
                    out.push('\'');
                    state = State::Literal;
                }
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = State::BlockComment;
                }
                _ => out.push(c),
            },
            State::Literal => {
                if c == '\'' {
                    if chars.peek() == Some(&'\'') {
                        chars.next();
                        out.push_str("  ");
                    } else {
                        out.push('\'');
                        state = State::Code;
                    }
                } else {
                    blank(&mut out, c);
                }
            }
            State::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = State::Code;
                } else {
                    blank(&mut out, c);
                }
            }
        }
    }
    out
}

/// Byte offset where the single statement ends (before any terminator).
fn single_statement_end(masked: &str) -> Result<usize, UnsafeStatement> {
    match masked.find(';') {
        None => Ok(masked.len()),
        Some(pos) => {
            let rest = &masked[pos..];
            if rest.chars().all(|c| c == ';' || c.is_whitespace()) {
                Ok(pos)
            } else {
                Err(UnsafeStatement::MultipleStatements)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Quoted(String),
    Literal,
    Punct(char),
}

impl Token {
    fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(word))
    }

    fn identifier(&self) -> Option<String> {
        match self {
            Token::Word(w) => Some(w.to_ascii_lowercase()),
            Token::Quoted(q) => Some(q.to_ascii_lowercase()),
            _ => None,
        }
    }
}

fn tokenize(masked: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = masked.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c.is_alphanumeric() || c == '_' {
            let mut word = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_alphanumeric() || c == '_' || c == '$' {
                    word.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token::Word(word));
        } else if c == '"' || c == '`' || c == '[' {
            let close = if c == '[' { ']' } else { c };
            chars.next();
            let mut ident = String::new();
            for c in chars.by_ref() {
                if c == close {
                    break;
                }
                ident.push(c);
            }
            tokens.push(Token::Quoted(ident));
        } else if c == '\'' {
            chars.next();
            for c in chars.by_ref() {
                if c == '\'' {
                    break;
                }
            }
            tokens.push(Token::Literal);
        } else {
            chars.next();
            tokens.push(Token::Punct(c));
        }
    }
    tokens
}

/// Names declared in a WITH list, at any depth.
fn cte_names(tokens: &[Token]) -> HashSet<String> {
    let mut names = HashSet::new();
    for (i, token) in tokens.iter().enumerate() {
        if !token.is_word("with") {
            continue;
        }
        let mut j = i + 1;
        if tokens.get(j).map_or(false, |t| t.is_word("recursive")) {
            j += 1;
        }
        while let Some(name) = tokens.get(j).and_then(Token::identifier) {
            j += 1;
            if tokens.get(j) == Some(&Token::Punct('(')) {
                match closing_paren(tokens, j) {
                    Some(close) => j = close + 1,
                    None => break,
                }
            }
            if !tokens.get(j).map_or(false, |t| t.is_word("as")) {
                break;
            }
            j += 1;
            while tokens
                .get(j)
                .map_or(false, |t| t.is_word("not") || t.is_word("materialized"))
            {
                j += 1;
            }
            if tokens.get(j) != Some(&Token::Punct('(')) {
                break;
            }
            let Some(close) = closing_paren(tokens, j) else { break };
            names.insert(name);
            j = close + 1;
            if tokens.get(j) == Some(&Token::Punct(',')) {
                j += 1;
            } else {
                break;
            }
        }
    }
    names
}

fn closing_paren(tokens: &[Token], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::Punct('(') => depth += 1,
            Token::Punct(')') => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Scope {
    /// A SELECT body: the statement itself, a subquery or a CTE body.
    Query,
    /// Parentheses in a table position, e.g. `FROM (a JOIN b ON ...)`.
    TableGroup,
    /// Function arguments, value lists and grouped expressions.
    Expr,
}

#[derive(Debug)]
struct Frame {
    scope: Scope,
    in_from: bool,
    expect_table: bool,
}

impl Frame {
    fn new(scope: Scope) -> Self {
        let grouped = scope == Scope::TableGroup;
        Self {
            scope,
            in_from: grouped,
            expect_table: grouped,
        }
    }
}

fn starts_query(tokens: &[Token], at: usize) -> bool {
    tokens
        .get(at)
        .map_or(false, |t| t.is_word("select") || t.is_word("with") || t.is_word("values"))
}

/// `WINDOW name AS (` rather than a table aliased `window`.
fn is_window_definition(tokens: &[Token], at: usize) -> bool {
    tokens.get(at + 1).and_then(Token::identifier).is_some()
        && tokens.get(at + 2).map_or(false, |t| t.is_word("as"))
        && tokens.get(at + 3) == Some(&Token::Punct('('))
}

/// Reads a table name starting at `at`, allowing only the `main.` qualifier.
/// Returns the lowercased name and the index just past it.
fn table_name(
    tokens: &[Token],
    at: usize,
    first: String,
) -> Result<(String, usize), UnsafeStatement> {
    if tokens.get(at + 1) != Some(&Token::Punct('.')) {
        return Ok((first, at + 1));
    }
    let second = tokens
        .get(at + 2)
        .and_then(Token::identifier)
        .ok_or(UnsafeStatement::OpaqueTableReference)?;
    if first != "main" {
        return Err(UnsafeStatement::QualifiedTable(format!("{first}.{second}")));
    }
    Ok((second, at + 3))
}

/// Every table in a table position, lowercased: each entry of a FROM list,
/// each JOIN operand (inside parenthesised groups too) and INTO/UPDATE
/// targets. A table position holding anything but an identifier or a
/// subquery is refused.
fn referenced_tables(tokens: &[Token]) -> Result<Vec<String>, UnsafeStatement> {
    let mut tables = Vec::new();
    let mut frames = vec![Frame::new(Scope::Query)];
    let mut i = 0;

    while i < tokens.len() {
        let top = frames.len() - 1;

        if frames[top].expect_table {
            frames[top].expect_table = false;
            match &tokens[i] {
                Token::Punct('(') => {
                    let scope = if starts_query(tokens, i + 1) {
                        Scope::Query
                    } else {
                        Scope::TableGroup
                    };
                    frames.push(Frame::new(scope));
                    i += 1;
                    continue;
                }
                token @ (Token::Word(_) | Token::Quoted(_)) => {
                    let first = token.identifier().unwrap_or_default();
                    let (table, next) = table_name(tokens, i, first)?;
                    tables.push(table);
                    i = next;
                    continue;
                }
                Token::Literal => return Err(UnsafeStatement::OpaqueTableReference),
                Token::Punct(_) => {}
            }
        }

        match &tokens[i] {
            Token::Punct('(') => {
                let scope = if starts_query(tokens, i + 1) {
                    Scope::Query
                } else {
                    Scope::Expr
                };
                frames.push(Frame::new(scope));
            }
            Token::Punct(')') => {
                if frames.len() > 1 {
                    frames.pop();
                }
            }
            Token::Punct(',') if frames[top].in_from => frames[top].expect_table = true,
            Token::Word(word) => {
                let word = word.to_ascii_lowercase();
                let frame = &mut frames[top];
                match word.as_str() {
                    "from" | "into" | "update" if frame.scope == Scope::Query => {
                        frame.in_from = word == "from";
                        frame.expect_table = true;
                    }
                    "join" if frame.in_from => frame.expect_table = true,
                    "window" if frame.in_from && is_window_definition(tokens, i) => {
                        frame.in_from = false;
                    }
                    w if frame.in_from
                        && frame.scope == Scope::Query
                        && FROM_TERMINATORS.contains(&w) =>
                    {
                        frame.in_from = false;
                    }
                    _ => {}
                }
            }
            _ => {}
        }
        i += 1;
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sales_guard() -> StatementGuard {
        StatementGuard::new(["customers", "orders", "order_items", "products", "leads", "tickets"])
    }

    #[test]
    fn accepts_simple_select() {
        let sql = sales_guard()
            .check_read("SELECT * FROM orders WHERE status = 'cancelled';")
            .unwrap();
        assert_eq!(sql, "SELECT * FROM orders WHERE status = 'cancelled'");
    }

    #[test]
    fn strips_markdown_fences() {
        let sql = sales_guard()
            .check_read("Here you go:\n```sql\nSELECT id FROM leads\n```")
            .unwrap();
        assert_eq!(sql, "SELECT id FROM leads");
    }

    #[test]
    fn accepts_joins_and_comma_lists_on_allowed_tables() {
        let guard = sales_guard();
        assert!(guard
            .check_read(
                "SELECT c.name, o.total FROM orders o JOIN customers AS c ON c.id = o.customer_id"
            )
            .is_ok());
        assert!(guard
            .check_read("SELECT * FROM orders o, customers c WHERE c.id = o.customer_id")
            .is_ok());
    }

    #[test]
    fn rejects_table_outside_allowlist() {
        let err = sales_guard()
            .check_read("SELECT * FROM orders JOIN invoices ON invoices.order_id = orders.id")
            .unwrap_err();
        assert_eq!(err, UnsafeStatement::TableNotAllowed("invoices".to_string()));
    }

    #[test]
    fn rejects_second_table_in_comma_list() {
        let err = sales_guard()
            .check_read("SELECT * FROM orders, payments")
            .unwrap_err();
        assert_eq!(err, UnsafeStatement::TableNotAllowed("payments".to_string()));
    }

    #[test]
    fn rejects_subquery_on_disallowed_table() {
        let err = sales_guard()
            .check_read("SELECT * FROM orders WHERE id IN (SELECT order_id FROM invoice_orders)")
            .unwrap_err();
        assert_eq!(err, UnsafeStatement::TableNotAllowed("invoice_orders".to_string()));
    }

    #[test]
    fn rejects_parenthesised_table_reference() {
        let guard = sales_guard();
        assert_eq!(
            guard.check_read("SELECT * FROM (invoices)").unwrap_err(),
            UnsafeStatement::TableNotAllowed("invoices".to_string())
        );
        assert_eq!(
            guard.check_read("SELECT * FROM orders o JOIN (invoices)").unwrap_err(),
            UnsafeStatement::TableNotAllowed("invoices".to_string())
        );
        assert_eq!(
            guard
                .check_read("SELECT * FROM ((orders o JOIN invoices i ON i.order_id = o.id))")
                .unwrap_err(),
            UnsafeStatement::TableNotAllowed("invoices".to_string())
        );
        assert!(guard.check_read("SELECT * FROM (orders)").is_ok());
    }

    #[test]
    fn clause_word_used_as_alias_does_not_end_the_table_list() {
        let guard = sales_guard();
        assert_eq!(
            guard.check_read("SELECT * FROM orders offset, invoices").unwrap_err(),
            UnsafeStatement::TableNotAllowed("invoices".to_string())
        );
        assert_eq!(
            guard.check_read("SELECT * FROM orders window, invoices").unwrap_err(),
            UnsafeStatement::TableNotAllowed("invoices".to_string())
        );
        let after_on = "SELECT * FROM orders o JOIN customers c ON c.id = o.customer_id, payments";
        assert_eq!(
            guard.check_read(after_on).unwrap_err(),
            UnsafeStatement::TableNotAllowed("payments".to_string())
        );
    }

    #[test]
    fn literal_in_table_position_is_refused() {
        assert_eq!(
            sales_guard().check_read("SELECT * FROM 'invoices'").unwrap_err(),
            UnsafeStatement::OpaqueTableReference
        );
    }

    #[test]
    fn window_clause_and_derived_tables_are_accepted() {
        let guard = sales_guard();
        assert!(guard
            .check_read(
                "SELECT id, SUM(total) OVER w FROM orders WINDOW w AS (ORDER BY id) LIMIT 5 OFFSET 1"
            )
            .is_ok());
        assert!(guard
            .check_read("SELECT t.n FROM (SELECT COUNT(*) AS n FROM orders) t")
            .is_ok());
        assert_eq!(
            guard
                .check_read("SELECT t.n FROM (SELECT COUNT(*) AS n FROM payments) t")
                .unwrap_err(),
            UnsafeStatement::TableNotAllowed("payments".to_string())
        );
    }

    #[test]
    fn window_name_does_not_shadow_a_table() {
        let err = sales_guard()
            .check_read("SELECT * FROM orders, invoices WINDOW invoices AS (ORDER BY 1)")
            .unwrap_err();
        assert_eq!(err, UnsafeStatement::TableNotAllowed("invoices".to_string()));
    }

    #[test]
    fn rejects_schema_catalog_reads() {
        assert!(sales_guard().check_read("SELECT sql FROM sqlite_master").is_err());
    }

    #[test]
    fn rejects_schema_altering_statements() {
        let guard = sales_guard();
        assert_eq!(
            guard.check_read("DROP TABLE orders").unwrap_err(),
            UnsafeStatement::NotReadOnly("DROP".to_string())
        );
        assert!(matches!(
            guard.check_read("SELECT 1; DROP TABLE orders"),
            Err(UnsafeStatement::MultipleStatements)
        ));
    }

    #[test]
    fn rejects_dml_hidden_in_cte() {
        let err = sales_guard()
            .check_read("WITH x AS (SELECT 1) DELETE FROM orders")
            .unwrap_err();
        assert_eq!(err, UnsafeStatement::WriteInRead("DELETE".to_string()));
    }

    #[test]
    fn keywords_inside_literals_and_comments_are_ignored() {
        let guard = sales_guard();
        assert!(guard
            .check_read("SELECT * FROM tickets WHERE subject = 'please drop the ; order'")
            .is_ok());
        assert!(guard
            .check_read("SELECT * FROM tickets -- delete later\nWHERE id = 1")
            .is_ok());
    }

    #[test]
    fn cte_names_are_not_treated_as_tables() {
        let sql = "WITH recent AS (SELECT * FROM orders WHERE order_date > date('now','-30 days')) \
                   SELECT status, COUNT(*) FROM recent GROUP BY status";
        assert!(sales_guard().check_read(sql).is_ok());
    }

    #[test]
    fn rejects_attached_schema_qualification() {
        let err = sales_guard()
            .check_read("SELECT * FROM other.orders")
            .unwrap_err();
        assert_eq!(err, UnsafeStatement::QualifiedTable("other.orders".to_string()));
        assert!(sales_guard().check_read("SELECT * FROM main.orders").is_ok());
    }

    #[test]
    fn write_must_be_single_insert_into_allowed_table() {
        let guard = sales_guard();
        assert!(guard
            .check_write("INSERT INTO \"leads\" (\"name\") VALUES (?)")
            .is_ok());
        assert_eq!(
            guard.check_write("INSERT INTO invoices (total) VALUES (?)").unwrap_err(),
            UnsafeStatement::TableNotAllowed("invoices".to_string())
        );
        assert_eq!(
            guard.check_write("UPDATE leads SET name = ?").unwrap_err(),
            UnsafeStatement::NotInsert("UPDATE".to_string())
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(sales_guard().check_read("  ;  ").unwrap_err(), UnsafeStatement::Empty);
    }

    proptest! {
        #[test]
        fn disallowed_tables_never_pass(table in "[a-z][a-z_]{0,15}") {
            let guard = sales_guard();
            prop_assume!(!guard.allows_table(&table));
            prop_assume!(!["select", "with", "values"].contains(&table.as_str()));
            let select = format!("SELECT * FROM {table}");
            let joined = format!("SELECT * FROM orders JOIN {table} ON 1 = 1");
            let grouped = format!("SELECT * FROM orders o JOIN ({table})");
            let aliased = format!("SELECT * FROM orders offset, {table}");
            let insert = format!("INSERT INTO {table} (name) VALUES (?)");
            prop_assert!(guard.check_read(&select).is_err());
            prop_assert!(guard.check_read(&joined).is_err());
            prop_assert!(guard.check_read(&grouped).is_err());
            prop_assert!(guard.check_read(&aliased).is_err());
            prop_assert!(guard.check_write(&insert).is_err());
        }
    }
}
