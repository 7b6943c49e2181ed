use crate::engine::{Comparison, Engine, Predicate};
use crate::error::{Error, Result};

/// Parses and executes one SQL-like statement against the engine.
///
/// This is the main entry point for statement processing, covering the
/// whole pipeline from statement text to a formatted response body:
///
/// ## Processing Pipeline
/// 1. **Lexing & Parsing**: a small hand lexer tokenizes the statement
///    (the grammar is not standard SQL: table identifiers may be file
///    paths or `http://` URLs, literals may be bare words, and a trailing
///    `WAIT` modifier turns the query into a blocking one)
/// 2. **Dispatch**: the parsed `Statement` picks the engine operation
/// 3. **Execution**: the engine resolves the table and runs the scan
/// 4. **Formatting**: results come back as the plain-text response body
///
/// ## Supported Statements
/// - `SELECT <cols|*> FROM <id> [WHERE <col> <=|!=> <literal>] [WAIT]`
/// - `UPDATE <id> SET <col>=<val>[, ...] [WHERE ...] [WAIT]`
/// - `INSERT INTO <id> ...` / `DELETE FROM <id> ...` (parsed, then
///   rejected as not implemented)
/// - `SAVE [<id>]`
///
/// The table identifier may be omitted everywhere it appears; the engine
/// then substitutes the most recently used one.
pub async fn plan_and_exec(engine: &Engine, statement: &str) -> Result<String> {
    match parse(statement)? {
        Statement::Select {
            columns,
            table,
            predicate,
            must_wait,
        } => {
            engine
                .select(&table, &columns, predicate.as_ref(), must_wait)
                .await
        }
        Statement::Update {
            table,
            assignments,
            predicate,
            must_wait,
        } => {
            engine
                .update(&table, &assignments, predicate.as_ref(), must_wait)
                .await
        }
        Statement::Insert { table } => engine.insert(&table).await,
        Statement::Delete { table } => engine.delete(&table).await,
        Statement::Save { table } => engine.save(&table).await,
    }
}

/// A fully parsed statement, ready for execution.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    /// `SELECT ...` — `columns` is `["*"]` for a wildcard projection
    Select {
        columns: Vec<String>,
        table: String,
        predicate: Option<Predicate>,
        must_wait: bool,
    },
    /// `UPDATE ... SET ...`
    Update {
        table: String,
        assignments: Vec<(String, String)>,
        predicate: Option<Predicate>,
        must_wait: bool,
    },
    /// `INSERT INTO ...` — recognized so execution can report the stub
    Insert { table: String },
    /// `DELETE FROM ...` — recognized so execution can report the stub
    Delete { table: String },
    /// `SAVE [<id>]` — empty table means "most recent"
    Save { table: String },
}

/// Parses one statement. A trailing semicolon is stripped first.
pub fn parse(statement: &str) -> Result<Statement> {
    let text = statement.trim();
    let text = text.strip_suffix(';').unwrap_or(text).trim_end();
    let mut parser = Parser {
        tokens: tokenize(text)?,
        pos: 0,
    };

    let head = parser.expect_word("a statement")?;
    let stmt = match head.to_ascii_lowercase().as_str() {
        "select" => parser.select()?,
        "update" => parser.update()?,
        "insert" => parser.insert()?,
        "delete" => parser.delete()?,
        "save" => parser.save(),
        other => return Err(Error::Parse(format!("unknown statement '{other}'"))),
    };
    parser.expect_end()?;
    Ok(stmt)
}

/// One lexical token. Keywords are not distinguished here; the parser
/// matches words case-insensitively in keyword positions.
#[derive(Clone, Debug, PartialEq)]
enum Token {
    /// An identifier, keyword, or literal (quotes already stripped)
    Word(String),
    Comma,
    LParen,
    RParen,
    Eq,
    Ne,
}

/// Splits statement text into tokens.
///
/// Words end at whitespace or at one of the punctuation characters
/// `, ( ) = !`. Single- or double-quoted spans form one word with the
/// quotes removed, which is how literals containing spaces or punctuation
/// are written. Anything else, including `/ : . ? ~`, stays inside a word
/// so file paths and URLs lex as single identifiers.
fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Eq);
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    return Err(Error::Parse("expected '=' after '!'".to_string()));
                }
            }
            quote @ ('\'' | '"') => {
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some(ch) if ch == quote => break,
                        Some(ch) => word.push(ch),
                        None => {
                            return Err(Error::Parse("unterminated quoted value".to_string()))
                        }
                    }
                }
                tokens.push(Token::Word(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || matches!(ch, ',' | '(' | ')' | '=' | '!') {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    // SELECT <cols|*> FROM <id> [WHERE ...] [WAIT]
    fn select(&mut self) -> Result<Statement> {
        let mut columns = vec![self.expect_word("a column name")?];
        while self.eat(&Token::Comma) {
            columns.push(self.expect_word("a column name")?);
        }
        self.expect_keyword("from")?;
        let table = self.table_identifier(&["where", "wait"]);
        let predicate = self.where_clause()?;
        let must_wait = self.eat_keyword("wait");
        Ok(Statement::Select {
            columns,
            table,
            predicate,
            must_wait,
        })
    }

    // UPDATE <id> SET col=val[, ...] [WHERE ...] [WAIT]
    fn update(&mut self) -> Result<Statement> {
        let table = self.table_identifier(&["set"]);
        self.expect_keyword("set")?;
        let mut assignments = Vec::new();
        loop {
            let column = self.expect_word("a column name in SET")?;
            self.expect_token(&Token::Eq, "'='")?;
            let value = self.expect_word("a value in SET")?;
            assignments.push((column, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        let predicate = self.where_clause()?;
        let must_wait = self.eat_keyword("wait");
        Ok(Statement::Update {
            table,
            assignments,
            predicate,
            must_wait,
        })
    }

    // INSERT INTO <id> (...) VALUES (...) — the tail is not validated
    // because execution rejects INSERT before it would matter.
    fn insert(&mut self) -> Result<Statement> {
        self.expect_keyword("into")?;
        let table = self.expect_word("a table identifier")?;
        self.drain();
        Ok(Statement::Insert { table })
    }

    // DELETE FROM <id> [WHERE ...] — same loose tail as INSERT.
    fn delete(&mut self) -> Result<Statement> {
        self.expect_keyword("from")?;
        let table = self.table_identifier(&["where"]);
        self.drain();
        Ok(Statement::Delete { table })
    }

    // SAVE [<id>]
    fn save(&mut self) -> Statement {
        let table = self.table_identifier(&[]);
        Statement::Save { table }
    }

    /// Consumes the next word as a table identifier unless it is one of
    /// the given stop keywords, in which case the identifier was omitted
    /// and resolves to the most recently used table.
    fn table_identifier(&mut self, stops: &[&str]) -> String {
        match self.peek() {
            Some(Token::Word(w)) if !stops.iter().any(|s| w.eq_ignore_ascii_case(s)) => {
                let w = w.clone();
                self.pos += 1;
                w
            }
            _ => String::new(),
        }
    }

    // [WHERE <col> <=|!=> <literal>]
    fn where_clause(&mut self) -> Result<Option<Predicate>> {
        if !self.eat_keyword("where") {
            return Ok(None);
        }
        let column = self.expect_word("a column name in WHERE")?;
        let op = match self.advance() {
            Some(Token::Eq) => Comparison::Eq,
            Some(Token::Ne) => Comparison::Ne,
            other => {
                return Err(Error::Parse(format!(
                    "expected '=' or '!=' in WHERE, found {}",
                    describe(other.as_ref())
                )))
            }
        };
        let literal = self.expect_word("a literal in WHERE")?;
        Ok(Some(Predicate {
            column,
            op,
            literal,
        }))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(Error::Parse(format!(
                "expected '{}', found {}",
                keyword.to_uppercase(),
                describe(self.peek())
            )))
        }
    }

    fn expect_word(&mut self, what: &str) -> Result<String> {
        match self.advance() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(Error::Parse(format!(
                "expected {what}, found {}",
                describe(other.as_ref())
            ))),
        }
    }

    fn expect_token(&mut self, token: &Token, what: &str) -> Result<()> {
        match self.advance() {
            Some(ref t) if t == token => Ok(()),
            other => Err(Error::Parse(format!(
                "expected {what}, found {}",
                describe(other.as_ref())
            ))),
        }
    }

    fn drain(&mut self) {
        self.pos = self.tokens.len();
    }

    fn expect_end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(Error::Parse(format!(
                "unexpected {} after end of statement",
                describe(Some(t))
            ))),
        }
    }
}

fn describe(token: Option<&Token>) -> String {
    match token {
        Some(Token::Word(w)) => format!("'{w}'"),
        Some(Token::Comma) => "','".to_string(),
        Some(Token::LParen) => "'('".to_string(),
        Some(Token::RParen) => "')'".to_string(),
        Some(Token::Eq) => "'='".to_string(),
        Some(Token::Ne) => "'!='".to_string(),
        None => "end of statement".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_star() {
        let stmt = parse("SELECT * FROM people.csv;").unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                columns: vec!["*".to_string()],
                table: "people.csv".to_string(),
                predicate: None,
                must_wait: false,
            }
        );
    }

    #[test]
    fn select_columns_with_where_and_wait() {
        let stmt = parse("select name, age from t.csv where name != Ada wait").unwrap();
        assert_eq!(
            stmt,
            Statement::Select {
                columns: vec!["name".to_string(), "age".to_string()],
                table: "t.csv".to_string(),
                predicate: Some(Predicate {
                    column: "name".to_string(),
                    op: Comparison::Ne,
                    literal: "Ada".to_string(),
                }),
                must_wait: true,
            }
        );
    }

    #[test]
    fn select_from_url_identifier() {
        let stmt = parse("SELECT * FROM http://data.example.org:8080/~me/x.csv").unwrap();
        match stmt {
            Statement::Select { table, .. } => {
                assert_eq!(table, "http://data.example.org:8080/~me/x.csv")
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn select_with_omitted_table() {
        let stmt = parse("SELECT * FROM WHERE name = Ada").unwrap();
        match stmt {
            Statement::Select {
                table, predicate, ..
            } => {
                assert_eq!(table, "");
                assert!(predicate.is_some());
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn update_with_assignments() {
        let stmt =
            parse("UPDATE t.csv SET age=31, name='Ada Lovelace' WHERE name = Ada WAIT").unwrap();
        assert_eq!(
            stmt,
            Statement::Update {
                table: "t.csv".to_string(),
                assignments: vec![
                    ("age".to_string(), "31".to_string()),
                    ("name".to_string(), "Ada Lovelace".to_string()),
                ],
                predicate: Some(Predicate {
                    column: "name".to_string(),
                    op: Comparison::Eq,
                    literal: "Ada".to_string(),
                }),
                must_wait: true,
            }
        );
    }

    #[test]
    fn quoted_literal_keeps_spelling() {
        let stmt = parse("SELECT * FROM t.csv WHERE note = 'a, b = c'").unwrap();
        match stmt {
            Statement::Select { predicate, .. } => {
                assert_eq!(predicate.unwrap().literal, "a, b = c");
            }
            other => panic!("unexpected statement: {other:?}"),
        }
    }

    #[test]
    fn save_with_and_without_identifier() {
        assert_eq!(
            parse("SAVE t.csv").unwrap(),
            Statement::Save {
                table: "t.csv".to_string()
            }
        );
        assert_eq!(
            parse("save;").unwrap(),
            Statement::Save {
                table: String::new()
            }
        );
    }

    #[test]
    fn insert_and_delete_parse_to_stubs() {
        assert_eq!(
            parse("INSERT INTO t.csv (name, age) VALUES (Grace, 36)").unwrap(),
            Statement::Insert {
                table: "t.csv".to_string()
            }
        );
        assert_eq!(
            parse("DELETE FROM t.csv WHERE name = Ada").unwrap(),
            Statement::Delete {
                table: "t.csv".to_string()
            }
        );
    }

    #[test]
    fn malformed_statements_are_rejected() {
        assert!(parse("").is_err());
        assert!(parse("DROP TABLE t").is_err());
        assert!(parse("SELECT * people.csv").is_err());
        assert!(parse("SELECT * FROM t.csv WHERE name < Ada").is_err());
        assert!(parse("UPDATE t.csv SET").is_err());
        assert!(parse("SELECT * FROM t.csv extra tokens").is_err());
        assert!(parse("SELECT * FROM t.csv WHERE name = 'unterminated").is_err());
    }
}
