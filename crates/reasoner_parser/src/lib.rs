//! Streaming reader for KIF: turns a text blob into an ordered sequence of
//! [`Term`]s. Tolerates `;`-to-end-of-line comments and double-quoted
//! strings. Pure function of its input — holds no shared state, so callers
//! may parse from as many threads as they like.

use std::fmt;

use reasoner_term::Term;

/// A 1-based line/column position in the source text, attached to every
/// [`ParseError`] so a caller can point a user at the offending input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Everything that can go wrong while reading KIF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A `(` was never closed before the input ended.
    UnmatchedParen(Span),
    /// A `"` was never closed before the input ended.
    UnmatchedQuote(Span),
    /// A bare `?` with no following characters.
    EmptyVariable(Span),
    /// Input ended in the middle of reading a term.
    UnexpectedEof(Span),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnmatchedParen(s) => write!(f, "unmatched '(' at {s}"),
            ParseError::UnmatchedQuote(s) => write!(f, "unmatched '\"' at {s}"),
            ParseError::EmptyVariable(s) => write!(f, "empty variable name at {s}"),
            ParseError::UnexpectedEof(s) => write!(f, "unexpected end of input at {s}"),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a text blob into an ordered sequence of top-level terms.
pub fn parse(input: &str) -> Result<Vec<Term>, ParseError> {
    let mut reader = Reader::new(input);
    let mut terms = Vec::new();
    loop {
        reader.skip_trivia();
        if reader.peek().is_none() {
            break;
        }
        terms.push(reader.read_term()?);
    }
    Ok(terms)
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || c == '(' || c == ')' || c == '"' || c == '?' || c == ';'
}

struct Reader {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

impl Reader {
    fn new(input: &str) -> Self {
        Reader {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            column: self.column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some(';') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn read_term(&mut self) -> Result<Term, ParseError> {
        match self.peek() {
            None => Err(ParseError::UnexpectedEof(self.span())),
            Some('(') => self.read_list(),
            Some('"') => self.read_quoted(),
            Some('?') => self.read_variable(),
            Some(_) => self.read_atom(),
        }
    }

    fn read_list(&mut self) -> Result<Term, ParseError> {
        let start = self.span();
        self.advance(); // consume '('
        let mut children = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(ParseError::UnmatchedParen(start)),
                Some(')') => {
                    self.advance();
                    return Ok(Term::list(children));
                }
                Some(_) => children.push(self.read_term()?),
            }
        }
    }

    fn read_quoted(&mut self) -> Result<Term, ParseError> {
        let start = self.span();
        self.advance(); // consume opening '"'
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(ParseError::UnmatchedQuote(start)),
                Some('"') => return Ok(Term::atom(&value)),
                Some('\\') => match self.advance() {
                    None => return Err(ParseError::UnmatchedQuote(start)),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn read_variable(&mut self) -> Result<Term, ParseError> {
        let start = self.span();
        self.advance(); // consume '?'
        let mut name = String::from("?");
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            name.push(c);
            self.advance();
        }
        if name.chars().count() < 2 {
            return Err(ParseError::EmptyVariable(start));
        }
        Ok(Term::var(&name))
    }

    fn read_atom(&mut self) -> Result<Term, ParseError> {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            value.push(c);
            self.advance();
        }
        Ok(Term::atom(&value))
    }
}
