use crate::error::CompileError;
use crate::span::Span;
use log::trace;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    IntLiteral(i64),
    RealLiteral(f64),
    CharLiteral(char),
    StringLiteral(String),
    Identifier(String),

    // Keywords
    Program,
    Const,
    TypeDecl,
    Var,
    Procedure,
    List,
    Record,
    From,
    Read,
    Print,
    If,
    Then,
    Else,
    Repeat,
    To,
    Add,
    While,
    Continue,
    Until,
    ByValue,
    ByRef,
    IntegerType,
    RealType,
    BooleanType,
    CharType,
    StringType,
    True,
    False,

    // Operators
    Assign,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Backslash,
    Percent,
    Caret,
    AndAnd,
    OrOr,
    Not,

    // Punctuation
    Semicolon,
    Comma,
    Colon,
    Dot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    /// Human-readable name used in parser diagnostics.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::IntLiteral(_) => "integer literal".into(),
            TokenKind::RealLiteral(_) => "real literal".into(),
            TokenKind::CharLiteral(_) => "char literal".into(),
            TokenKind::StringLiteral(_) => "string literal".into(),
            TokenKind::Identifier(name) => format!("identifier '{}'", name),
            TokenKind::Eof => "end of input".into(),
            other => format!("{:?}", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub span: Span,
}

fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "برنامج" => TokenKind::Program,
        "ثابت" => TokenKind::Const,
        "نوع" => TokenKind::TypeDecl,
        "متغير" => TokenKind::Var,
        "إجراء" => TokenKind::Procedure,
        "قائمة" => TokenKind::List,
        "سجل" => TokenKind::Record,
        "من" => TokenKind::From,
        "اقرأ" => TokenKind::Read,
        "اطبع" => TokenKind::Print,
        "اذا" => TokenKind::If,
        "فان" => TokenKind::Then,
        "والا" => TokenKind::Else,
        "كرر" => TokenKind::Repeat,
        "الى" => TokenKind::To,
        "اضف" => TokenKind::Add,
        "طالما" => TokenKind::While,
        "استمر" => TokenKind::Continue,
        "حتى" => TokenKind::Until,
        "بالقيمة" => TokenKind::ByValue,
        "بالمرجع" => TokenKind::ByRef,
        "صحيح" => TokenKind::IntegerType,
        "حقيقي" => TokenKind::RealType,
        "منطقي" => TokenKind::BooleanType,
        "حرف" => TokenKind::CharType,
        "خيط" => TokenKind::StringType,
        "صح" => TokenKind::True,
        "خطأ" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Restartable scanner over one source text. Iterating yields each token in
/// order, ending with exactly one `Eof` token.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    finished: bool,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            finished: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<char> {
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

    fn here(&self) -> Span {
        Span::new(self.line, self.column)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().map_or(false, char::is_whitespace) {
                self.bump();
            }
            if self.peek() == Some('/') && self.peek_next() == Some('/') {
                while self.peek().map_or(false, |c| c != '\n') {
                    self.bump();
                }
                continue;
            }
            break;
        }
    }

    fn scan_identifier(&mut self, start: Span) -> Token {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            ident.push(c);
            self.bump();
        }
        let kind = keyword(&ident).unwrap_or(TokenKind::Identifier(ident.clone()));
        Token {
            kind,
            lexeme: ident,
            span: start,
        }
    }

    fn scan_number(&mut self, start: Span) -> Token {
        let mut text = String::new();
        while self.peek().map_or(false, |c| c.is_ascii_digit()) {
            text.push(self.bump().unwrap());
        }
        // A dot only belongs to the number when a digit follows; otherwise it
        // is the program-terminating '.' and lexes on its own.
        let is_real = self.peek() == Some('.')
            && self.peek_next().map_or(false, |c| c.is_ascii_digit());
        if is_real {
            text.push(self.bump().unwrap());
            while self.peek().map_or(false, |c| c.is_ascii_digit()) {
                text.push(self.bump().unwrap());
            }
            let value: f64 = text.parse().unwrap_or(0.0);
            Token {
                kind: TokenKind::RealLiteral(value),
                lexeme: text,
                span: start,
            }
        } else {
            let value: i64 = text.parse().unwrap_or(0);
            Token {
                kind: TokenKind::IntLiteral(value),
                lexeme: text,
                span: start,
            }
        }
    }

    fn scan_escape(&mut self) -> Option<char> {
        let c = self.bump()?;
        if c != '\\' {
            return Some(c);
        }
        let escaped = self.bump()?;
        Some(match escaped {
            'n' => '\n',
            't' => '\t',
            '0' => '\0',
            other => other, // \\ \' \" fall through unchanged
        })
    }

    fn scan_string(&mut self, start: Span) -> Result<Token, CompileError> {
        self.bump(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(CompileError::lex("unterminated string literal", start));
                }
                Some('"') => {
                    self.bump();
                    break;
                }
                Some(_) => {
                    // scan_escape only returns None at end of input, handled above
                    if let Some(c) = self.scan_escape() {
                        value.push(c);
                    }
                }
            }
        }
        Ok(Token {
            kind: TokenKind::StringLiteral(value.clone()),
            lexeme: format!("\"{}\"", value),
            span: start,
        })
    }

    fn scan_char(&mut self, start: Span) -> Result<Token, CompileError> {
        self.bump(); // opening quote
        let value = match self.peek() {
            None | Some('\n') | Some('\'') => {
                return Err(CompileError::lex("unterminated char literal", start));
            }
            Some(_) => match self.scan_escape() {
                Some(c) => c,
                None => return Err(CompileError::lex("unterminated char literal", start)),
            },
        };
        if self.peek() != Some('\'') {
            return Err(CompileError::lex("unterminated char literal", start));
        }
        self.bump();
        Ok(Token {
            kind: TokenKind::CharLiteral(value),
            lexeme: format!("'{}'", value),
            span: start,
        })
    }

    /// Multi-character operators are tried longest-first so that e.g. `=!`
    /// lexes as one NotEq token, never Assign followed by Not.
    fn scan_operator(&mut self, start: Span) -> Result<Token, CompileError> {
        let c = self.bump().unwrap();
        let (kind, lexeme) = match c {
            '=' => match self.peek() {
                Some('=') => {
                    self.bump();
                    (TokenKind::Eq, "==")
                }
                Some('!') => {
                    self.bump();
                    (TokenKind::NotEq, "=!")
                }
                Some('>') => {
                    self.bump();
                    (TokenKind::GtEq, "=>")
                }
                _ => (TokenKind::Assign, "="),
            },
            '<' => match self.peek() {
                Some('=') => {
                    self.bump();
                    (TokenKind::LtEq, "<=")
                }
                _ => (TokenKind::Lt, "<"),
            },
            '>' => (TokenKind::Gt, ">"),
            '+' => (TokenKind::Plus, "+"),
            '-' => (TokenKind::Minus, "-"),
            '*' => (TokenKind::Star, "*"),
            '/' => (TokenKind::Slash, "/"),
            '\\' => (TokenKind::Backslash, "\\"),
            '%' => (TokenKind::Percent, "%"),
            '^' => (TokenKind::Caret, "^"),
            '!' => (TokenKind::Not, "!"),
            '&' => match self.peek() {
                Some('&') => {
                    self.bump();
                    (TokenKind::AndAnd, "&&")
                }
                _ => {
                    return Err(CompileError::lex("unrecognized character '&'", start));
                }
            },
            '|' => match self.peek() {
                Some('|') => {
                    self.bump();
                    (TokenKind::OrOr, "||")
                }
                _ => {
                    return Err(CompileError::lex("unrecognized character '|'", start));
                }
            },
            ';' => (TokenKind::Semicolon, ";"),
            ',' => (TokenKind::Comma, ","),
            ':' => (TokenKind::Colon, ":"),
            '.' => (TokenKind::Dot, "."),
            '(' => (TokenKind::LParen, "("),
            ')' => (TokenKind::RParen, ")"),
            '{' => (TokenKind::LBrace, "{"),
            '}' => (TokenKind::RBrace, "}"),
            '[' => (TokenKind::LBracket, "["),
            ']' => (TokenKind::RBracket, "]"),
            other => {
                return Err(CompileError::lex(
                    format!("unrecognized character '{}'", other),
                    start,
                ));
            }
        };
        Ok(Token {
            kind,
            lexeme: lexeme.to_string(),
            span: start,
        })
    }

    fn next_token(&mut self) -> Result<Option<Token>, CompileError> {
        self.skip_whitespace_and_comments();
        let start = self.here();
        let c = match self.peek() {
            Some(c) => c,
            None => {
                if self.finished {
                    return Ok(None);
                }
                self.finished = true;
                return Ok(Some(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    span: start,
                }));
            }
        };

        let token = if is_ident_start(c) {
            self.scan_identifier(start)
        } else if c.is_ascii_digit() {
            self.scan_number(start)
        } else if c == '"' {
            self.scan_string(start)?
        } else if c == '\'' {
            self.scan_char(start)?
        } else {
            self.scan_operator(start)?
        };
        Ok(Some(token))
    }
}

impl Iterator for Lexer {
    type Item = Result<Token, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Some(token)) => Some(Ok(token)),
            Ok(None) => None,
            Err(err) => {
                self.finished = true;
                self.pos = self.chars.len();
                Some(Err(err))
            }
        }
    }
}

/// Scan the whole source, ending with the terminal `Eof` token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, CompileError> {
    let tokens = Lexer::new(input).collect::<Result<Vec<_>, _>>()?;
    trace!("lexed {} tokens", tokens.len());
    Ok(tokens)
}
