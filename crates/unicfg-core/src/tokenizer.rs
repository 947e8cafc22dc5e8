//! Logical-line tokenizer for the config file format.
//!
//! A logical line is a list of argument strings. It normally ends at a
//! newline, but `;` outside quotes ends it early (the remainder of the
//! physical line starts the next logical line) and a trailing `\` joins the
//! next physical line. `#` outside quotes starts a comment running to the
//! end of the physical line.
//!
//! Quoting rules:
//! - single quotes are opaque: no escapes, may not span lines;
//! - double quotes honor one escape form, `\<char>` copies the char
//!   verbatim, and `\` at end of line fetches the next line;
//! - the same backslash rules apply outside quotes.
//!
//! A single logical line may grow to at most [`LINEBUF_MAX`] bytes,
//! continuations included; longer input is a parse error.

use crate::error::{Error, Result};

/// Upper bound on the byte length of one logical line.
pub const LINEBUF_MAX: usize = 4096;

/// One argument with its byte offset inside the logical line, kept so the
/// importer can point at the offending token in diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    /// Decoded argument text (quotes and escapes resolved).
    pub text: String,
    /// Byte offset of the argument's first character, relative to the start
    /// of the logical line.
    pub offset: usize,
}

/// A tokenized logical line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalLine {
    /// Physical line number (1-based) where the logical line starts.
    pub line: u32,
    /// Arguments in order; never empty.
    pub args: Vec<Arg>,
}

/// Cursor-based tokenizer over a complete input buffer.
pub struct Tokenizer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    /// Start of the current logical line, for offset and length accounting.
    logical_start: usize,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            logical_start: 0,
        }
    }

    /// Physical line number at the current position.
    #[must_use]
    pub const fn line(&self) -> u32 {
        self.line
    }

    /// Produce the next non-empty logical line, or `None` at end of input.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] on unterminated quotes or when a logical
    /// line exceeds [`LINEBUF_MAX`] bytes. The cursor is left inside the
    /// failed line; call [`Tokenizer::recover`] to resume at the next
    /// physical line.
    pub fn next_line(&mut self) -> Result<Option<LogicalLine>> {
        loop {
            if self.pos >= self.bytes.len() {
                return Ok(None);
            }
            let line_no = self.line;
            self.logical_start = self.pos;
            let mut args = Vec::new();

            loop {
                self.check_length()?;
                self.skip_blank();
                match self.peek() {
                    None => break,
                    Some(b'\n') => {
                        self.advance_newline();
                        break;
                    }
                    Some(b';') => {
                        self.pos += 1;
                        break;
                    }
                    Some(b'#') => {
                        self.skip_to_eol();
                        self.check_length()?;
                        if self.peek() == Some(b'\n') {
                            self.advance_newline();
                        }
                        break;
                    }
                    Some(_) => {
                        if let Some(arg) = self.scan_arg()? {
                            args.push(arg);
                        }
                    }
                }
            }

            if !args.is_empty() {
                return Ok(Some(LogicalLine { line: line_no, args }));
            }
        }
    }

    /// Skip to the start of the next physical line, discarding whatever is
    /// left of the current one. Lenient import calls this after a parse
    /// error so the next [`Tokenizer::next_line`] starts clean.
    pub fn recover(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                self.advance_newline();
                return;
            }
            self.pos += 1;
        }
    }

    // ─── Scanning internals ──────────────────────────────────────────────

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, n: usize) -> Option<u8> {
        self.bytes.get(self.pos + n).copied()
    }

    fn advance_newline(&mut self) {
        self.pos += 1;
        self.line += 1;
    }

    fn check_length(&self) -> Result<()> {
        if self.pos - self.logical_start > LINEBUF_MAX {
            return Err(Error::Parse {
                line: self.line,
                byte: LINEBUF_MAX,
                reason: "line too long".into(),
            });
        }
        Ok(())
    }

    fn parse_error(&self, reason: &str) -> Error {
        Error::Parse {
            line: self.line,
            byte: self.pos - self.logical_start,
            reason: reason.into(),
        }
    }

    /// Skip spaces and tabs; a backslash-newline here joins the next
    /// physical line and keeps skipping.
    fn skip_blank(&mut self) {
        loop {
            match self.peek() {
                Some(b' ' | b'\t') => self.pos += 1,
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => {
                    self.pos += 1;
                    self.advance_newline();
                }
                Some(b'\\') if self.peek_at(1).is_none() => {
                    self.pos += 1;
                    return;
                }
                _ => return,
            }
        }
    }

    fn skip_to_eol(&mut self) {
        while let Some(b) = self.peek() {
            if b == b'\n' {
                return;
            }
            self.pos += 1;
        }
    }

    /// Copy one full character (possibly multi-byte) to `out`.
    fn copy_char(&mut self, out: &mut String) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            out.push(c);
            self.pos += c.len_utf8();
        }
    }

    /// Scan one argument. Returns `None` for a degenerate empty unquoted
    /// token (e.g. a lone trailing backslash).
    fn scan_arg(&mut self) -> Result<Option<Arg>> {
        let offset = self.pos - self.logical_start;
        let mut text = String::new();
        let mut quoted = false;

        loop {
            self.check_length()?;
            match self.peek() {
                None | Some(b' ' | b'\t' | b'\n' | b';' | b'#') => break,
                Some(b'\'') => {
                    quoted = true;
                    self.scan_single_quote(&mut text)?;
                }
                Some(b'"') => {
                    quoted = true;
                    self.scan_double_quote(&mut text)?;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        // Continuation: the token resumes on the next line.
                        Some(b'\n') => self.advance_newline(),
                        // Trailing backslash at end of input ends the token.
                        None => break,
                        Some(_) => self.copy_char(&mut text),
                    }
                }
                Some(_) => self.copy_char(&mut text),
            }
        }

        if text.is_empty() && !quoted {
            return Ok(None);
        }
        Ok(Some(Arg { text, offset }))
    }

    fn scan_single_quote(&mut self, out: &mut String) -> Result<()> {
        self.pos += 1;
        loop {
            self.check_length()?;
            match self.peek() {
                Some(b'\'') => {
                    self.pos += 1;
                    return Ok(());
                }
                None | Some(b'\n') => return Err(self.parse_error("unterminated '")),
                Some(_) => self.copy_char(out),
            }
        }
    }

    fn scan_double_quote(&mut self, out: &mut String) -> Result<()> {
        self.pos += 1;
        loop {
            self.check_length()?;
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'\n') => self.advance_newline(),
                        None => return Err(self.parse_error("unterminated \"")),
                        Some(_) => self.copy_char(out),
                    }
                }
                None | Some(b'\n') => return Err(self.parse_error("unterminated \"")),
                Some(_) => self.copy_char(out),
            }
        }
    }
}

/// Tokenize a buffer that must contain exactly one argument per logical
/// line, returning the decoded arguments. Used by the delta codec.
pub fn single_args(input: &str) -> Vec<std::result::Result<(u32, String), Error>> {
    let mut tok = Tokenizer::new(input);
    let mut out = Vec::new();
    loop {
        match tok.next_line() {
            Ok(None) => break,
            Ok(Some(line)) => {
                if line.args.len() == 1 {
                    let mut args = line.args;
                    if let Some(arg) = args.pop() {
                        out.push(Ok((line.line, arg.text)));
                    }
                } else {
                    out.push(Err(Error::Parse {
                        line: line.line,
                        byte: line.args[1].offset,
                        reason: "too many arguments".into(),
                    }));
                }
            }
            Err(e) => {
                out.push(Err(e));
                tok.recover();
            }
        }
    }
    out
}
