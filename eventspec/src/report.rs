//! Transcript rendering: writers, formatter, pass/fail glyphs.
//!
//! The reporting sink is independent of the comparison logic. The harness
//! funnels every check through one assertion primitive that renders into a
//! [`TextFormatter`]; the formatter only knows about blocks, indentation,
//! and line breaks.

/// Glyph rendered before a passing check.
pub const CHECK_MARK: &str = "\u{221a}";

/// Glyph rendered before a failing check.
pub const CROSS_MARK: &str = "\u{2717}";

/// Sink for transcript text. Failures in a writer are not part of the
/// harness error taxonomy, so the operation is infallible.
pub trait TextWriter {
    /// Appends raw text to the transcript.
    fn write(&mut self, text: &str);
}

/// Buffer-backed writer, handy for asserting on transcripts in tests.
#[derive(Debug, Clone, Default)]
pub struct StringWriter {
    buffer: String,
}

impl StringWriter {
    /// Creates an empty writer.
    pub const fn new() -> Self {
        Self {
            buffer: String::new(),
        }
    }

    /// The transcript accumulated so far.
    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Consumes the writer, returning the transcript.
    pub fn into_string(self) -> String {
        self.buffer
    }
}

impl TextWriter for StringWriter {
    fn write(&mut self, text: &str) {
        self.buffer.push_str(text);
    }
}

/// Writer that streams the transcript to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleWriter;

impl TextWriter for ConsoleWriter {
    fn write(&mut self, text: &str) {
        print!("{text}");
    }
}

/// Block- and indentation-aware formatter over a [`TextWriter`].
///
/// A block writes its title on its own line and indents everything after
/// it; opening a new top-level block closes the previous one, so scripted
/// steps can chain `block(..)` calls without bookkeeping.
#[derive(Debug)]
pub struct TextFormatter<W> {
    writer: W,
    indent: usize,
    block_depth: usize,
    at_line_start: bool,
}

impl<W: TextWriter> TextFormatter<W> {
    /// Wraps a writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer,
            indent: 0,
            block_depth: 0,
            at_line_start: true,
        }
    }

    /// Read access to the underlying writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Writes text at the current indentation. Embedded newlines keep the
    /// indentation for every line.
    pub fn write(&mut self, text: &str) -> &mut Self {
        let mut first = true;
        for line in text.split('\n') {
            if !first {
                self.newline();
            }
            first = false;
            if line.is_empty() {
                continue;
            }
            if self.at_line_start {
                for _ in 0..self.indent {
                    self.writer.write("  ");
                }
                self.at_line_start = false;
            }
            self.writer.write(line);
        }
        self
    }

    /// Ends the current line.
    pub fn newline(&mut self) -> &mut Self {
        self.writer.write("\n");
        self.at_line_start = true;
        self
    }

    /// Increases the indentation by one level.
    pub fn indent(&mut self) -> &mut Self {
        self.indent += 1;
        self
    }

    /// Decreases the indentation by one level.
    pub fn unindent(&mut self) -> &mut Self {
        self.indent = self.indent.saturating_sub(1);
        self
    }

    /// Opens a titled block, closing any block still open.
    pub fn block(&mut self, title: &str) -> &mut Self {
        while self.block_depth > 0 {
            self.end_block();
        }
        self.nested_block(title)
    }

    /// Opens a titled block nested inside the current one.
    pub fn nested_block(&mut self, title: &str) -> &mut Self {
        if !self.at_line_start {
            self.newline();
        }
        self.write(title).newline().indent();
        self.block_depth += 1;
        self
    }

    /// Closes the innermost open block.
    pub fn end_block(&mut self) -> &mut Self {
        if self.block_depth > 0 {
            self.block_depth -= 1;
            self.unindent();
        }
        self
    }
}
