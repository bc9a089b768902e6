/// Output buffer that accumulates generated code line by line.
pub struct Output {
    lines: Vec<String>,
    current_line: String,
}

impl Output {
    pub fn new() -> Self {
        Self {
            lines: Vec::new(),
            current_line: String::new(),
        }
    }

    /// Add text to the current line
    pub fn push(&mut self, text: &str) {
        self.current_line.push_str(text);
    }

    /// Add `depth` tabs to the current line
    pub fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.current_line.push('\t');
        }
    }

    /// Add an indented line of text and end it
    pub fn line(&mut self, depth: usize, text: &str) {
        self.indent(depth);
        self.push(text);
        self.newline();
    }

    /// End the current line
    pub fn newline(&mut self) {
        self.current_line.push('\n');
        self.lines.push(std::mem::take(&mut self.current_line));
    }

    /// Blank separator line, never doubled
    pub fn blank(&mut self) {
        if !self.current_line.is_empty() {
            self.newline();
        }
        if self.lines.last().is_some_and(|line| line != "\n") {
            self.newline();
        }
    }

    /// Finish and return the generated code, ending with exactly one newline
    pub fn finish(mut self) -> String {
        if !self.current_line.is_empty() {
            self.newline();
        }
        while self.lines.len() > 1 && self.lines.last().is_some_and(|line| line == "\n") {
            self.lines.pop();
        }
        self.lines.join("")
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_indentation() {
        let mut out = Output::new();
        out.line(0, "func f() {");
        out.line(1, "return");
        out.push("}");
        assert_eq!(out.finish(), "func f() {\n\treturn\n}\n");
    }

    #[test]
    fn test_blank_is_not_doubled() {
        let mut out = Output::new();
        out.line(0, "a");
        out.blank();
        out.blank();
        out.line(0, "b");
        out.blank();
        assert_eq!(out.finish(), "a\n\nb\n");
    }
}
