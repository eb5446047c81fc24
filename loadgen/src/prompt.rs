use std::io::{BufRead, Write};

use anyhow::Context;

/// Line-oriented operator prompts.
pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    #[must_use]
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Prints `question` and returns the trimmed answer. End of input reads as
    /// an empty answer.
    pub fn ask(&mut self, question: &str) -> anyhow::Result<String> {
        write!(self.output, "{question}").context("Failed to write prompt")?;
        self.output.flush().context("Failed to flush prompt")?;
        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("Failed to read answer")?;
        Ok(line.trim().to_owned())
    }

    /// Prints `line` followed by a newline.
    pub fn say(&mut self, line: &str) -> anyhow::Result<()> {
        writeln!(self.output, "{line}").context("Failed to write output")
    }

    /// `true` only for an answer of `y`, in any case.
    pub fn confirm(&mut self, question: &str) -> anyhow::Result<bool> {
        Ok(self.ask(question)?.eq_ignore_ascii_case("y"))
    }

    #[must_use]
    pub fn into_output(self) -> W {
        self.output
    }
}
