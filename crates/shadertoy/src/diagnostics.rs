//! Maps compiler line numbers in the generated stage back to the author's file.
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Location of a generated line relative to the user source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLine {
    User(usize),
    Preamble(usize),
}

impl std::fmt::Display for SourceLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceLine::User(line) => write!(f, "{line}"),
            SourceLine::Preamble(line) => write!(f, "<preamble:{line}>"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineMap {
    preamble_lines: usize,
}

impl LineMap {
    pub fn new(preamble_lines: usize) -> Self {
        Self { preamble_lines }
    }

    /// Translates a 1-based generated line number.
    pub fn locate(&self, generated: usize) -> SourceLine {
        if generated > self.preamble_lines {
            SourceLine::User(generated - self.preamble_lines)
        } else {
            SourceLine::Preamble(generated)
        }
    }

    /// Rewrites the line numbers inside a block of compiler output.
    ///
    /// Recognized forms are `file.frag:LINE:` (glslang, shaderc and naga as
    /// formatted by the renderer), `0:LINE(` or `0:LINE:` (Mesa and glslang
    /// without a file name) and `0(LINE)` (NVIDIA).
    pub fn remap(&self, diagnostics: &str) -> String {
        if self.preamble_lines == 0 {
            return diagnostics.to_string();
        }
        let colon_form = colon_regex().replace_all(diagnostics, |caps: &Captures<'_>| {
            format!(
                "{}:{}{}",
                &caps["file"],
                self.rewrite(&caps["line"]),
                &caps["tail"]
            )
        });
        paren_regex()
            .replace_all(&colon_form, |caps: &Captures<'_>| {
                format!("0({})", self.rewrite(&caps["line"]))
            })
            .into_owned()
    }

    fn rewrite(&self, raw: &str) -> String {
        match raw.parse::<usize>() {
            Ok(line) if line > 0 => self.locate(line).to_string(),
            _ => raw.to_string(),
        }
    }
}

fn colon_regex() -> &'static Regex {
    static COLON: OnceLock<Regex> = OnceLock::new();
    COLON.get_or_init(|| {
        Regex::new(r"(?P<file>[\w./\\-]+\.(?:frag|glsl|vert)|\b0):(?P<line>\d+)(?P<tail>[:(])")
            .expect("colon diagnostic pattern is valid")
    })
}

fn paren_regex() -> &'static Regex {
    static PAREN: OnceLock<Regex> = OnceLock::new();
    PAREN.get_or_init(|| {
        Regex::new(r"\b0\((?P<line>\d+)\)").expect("paren diagnostic pattern is valid")
    })
}
