//! Text form of the tree.
//!
//! ```text
//! # comment
//! Resources
//! {
//!   Sites = CERN, IN2P3
//!   Sites += RAL
//!   Limits {
//!     MaxJobs = 100
//!   }
//! }
//! ```
//!
//! Parsing is all-or-nothing: any error discards the partial tree.

use crate::tree::merge::merge_into;
use crate::tree::node::{is_valid_name, ConfigTree, Node, Section};
use crate::tree::{TreeError, TreeResult};

const INDENT: &str = "  ";

impl ConfigTree {
    /// Parse the serialized text form.
    pub fn load(text: &str) -> TreeResult<Self> {
        Parser::default().parse(text)
    }

    /// Render the deterministic text form.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        write_section(&mut out, self.root(), 0);
        out
    }
}

#[derive(Default)]
struct Parser {
    /// Open sections, innermost last. Index 0 is the root.
    stack: Vec<(String, Section)>,
    /// A bare name waiting for its `{`.
    pending: Option<String>,
}

impl Parser {
    fn parse(mut self, text: &str) -> TreeResult<ConfigTree> {
        self.stack.push((String::new(), Section::new()));

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line == "{" {
                let name = self
                    .pending
                    .take()
                    .ok_or_else(|| parse_error(line_no, "'{' without a section name"))?;
                self.stack.push((name, Section::new()));
            } else if line == "}" {
                self.close_section(line_no)?;
            } else if let Some(eq) = line.find('=') {
                self.option_line(line_no, line, eq)?;
            } else if let Some(name) = line.strip_suffix('{') {
                self.expect_no_pending(line_no)?;
                let name = checked_name(line_no, name.trim())?;
                self.stack.push((name, Section::new()));
            } else {
                self.expect_no_pending(line_no)?;
                self.pending = Some(checked_name(line_no, line)?);
            }
        }

        let last_line = text.lines().count().max(1);
        if let Some(name) = self.pending {
            return Err(parse_error(
                last_line,
                &format!("section '{}' has no body", name),
            ));
        }
        if self.stack.len() > 1 {
            let (name, _) = &self.stack[self.stack.len() - 1];
            return Err(parse_error(
                last_line,
                &format!("section '{}' is never closed", name),
            ));
        }

        let (_, root) = self
            .stack
            .pop()
            .ok_or_else(|| parse_error(last_line, "empty parser stack"))?;
        Ok(ConfigTree::from_root(root))
    }

    fn option_line(&mut self, line_no: usize, line: &str, eq: usize) -> TreeResult<()> {
        self.expect_no_pending(line_no)?;

        let (lhs, rhs) = (&line[..eq], line[eq + 1..].trim());
        let (name, append) = match lhs.strip_suffix('+') {
            Some(name) => (name.trim(), true),
            None => (lhs.trim(), false),
        };
        let name = checked_name(line_no, name)?;
        let section = self.current(line_no)?;

        let value = match (section.get(&name), append) {
            (Some(Node::Section(_)), _) => {
                return Err(parse_error(
                    line_no,
                    &format!("option '{}' collides with a section", name),
                ))
            }
            (Some(Node::Option(old)), true) if !old.is_empty() => format!("{}, {}", old, rhs),
            _ => rhs.to_string(),
        };
        section.insert(name, Node::Option(value));
        Ok(())
    }

    fn close_section(&mut self, line_no: usize) -> TreeResult<()> {
        self.expect_no_pending(line_no)?;
        if self.stack.len() < 2 {
            return Err(parse_error(line_no, "unbalanced '}'"));
        }
        let (name, section) = self
            .stack
            .pop()
            .ok_or_else(|| parse_error(line_no, "unbalanced '}'"))?;
        let parent = self.current(line_no)?;

        // Repeated section blocks are unioned, as if written once.
        if parent.get(&name).is_none() {
            parent.insert(name, Node::Section(section));
            return Ok(());
        }
        match parent.get_mut(&name) {
            Some(Node::Section(existing)) => merge_into(existing, &section, &format!("/{}", name))
                .map_err(|e| parse_error(line_no, &e.to_string())),
            _ => Err(parse_error(
                line_no,
                &format!("section '{}' collides with an option", name),
            )),
        }
    }

    fn current(&mut self, line_no: usize) -> TreeResult<&mut Section> {
        self.stack
            .last_mut()
            .map(|(_, s)| s)
            .ok_or_else(|| parse_error(line_no, "no open section"))
    }

    fn expect_no_pending(&self, line_no: usize) -> TreeResult<()> {
        match &self.pending {
            Some(name) => Err(parse_error(
                line_no,
                &format!("expected '{{' after section name '{}'", name),
            )),
            None => Ok(()),
        }
    }
}

fn checked_name(line_no: usize, name: &str) -> TreeResult<String> {
    if is_valid_name(name) {
        Ok(name.to_string())
    } else {
        Err(parse_error(line_no, &format!("invalid name '{}'", name)))
    }
}

fn parse_error(line: usize, message: &str) -> TreeError {
    TreeError::Parse {
        line,
        message: message.to_string(),
    }
}

fn write_section(out: &mut String, section: &Section, depth: usize) {
    let indent = INDENT.repeat(depth);
    for (name, node) in section.iter() {
        match node {
            Node::Option(value) if value.is_empty() => {
                out.push_str(&format!("{}{} =\n", indent, name));
            }
            Node::Option(value) => {
                out.push_str(&format!("{}{} = {}\n", indent, name, value));
            }
            Node::Section(child) => {
                out.push_str(&format!("{}{}\n{}{{\n", indent, name, indent));
                write_section(out, child, depth + 1);
                out.push_str(&format!("{}}}\n", indent));
            }
        }
    }
}
