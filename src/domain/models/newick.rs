//! Newick reading and writing for [`Tree`].
//!
//! Supports multifurcations, internal node labels, quoted labels
//! (`'Homo sapiens'`, with `''` as escaped quote), branch lengths and
//! bracketed comments, which are skipped. Several trees may follow each
//! other, each terminated by `;`, as in a tree distribution file.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::tree::{NodeIndex, Tree};

/// Characters that end an unquoted label.
const LABEL_DELIMITERS: &[u8] = b"(),:;[";

/// Characters that force a label to be quoted when writing.
const QUOTE_TRIGGERS: &[char] = &['(', ')', '[', ']', '\'', ':', ';', ',', ' ', '\t', '\n'];

/// Parses every tree in `text`.
pub fn parse_trees(text: &str) -> DomainResult<Vec<Tree>> {
    let mut parser = NewickParser::new(text);
    let mut trees = Vec::new();
    loop {
        parser.skip_whitespace_and_comments()?;
        if parser.at_end() {
            return Ok(trees);
        }
        trees.push(parser.parse_tree()?);
    }
}

/// Writes `tree` as a Newick string terminated by `;`.
pub fn write_tree(tree: &Tree) -> String {
    let mut out = String::with_capacity(tree.num_nodes() * 8);
    write_node(tree, tree.root_index(), &mut out);
    out.push(';');
    out
}

fn write_node(tree: &Tree, index: NodeIndex, out: &mut String) {
    let node = tree.node(index);
    if !node.is_leaf() {
        out.push('(');
        for (i, &child) in node.children().iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            write_node(tree, child, out);
        }
        out.push(')');
    }
    if let Some(label) = node.label() {
        out.push_str(&escape_label(label));
    }
    if let Some(length) = node.branch_length() {
        out.push(':');
        out.push_str(&length.to_string());
    }
}

fn escape_label(label: &str) -> String {
    if label.contains(QUOTE_TRIGGERS) {
        format!("'{}'", label.replace('\'', "''"))
    } else {
        label.to_string()
    }
}

// =#========================================================================#=
// NEWICK PARSER
// =#========================================================================#=
/// Recursive descent parser over the bytes of a Newick string.
struct NewickParser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> NewickParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn error(&self, message: impl Into<String>) -> DomainError {
        DomainError::NewickSyntax {
            position: self.pos,
            message: message.into(),
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> DomainResult<()> {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else if b == b'[' {
                let start = self.pos;
                while self.peek().is_some_and(|b| b != b']') {
                    self.pos += 1;
                }
                if self.at_end() {
                    self.pos = start;
                    return Err(self.error("unterminated comment"));
                }
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    }

    fn expect(&mut self, expected: u8) -> DomainResult<()> {
        self.skip_whitespace_and_comments()?;
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", expected as char)))
        }
    }

    /// tree := subtree ';'
    fn parse_tree(&mut self) -> DomainResult<Tree> {
        let mut tree = Tree::new();
        let root = tree.root_index();
        self.parse_subtree(&mut tree, root)?;
        self.expect(b';')?;
        Ok(tree)
    }

    /// subtree := [ '(' subtree (',' subtree)* ')' ] [label] [':' length]
    ///
    /// Fills in the already created node `index`.
    fn parse_subtree(&mut self, tree: &mut Tree, index: NodeIndex) -> DomainResult<()> {
        self.skip_whitespace_and_comments()?;
        if self.peek() == Some(b'(') {
            self.pos += 1;
            loop {
                let child = tree.add_child(index, None, None);
                self.parse_subtree(tree, child)?;
                self.skip_whitespace_and_comments()?;
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
        }

        let label = self.parse_label()?;
        tree.set_label(index, label);
        let branch_length = self.parse_branch_length()?;
        tree.set_branch_length(index, branch_length);
        Ok(())
    }

    fn parse_label(&mut self) -> DomainResult<Option<String>> {
        self.skip_whitespace_and_comments()?;
        match self.peek() {
            Some(b'\'') => self.parse_quoted_label().map(Some),
            Some(b) if !LABEL_DELIMITERS.contains(&b) => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|b| !LABEL_DELIMITERS.contains(&b) && !b.is_ascii_whitespace())
                {
                    self.pos += 1;
                }
                Ok(Some(self.slice(start, self.pos)))
            }
            _ => Ok(None),
        }
    }

    fn parse_quoted_label(&mut self) -> DomainResult<String> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut label = String::new();
        loop {
            match self.peek() {
                None => {
                    self.pos = start;
                    return Err(self.error("unterminated quoted label"));
                }
                Some(b'\'') if self.bytes.get(self.pos + 1) == Some(&b'\'') => {
                    label.push('\'');
                    self.pos += 2;
                }
                Some(b'\'') => {
                    self.pos += 1;
                    return Ok(label);
                }
                Some(_) => {
                    let run_start = self.pos;
                    while self.peek().is_some_and(|b| b != b'\'') {
                        self.pos += 1;
                    }
                    label.push_str(&self.slice(run_start, self.pos));
                }
            }
        }
    }

    fn parse_branch_length(&mut self) -> DomainResult<Option<f64>> {
        self.skip_whitespace_and_comments()?;
        if self.peek() != Some(b':') {
            return Ok(None);
        }
        self.pos += 1;
        self.skip_whitespace_and_comments()?;

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_digit() || matches!(b, b'.' | b'-' | b'+' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let text = self.slice(start, self.pos);
        text.parse::<f64>().map(Some).map_err(|_| {
            self.pos = start;
            self.error(format!("invalid branch length '{text}'"))
        })
    }

    fn slice(&self, start: usize, end: usize) -> String {
        String::from_utf8_lossy(&self.bytes[start..end]).into_owned()
    }
}
