//! Structured-document parsing with line provenance.
//!
//! Section definitions address regions of a changed file by dotted path
//! (`spec.owner`) or `.` for the whole file. Off-the-shelf deserializers
//! discard source positions, so this module parses the indentation tree by
//! hand: every mapping node records the 1-based source lines its subtree
//! occupies, and path resolution returns exact line ranges.
//!
//! The parser understands the structure the engine needs — nested
//! mappings, scalar values, sequences, comments — and treats everything
//! below a sequence item as content of the owning mapping key, since path
//! expressions address mappings, not individual sequence elements.

use thiserror::Error;

use crate::lines::LineRange;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("parse failed at line {line}: {message}")]
    Parse { line: usize, message: String },
}

/// One mapping key with the source-line extent of its subtree.
#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub key: String,
    pub start_line: usize,
    pub end_line: usize,
    indent: usize,
    children: Vec<DocumentNode>,
}

impl DocumentNode {
    pub fn children(&self) -> &[DocumentNode] {
        &self.children
    }

    pub fn range(&self) -> LineRange {
        LineRange::new(self.start_line, self.end_line)
    }

    fn child(&self, key: &str) -> Option<&DocumentNode> {
        self.children.iter().find(|c| c.key == key)
    }
}

/// A parsed document: the top-level mapping keys plus the file's length.
#[derive(Debug, Clone)]
pub struct DocumentTree {
    roots: Vec<DocumentNode>,
    total_lines: usize,
}

impl DocumentTree {
    pub fn total_lines(&self) -> usize {
        self.total_lines
    }

    pub fn roots(&self) -> &[DocumentNode] {
        &self.roots
    }

    /// Resolve a dotted path expression to the line range of its subtree.
    ///
    /// `.` resolves to the whole file. A path that does not exist returns
    /// `None`; the caller decides whether that is an error (`required`
    /// sections) or a skip.
    pub fn resolve(&self, path: &str) -> Option<LineRange> {
        if path == "." {
            return if self.total_lines == 0 {
                None
            } else {
                Some(LineRange::new(1, self.total_lines))
            };
        }

        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.roots.iter().find(|n| n.key == first)?;
        for segment in segments {
            node = node.child(segment)?;
        }
        Some(node.range())
    }
}

/// Parse indentation-structured text into a [`DocumentTree`].
pub fn parse_document(content: &str) -> Result<DocumentTree, DocumentError> {
    let total_lines = content.lines().count();
    let mut roots: Vec<DocumentNode> = Vec::new();
    // Chain of indices from `roots` down to the currently open node.
    let mut stack: Vec<usize> = Vec::new();
    // Indent of the innermost sequence item, when the open node holds one.
    let mut sequence_floor: Option<usize> = None;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = raw_line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = raw_line.len() - trimmed.len();
        if raw_line[..indent].contains('\t') {
            return Err(DocumentError::Parse {
                line: line_no,
                message: "tab indentation is not supported".to_string(),
            });
        }
        if trimmed.starts_with("---") {
            // Document marker.
            continue;
        }

        // Content inside a sequence item extends spans but opens no nodes.
        if let Some(floor) = sequence_floor {
            if indent > floor {
                extend_open_nodes(&mut roots, &stack, line_no);
                continue;
            }
        }

        // Close nodes that this line is not nested under.
        while let Some(open) = stack.last().copied() {
            let open_indent = node_at(&roots, &stack[..stack.len() - 1], open).indent;
            if open_indent >= indent {
                stack.pop();
                sequence_floor = None;
            } else {
                break;
            }
        }

        if trimmed.starts_with('-') && (trimmed == "-" || trimmed[1..].starts_with(' ')) {
            if stack.is_empty() {
                return Err(DocumentError::Parse {
                    line: line_no,
                    message: "sequence item outside any mapping".to_string(),
                });
            }
            sequence_floor = Some(indent);
            extend_open_nodes(&mut roots, &stack, line_no);
            continue;
        }

        let key = match split_key(trimmed) {
            Some(key) => key,
            None => {
                return Err(DocumentError::Parse {
                    line: line_no,
                    message: format!("expected 'key:' mapping entry, found {trimmed:?}"),
                });
            }
        };

        sequence_floor = None;
        extend_open_nodes(&mut roots, &stack, line_no);
        let node = DocumentNode {
            key,
            start_line: line_no,
            end_line: line_no,
            indent,
            children: Vec::new(),
        };
        let siblings = match stack.last().copied() {
            Some(open) => {
                let parent = node_at_mut(&mut roots, &stack[..stack.len() - 1], open);
                &mut parent.children
            }
            None => &mut roots,
        };
        siblings.push(node);
        stack.push(siblings.len() - 1);
    }

    Ok(DocumentTree { roots, total_lines })
}

/// Extract the mapping key from a `key:` or `key: value` line.
///
/// The delimiter is the first `:` outside quotes that ends the line or is
/// followed by whitespace; a `:` glued to more content (a URL, a time) is
/// part of a scalar and means the line is not a mapping entry.
fn split_key(line: &str) -> Option<String> {
    let bytes = line.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) => {
                if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'#' => return None,
                b':' => {
                    let followed_ok =
                        i + 1 == bytes.len() || bytes[i + 1] == b' ' || bytes[i + 1] == b'\t';
                    if !followed_ok {
                        return None;
                    }
                    let key = line[..i].trim().trim_matches(|c| c == '"' || c == '\'');
                    if key.is_empty() {
                        return None;
                    }
                    return Some(key.to_string());
                }
                _ => {}
            },
        }
    }
    None
}

fn extend_open_nodes(roots: &mut [DocumentNode], stack: &[usize], line_no: usize) {
    let mut nodes = roots;
    for &index in stack {
        let node = &mut nodes[index];
        node.end_line = node.end_line.max(line_no);
        nodes = &mut node.children;
    }
}

fn node_at<'a>(roots: &'a [DocumentNode], prefix: &[usize], index: usize) -> &'a DocumentNode {
    let mut nodes = roots;
    for &i in prefix {
        nodes = &nodes[i].children;
    }
    &nodes[index]
}

fn node_at_mut<'a>(
    roots: &'a mut [DocumentNode],
    prefix: &[usize],
    index: usize,
) -> &'a mut DocumentNode {
    let mut nodes = roots;
    for &i in prefix {
        nodes = &mut nodes[i].children;
    }
    &mut nodes[index]
}
