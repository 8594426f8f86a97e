//! Resolution of configured sections against a concrete file.

use thiserror::Error;

use crate::config::SectionDefinition;
use crate::document::DocumentTree;
use crate::lines::LineRange;

/// A [`SectionDefinition`] resolved against one file: the definition, the
/// exact line range its path expression selected, and the raw content
/// slice of that range.
#[derive(Debug, Clone)]
pub struct SectionInstance<'a> {
    pub definition: &'a SectionDefinition,
    pub range: LineRange,
    pub content: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SectionError {
    #[error("required section '{section}' did not resolve (path '{path}')")]
    RequiredMissing { section: String, path: String },

    #[error("sections '{first}' and '{second}' resolve to overlapping line ranges")]
    Overlap { first: String, second: String },
}

/// Resolve the enabled section definitions of a file rule against a parsed
/// document.
///
/// Sections whose path does not resolve are skipped unless `required`;
/// overlapping resolutions are a configuration error and fail the file.
pub fn resolve_sections<'a>(
    tree: &DocumentTree,
    content: &str,
    definitions: &'a [SectionDefinition],
) -> Result<Vec<SectionInstance<'a>>, SectionError> {
    let mut instances: Vec<SectionInstance<'a>> = Vec::new();

    for definition in definitions {
        let Some(range) = tree.resolve(&definition.yaml_path) else {
            if definition.required {
                return Err(SectionError::RequiredMissing {
                    section: definition.name.clone(),
                    path: definition.yaml_path.clone(),
                });
            }
            continue;
        };

        for existing in &instances {
            if existing.range.intersect(&range).is_some() {
                return Err(SectionError::Overlap {
                    first: existing.definition.name.clone(),
                    second: definition.name.clone(),
                });
            }
        }

        instances.push(SectionInstance {
            definition,
            range,
            content: slice_lines(content, range),
        });
    }

    Ok(instances)
}

/// Extract the text of a 1-based inclusive line range.
fn slice_lines(content: &str, range: LineRange) -> String {
    content
        .lines()
        .skip(range.start - 1)
        .take(range.len())
        .collect::<Vec<_>>()
        .join("\n")
}
