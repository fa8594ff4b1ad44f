//! Line-oriented assembly of a model source file into a registry.
//!
//! The published model code is one equation per line, with `'` comment
//! lines, continuation lines (an equation is complete once its
//! parentheses balance), `@ADD` directives (ignored) and, in this
//! rendition, `@group <name>` directives assigning subsequent equations
//! to a topical group.

use super::{Group, Registry, RegistryError};
use crate::parse::ParseError;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Also parse behavioral equations that were commented out in the
    /// source as `'dlog(...)` / `'d(...)`. The published code ships them
    /// disabled; shock transmission needs them active.
    pub include_behavioral: bool,
}

fn balanced(s: &str) -> bool {
    let open = s.bytes().filter(|&b| b == b'(').count();
    let close = s.bytes().filter(|&b| b == b')').count();
    open == close
}

impl Registry {
    pub fn from_path(path: &Path, opts: &SourceOptions) -> Result<Registry, RegistryError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_source(&text, opts)
    }

    /// Parses a whole model file. Any parse failure aborts construction;
    /// a partially built registry is never returned.
    pub fn from_source(text: &str, opts: &SourceOptions) -> Result<Registry, RegistryError> {
        let mut registry = Registry::new();
        let mut group = Group::Output;
        let mut pending: Option<(String, u32)> = None;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx as u32 + 1;
            let mut line = raw.trim();

            if let Some(stripped) = line.strip_prefix('\'') {
                let stripped = stripped.trim_start();
                let reenable = opts.include_behavioral
                    && (stripped.starts_with("dlog(") || stripped.starts_with("d("));
                if reenable {
                    line = stripped;
                } else {
                    continue;
                }
            }
            // Inline comment.
            let line = match line.find('\'') {
                Some(p) => line[..p].trim_end(),
                None => line,
            };
            if line.is_empty() {
                continue;
            }

            if pending.is_none() {
                let lowered = line.to_ascii_lowercase();
                if let Some(rest) = lowered.strip_prefix("@group") {
                    let name = rest.trim();
                    group = Group::parse(name).ok_or_else(|| RegistryError::UnknownGroup {
                        line: line_no,
                        name: name.to_string(),
                    })?;
                    continue;
                }
                if lowered.starts_with("@add") {
                    continue;
                }
            }

            let (mut acc, first) = pending.take().unwrap_or_else(|| (String::new(), line_no));
            if !acc.is_empty() {
                acc.push(' ');
            }
            acc.push_str(line);

            if balanced(&acc) {
                let parsed = registry.parse_line_numbered(&acc, first)?;
                registry.push(group, parsed)?;
            } else {
                pending = Some((acc, first));
            }
        }

        if let Some((_, first)) = pending {
            return Err(ParseError::Syntax {
                line: first,
                msg: "unbalanced parentheses at end of input".into(),
            }
            .into());
        }

        Ok(registry)
    }

    fn parse_line_numbered(
        &mut self,
        text: &str,
        line: u32,
    ) -> Result<crate::parse::ParsedEquation, ParseError> {
        crate::parse::parse_equation(text, line, self.symbols_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{Form, Role};
    use std::io::Write;

    const SOURCE: &str = "\
' Small demand-side block.
@group consumption
CONS = 100 + 0.6 * YD

@group income
YD = GDPM - TAX
TAX = 0.25 * GDPM

@group gdp
GDPM = CONS + IF + CGG + DINV + (X
    - M)
'dlog(IF) = 0.01 + 0.2 * dlog(GDPM(-1))
@ADD CONS residual_item
";

    #[test]
    fn assembles_groups_comments_and_continuations() {
        let registry = Registry::from_source(SOURCE, &SourceOptions::default()).unwrap();
        assert_eq!(registry.len(), 4);

        let gdpm = registry.symbols().resolve("GDPM").unwrap();
        let id = registry.equation_for(gdpm).unwrap();
        let eq = &registry.equations()[id.index()];
        assert_eq!(eq.group, Group::Gdp);
        // The continuation joined both physical lines.
        assert_eq!(eq.parsed.reads.len(), 6);
        assert_eq!(eq.parsed.line, 10);
    }

    #[test]
    fn include_behavioral_reenables_commented_equations() {
        let opts = SourceOptions { include_behavioral: true };
        let registry = Registry::from_source(SOURCE, &opts).unwrap();
        assert_eq!(registry.len(), 5);

        let ifv = registry.symbols().resolve("IF").unwrap();
        let id = registry.equation_for(ifv).unwrap();
        let eq = &registry.equations()[id.index()];
        assert_eq!(eq.parsed.form, Form::LogDiff);
        assert_eq!(eq.parsed.role, Role::Behavioral);
    }

    #[test]
    fn parse_failure_aborts_construction() {
        let bad = "CONS = 100 + 0.6 * YD\nGDPM = CONS +\n";
        let err = Registry::from_source(bad, &SourceOptions::default()).unwrap_err();
        assert!(matches!(err, RegistryError::Parse(_)));
    }

    #[test]
    fn unknown_group_is_located() {
        let bad = "@group weather\nRAIN = 1";
        match Registry::from_source(bad, &SourceOptions::default()).unwrap_err() {
            RegistryError::UnknownGroup { line, name } => {
                assert_eq!(line, 1);
                assert_eq!(name, "weather");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unterminated_continuation_is_an_error() {
        let bad = "GDPM = CONS + (IF\n";
        assert!(Registry::from_source(bad, &SourceOptions::default()).is_err());
    }

    #[test]
    fn from_path_reads_a_model_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SOURCE.as_bytes()).unwrap();
        let registry = Registry::from_path(file.path(), &SourceOptions::default()).unwrap();
        assert_eq!(registry.len(), 4);
    }
}
