//! The directive model: one typed entry in a manifest.
//!
//! Directives are a tagged variant over the manifest verbs rather than
//! a class hierarchy; the per-phase effect tables live in the engine
//! where they can be matched exhaustively.

use std::fmt;
use std::path::PathBuf;

/// Verb class of a directive. Fixed at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Name,
    Author,
    Version,
    From,
    Env,
    Run,
    Jexec,
    Add,
    Volume,
    Entrypoint,
    Nop,
}

impl DirectiveKind {
    /// Look up a manifest verb (case-insensitive) in the fixed registry.
    ///
    /// `Nop` has no verb; it exists only as a neutral placeholder.
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb.to_ascii_lowercase().as_str() {
            "name" => Some(DirectiveKind::Name),
            "author" => Some(DirectiveKind::Author),
            "version" => Some(DirectiveKind::Version),
            "from" => Some(DirectiveKind::From),
            "env" => Some(DirectiveKind::Env),
            "run" => Some(DirectiveKind::Run),
            "jexec" => Some(DirectiveKind::Jexec),
            "add" => Some(DirectiveKind::Add),
            "volume" => Some(DirectiveKind::Volume),
            "entrypoint" => Some(DirectiveKind::Entrypoint),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveKind::Name => "NAME",
            DirectiveKind::Author => "AUTHOR",
            DirectiveKind::Version => "VERSION",
            DirectiveKind::From => "FROM",
            DirectiveKind::Env => "ENV",
            DirectiveKind::Run => "RUN",
            DirectiveKind::Jexec => "JEXEC",
            DirectiveKind::Add => "ADD",
            DirectiveKind::Volume => "VOLUME",
            DirectiveKind::Entrypoint => "ENTRYPOINT",
            DirectiveKind::Nop => "NOP",
        }
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One base flavour reference in a FROM directive.
///
/// The version suffix (`name:version`) parses but is never resolved;
/// flavour versioning is advisory until a resolution scheme exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FromRef {
    pub name: String,
    pub version: Option<String>,
}

impl FromRef {
    fn parse(raw: &str) -> Self {
        match raw.split_once(':') {
            Some((name, version)) => FromRef {
                name: name.to_string(),
                version: Some(version.to_string()),
            },
            None => FromRef {
                name: raw.to_string(),
                version: None,
            },
        }
    }
}

/// Kind-specific parsed payload of a directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Name(String),
    Author(String),
    Version(String),
    From(Vec<FromRef>),
    Env { key: String, value: String },
    Run(String),
    Jexec { command: String, ignore_errors: bool },
    Add { source: PathBuf, dest: PathBuf },
    Volume { source: PathBuf, dest: PathBuf },
    Entrypoint(String),
    Nop,
}

impl Action {
    /// Parse the text after the verb into a kind-specific payload.
    ///
    /// Returns a bare message on failure; the parser attaches line
    /// context.
    pub fn parse(kind: DirectiveKind, rest: &str) -> std::result::Result<Self, String> {
        match kind {
            DirectiveKind::Name => Ok(Action::Name(require_value(kind, rest)?)),
            DirectiveKind::Author => Ok(Action::Author(require_value(kind, rest)?)),
            DirectiveKind::Version => Ok(Action::Version(require_value(kind, rest)?)),
            DirectiveKind::From => {
                let refs: Vec<FromRef> = rest.split_whitespace().map(FromRef::parse).collect();
                if refs.is_empty() {
                    return Err("FROM requires at least one base flavour".to_string());
                }
                Ok(Action::From(refs))
            }
            DirectiveKind::Env => {
                let (key, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "ENV requires a key and a value".to_string())?;
                Ok(Action::Env {
                    key: key.to_string(),
                    value: value.trim_start().to_string(),
                })
            }
            DirectiveKind::Run => Ok(Action::Run(require_value(kind, rest)?)),
            DirectiveKind::Jexec => {
                let (command, ignore_errors) = match rest.strip_prefix("-o") {
                    Some(tail) if tail.is_empty() || tail.starts_with(char::is_whitespace) => {
                        (tail.trim_start(), true)
                    }
                    _ => (rest, false),
                };
                if command.is_empty() {
                    return Err("JEXEC requires a command".to_string());
                }
                Ok(Action::Jexec {
                    command: command.to_string(),
                    ignore_errors,
                })
            }
            DirectiveKind::Add => {
                let (source, dest) = two_paths(kind, rest)?;
                Ok(Action::Add { source, dest })
            }
            DirectiveKind::Volume => {
                let (source, dest) = two_paths(kind, rest)?;
                Ok(Action::Volume { source, dest })
            }
            DirectiveKind::Entrypoint => Ok(Action::Entrypoint(require_value(kind, rest)?)),
            DirectiveKind::Nop => Ok(Action::Nop),
        }
    }
}

fn require_value(kind: DirectiveKind, rest: &str) -> std::result::Result<String, String> {
    if rest.is_empty() {
        return Err(format!("{kind} requires a value"));
    }
    Ok(rest.to_string())
}

/// Split into exactly two whitespace-separated paths. Paths with
/// unescaped spaces are not supported.
fn two_paths(
    kind: DirectiveKind,
    rest: &str,
) -> std::result::Result<(PathBuf, PathBuf), String> {
    let mut tokens = rest.split_whitespace();
    let (Some(source), Some(dest), None) = (tokens.next(), tokens.next(), tokens.next()) else {
        return Err(format!("{kind} requires exactly a source and a destination path"));
    };
    Ok((PathBuf::from(source), PathBuf::from(dest)))
}

/// A single parsed manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    position: usize,
    raw: String,
    action: Action,
}

impl Directive {
    /// Build a directive from a verb kind and the unsplit remainder of
    /// its line. `position` is the index in the owning manifest and is
    /// immutable from here on.
    pub fn new(
        kind: DirectiveKind,
        rest: &str,
        position: usize,
    ) -> std::result::Result<Self, String> {
        let action = Action::parse(kind, rest)?;
        Ok(Directive {
            position,
            raw: rest.to_string(),
            action,
        })
    }

    pub fn kind(&self) -> DirectiveKind {
        match self.action {
            Action::Name(_) => DirectiveKind::Name,
            Action::Author(_) => DirectiveKind::Author,
            Action::Version(_) => DirectiveKind::Version,
            Action::From(_) => DirectiveKind::From,
            Action::Env { .. } => DirectiveKind::Env,
            Action::Run(_) => DirectiveKind::Run,
            Action::Jexec { .. } => DirectiveKind::Jexec,
            Action::Add { .. } => DirectiveKind::Add,
            Action::Volume { .. } => DirectiveKind::Volume,
            Action::Entrypoint(_) => DirectiveKind::Entrypoint,
            Action::Nop => DirectiveKind::Nop,
        }
    }

    /// 0-based index in the owning manifest (file order).
    pub fn position(&self) -> usize {
        self.position
    }

    /// The text after the verb, unsplit.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    /// Whether a non-zero status from this directive should be logged
    /// and skipped instead of halting the phase. Only the runtime
    /// command form supports the flag.
    pub fn ignore_errors(&self) -> bool {
        matches!(
            self.action,
            Action::Jexec {
                ignore_errors: true,
                ..
            }
        )
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(DirectiveKind::from_verb("RUN"), Some(DirectiveKind::Run));
        assert_eq!(DirectiveKind::from_verb("run"), Some(DirectiveKind::Run));
        assert_eq!(DirectiveKind::from_verb("Run"), Some(DirectiveKind::Run));
        assert_eq!(DirectiveKind::from_verb("bogus"), None);
        assert_eq!(DirectiveKind::from_verb("nop"), None);
    }

    #[test]
    fn env_splits_on_first_whitespace_only() {
        let action = Action::parse(DirectiveKind::Env, "GREETING hello world").expect("parse");
        assert_eq!(
            action,
            Action::Env {
                key: "GREETING".to_string(),
                value: "hello world".to_string(),
            }
        );
    }

    #[test]
    fn env_without_value_is_rejected() {
        let err = Action::parse(DirectiveKind::Env, "ONLY_KEY").unwrap_err();
        assert!(err.contains("key and a value"));
    }

    #[test]
    fn from_parses_optional_versions() {
        let action = Action::parse(DirectiveKind::From, "base extras:1.2").expect("parse");
        let Action::From(refs) = action else {
            panic!("expected From action");
        };
        assert_eq!(refs[0].name, "base");
        assert_eq!(refs[0].version, None);
        assert_eq!(refs[1].name, "extras");
        assert_eq!(refs[1].version.as_deref(), Some("1.2"));
    }

    #[test]
    fn add_requires_exactly_two_paths() {
        assert!(Action::parse(DirectiveKind::Add, "only_one").is_err());
        assert!(Action::parse(DirectiveKind::Add, "a b c").is_err());
        let action = Action::parse(DirectiveKind::Add, "src/app /opt/app").expect("parse");
        assert_eq!(
            action,
            Action::Add {
                source: PathBuf::from("src/app"),
                dest: PathBuf::from("/opt/app"),
            }
        );
    }

    #[test]
    fn jexec_strips_leading_ignore_flag() {
        let action = Action::parse(DirectiveKind::Jexec, "-o rm /tmp/scratch").expect("parse");
        assert_eq!(
            action,
            Action::Jexec {
                command: "rm /tmp/scratch".to_string(),
                ignore_errors: true,
            }
        );
    }

    #[test]
    fn jexec_dash_o_prefix_must_be_a_token() {
        // "-obscure" is a command, not the flag.
        let action = Action::parse(DirectiveKind::Jexec, "-obscure-tool --flag").expect("parse");
        assert_eq!(
            action,
            Action::Jexec {
                command: "-obscure-tool --flag".to_string(),
                ignore_errors: false,
            }
        );
    }

    #[test]
    fn directive_displays_like_manifest_text() {
        let directive = Directive::new(DirectiveKind::Env, "KEY value", 3).expect("directive");
        assert_eq!(directive.to_string(), "ENV KEY value");
        assert_eq!(directive.position(), 3);
        assert_eq!(directive.raw(), "KEY value");
    }
}
