//! `//name args` directives embedded in user input.

mod builtin;

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::session::Session;

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*//([A-Za-z][\w-]*)(?:\s+(.*))?\s*$").expect("directive regex must compile")
});

/// What a directive produced. Handlers are synchronous; work that needs the
/// runtime is handed back to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveOutput {
    Text(String),
    /// Re-run the tool pipeline and re-attach the result.
    ReloadTools,
}

impl From<String> for DirectiveOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

/// A handler receives the trimmed argument text.
pub type DirectiveHandler = fn(&str, &mut Session) -> DirectiveOutput;

#[derive(Clone, Copy)]
pub struct Directive {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub usage: &'static str,
    pub summary: &'static str,
    pub handler: DirectiveHandler,
}

/// Split `//name args` into a lowercased name and trimmed arguments.
pub fn parse(input: &str) -> Option<(String, String)> {
    let caps = DIRECTIVE_RE.captures(input)?;
    let name = caps.get(1)?.as_str().to_ascii_lowercase();
    let args = caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default();
    Some((name, args.to_string()))
}

/// Name → handler table, built once per session.
#[derive(Default)]
pub struct DirectiveRegistry {
    directives: Vec<Directive>,
    index: HashMap<&'static str, usize>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in directive.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for directive in builtin::DIRECTIVES {
            registry.register(*directive);
        }
        registry
    }

    /// Add a directive. A later registration of the same name wins.
    pub fn register(&mut self, directive: Directive) {
        let slot = self.directives.len();
        self.index.insert(directive.name, slot);
        for alias in directive.aliases {
            self.index.insert(*alias, slot);
        }
        self.directives.push(directive);
    }

    pub fn lookup(&self, name: &str) -> Option<DirectiveHandler> {
        self.index.get(name).map(|&i| self.directives[i].handler)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn help(&self) -> String {
        let mut lines = vec!["Directives:".to_string()];
        for d in &self.directives {
            let aliases = if d.aliases.is_empty() {
                String::new()
            } else {
                format!(" (alias: {})", d.aliases.iter().map(|a| format!("//{a}")).collect::<Vec<_>>().join(", "))
            };
            lines.push(format!("  {:<26} {}{aliases}", d.usage, d.summary));
        }
        lines.join("\n")
    }
}

impl std::fmt::Debug for DirectiveRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.directives.iter().map(|d| d.name))
            .finish()
    }
}

pub fn unknown_directive(name: &str) -> String {
    format!("Unknown directive '//{name}'. Type //help for available directives.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_name_and_args() {
        assert_eq!(parse("//checkpoint  before refactor "), Some(("checkpoint".into(), "before refactor".into())));
        assert_eq!(parse("//Restore"), Some(("restore".into(), String::new())));
        assert_eq!(parse("  //clear all\n"), Some(("clear".into(), "all".into())));
    }

    #[test]
    fn plain_text_is_not_a_directive() {
        assert_eq!(parse("what is //checkpoint?"), None);
        assert_eq!(parse("// just a comment"), None);
        assert_eq!(parse("https://example.com"), None);
    }

    #[test]
    fn builtin_registry_resolves_aliases() {
        let registry = DirectiveRegistry::builtin();
        assert!(registry.contains("checkpoint"));
        assert!(registry.contains("ckp"));
        assert!(registry.contains("context"));
        assert!(registry.lookup("nope").is_none());
        assert!(registry.help().contains("//restore [name]"));
    }
}
