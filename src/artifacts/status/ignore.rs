//! Ignore rules
//!
//! A subset of gitignore: `*`, `**`, `?`, `[...]` classes, leading `/` anchors,
//! trailing `/` for directories, `!` negation and `#` comments. Patterns are
//! compiled to regular expressions matched against `/`-separated relative paths.

use crate::config::EngineConfig;
use crate::errors::{Error, IoContext, Result};
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone)]
struct IgnoreRule {
    regex: Regex,
    negated: bool,
    directory_only: bool,
}

impl IgnoreRule {
    fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = match line.strip_suffix("\\ ") {
            Some(stripped) => format!("{stripped} "),
            None => line.trim_end().to_string(),
        };
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (negated, pattern) = match line.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, line.strip_prefix('\\').unwrap_or(&line)),
        };
        let (directory_only, pattern) = match pattern.strip_suffix('/') {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        if pattern.is_empty() {
            return Ok(None);
        }

        let anchored = pattern.contains('/');
        let pattern = pattern.strip_prefix('/').unwrap_or(pattern);

        let mut expression = String::from("^");
        if !anchored {
            expression.push_str("(?:.*/)?");
        }
        expression.push_str(&translate(pattern));
        expression.push('$');

        let regex = Regex::new(&expression)
            .map_err(|e| Error::invalid(format!("bad ignore pattern {line}: {e}")))?;

        Ok(Some(IgnoreRule {
            regex,
            negated,
            directory_only,
        }))
    }

    fn matches(&self, path: &str, is_dir: bool) -> bool {
        (!self.directory_only || is_dir) && self.regex.is_match(path)
    }
}

fn translate(pattern: &str) -> String {
    let chars = pattern.chars().collect::<Vec<_>>();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' if chars.get(i + 1) == Some(&'*') => {
                let at_start = i == 0 || chars[i - 1] == '/';
                match chars.get(i + 2) {
                    Some('/') if at_start => {
                        out.push_str("(?:.*/)?");
                        i += 3;
                    }
                    None if at_start => {
                        out.push_str(".*");
                        i += 2;
                    }
                    _ => {
                        out.push_str("[^/]*");
                        i += 2;
                    }
                }
            }
            '*' => {
                out.push_str("[^/]*");
                i += 1;
            }
            '?' => {
                out.push_str("[^/]");
                i += 1;
            }
            '[' => match chars[i + 1..].iter().position(|c| *c == ']') {
                Some(offset) if offset > 0 => {
                    let class = &chars[i + 1..i + 1 + offset];
                    out.push('[');
                    for (n, c) in class.iter().enumerate() {
                        match c {
                            '!' if n == 0 => out.push('^'),
                            '\\' | '[' | '&' | '~' => {
                                out.push('\\');
                                out.push(*c);
                            }
                            c => out.push(*c),
                        }
                    }
                    out.push(']');
                    i += offset + 2;
                }
                _ => {
                    out.push_str("\\[");
                    i += 1;
                }
            },
            '\\' if i + 1 < chars.len() => {
                out.push_str(&regex::escape(&chars[i + 1].to_string()));
                i += 2;
            }
            c => {
                out.push_str(&regex::escape(&c.to_string()));
                i += 1;
            }
        }
    }

    out
}

/// Ordered rule set; the last matching rule decides
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rules of the root ignore file followed by the configured extra patterns
    pub fn load(workspace_root: &Path, config: &EngineConfig) -> Result<Self> {
        let mut rules = Self::new();
        let ignore_path = workspace_root.join(&config.ignore_file);

        if ignore_path.is_file() {
            let content = std::fs::read_to_string(&ignore_path)
                .with_io_context(|| format!("Unable to read {}", ignore_path.display()))?;
            for line in content.lines() {
                rules.add_pattern(line)?;
            }
        }
        for pattern in &config.extra_ignore_patterns {
            rules.add_pattern(pattern)?;
        }

        tracing::debug!(rules = rules.rules.len(), "loaded ignore rules");
        Ok(rules)
    }

    pub fn add_pattern(&mut self, line: &str) -> Result<()> {
        if let Some(rule) = IgnoreRule::parse(line)? {
            self.rules.push(rule);
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether `path` is ignored, either directly or through an ignored ancestor directory
    pub fn is_ignored(&self, path: &Path, is_dir: bool) -> bool {
        if self.rules.is_empty() {
            return false;
        }

        let ancestors = path
            .ancestors()
            .skip(1)
            .filter(|ancestor| !ancestor.as_os_str().is_empty())
            .collect::<Vec<_>>();
        if ancestors
            .iter()
            .rev()
            .any(|ancestor| self.matches(ancestor, true))
        {
            return true;
        }

        self.matches(path, is_dir)
    }

    fn matches(&self, path: &Path, is_dir: bool) -> bool {
        let path = path.to_string_lossy();
        let path = path.trim_end_matches('/');

        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matches(path, is_dir))
            .is_some_and(|rule| !rule.negated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn rules(patterns: &[&str]) -> IgnoreRules {
        let mut rules = IgnoreRules::new();
        for pattern in patterns {
            rules.add_pattern(pattern).unwrap();
        }
        rules
    }

    #[rstest]
    #[case(&["*.log"], "debug.log", false, true)]
    #[case(&["*.log"], "nested/dir/debug.log", false, true)]
    #[case(&["*.log", "!keep.log"], "keep.log", false, false)]
    #[case(&["/build"], "build", true, true)]
    #[case(&["/build"], "src/build", true, false)]
    #[case(&["target/"], "target", false, false)]
    #[case(&["target/"], "target", true, true)]
    #[case(&["target/"], "target/debug/app", false, true)]
    #[case(&["docs/**/*.tmp"], "docs/a/b/c.tmp", false, true)]
    #[case(&["docs/**/*.tmp"], "docs/c.tmp", false, true)]
    #[case(&["**/cache"], "deep/cache", true, true)]
    #[case(&["file?.txt"], "file1.txt", false, true)]
    #[case(&["file?.txt"], "file10.txt", false, false)]
    #[case(&["[!a]*.c"], "b.c", false, true)]
    #[case(&["[!a]*.c"], "a.c", false, false)]
    #[case(&["# comment", ""], "# comment", false, false)]
    #[case(&["\\#hash"], "#hash", false, true)]
    fn gitignore_subset(
        #[case] patterns: &[&str],
        #[case] path: &str,
        #[case] is_dir: bool,
        #[case] ignored: bool,
    ) {
        assert_eq!(rules(patterns).is_ignored(Path::new(path), is_dir), ignored);
    }
}
