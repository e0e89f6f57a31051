use crate::error::TrimError;
use regex::Regex;

/// Options of one pruning run.
#[derive(Debug, Clone)]
pub struct TrimOptions {
    /// Selectors matching any of these are kept without consulting a snapshot.
    pub whitelist: Vec<Regex>,
    /// Drop malformed rules with a warning instead of failing the run.
    pub ignore_css_errors: bool,
    /// Collapse identical `/*! ... */` comments when lifting them to the front.
    pub dedupe_important_comments: bool,
    /// Resolve relative `url()` references against their stylesheet URL.
    pub rewrite_relative_urls: bool,
    /// Log selectors the snapshots cannot evaluate at warn level.
    pub debug: bool,
}

impl Default for TrimOptions {
    fn default() -> Self {
        TrimOptions {
            whitelist: Vec::new(),
            ignore_css_errors: false,
            dedupe_important_comments: false,
            rewrite_relative_urls: true,
            debug: false,
        }
    }
}

impl TrimOptions {
    /// Compiles `patterns` into the whitelist, failing on the first invalid one.
    pub fn with_whitelist<I, S>(mut self, patterns: I) -> Result<Self, TrimError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let regex = Regex::new(pattern).map_err(|source| TrimError::InvalidWhitelist {
                pattern: pattern.to_string(),
                source,
            })?;
            self.whitelist.push(regex);
        }
        Ok(self)
    }
}
