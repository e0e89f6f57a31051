use thiserror::Error;

/// Fatal (or, for `InvalidCss`, optionally recoverable) failures of a run.
#[derive(Debug, Error)]
pub enum TrimError {
    /// Discovered hrefs that were neither fetched, skipped nor redirected to something fetched.
    #[error("missing stylesheets: {}", hrefs.join(", "))]
    MissingStylesheets { hrefs: Vec<String> },

    #[error("invalid CSS in {href}: {reason} (in `{prelude}`)")]
    InvalidCss {
        href: String,
        prelude: String,
        reason: String,
    },

    #[error("redirect chain for {href} does not terminate: {}", chain.join(" -> "))]
    RedirectCycle { href: String, chain: Vec<String> },

    #[error("invalid whitelist pattern `{pattern}`")]
    InvalidWhitelist {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{message}")]
    Codec { message: String },
}

/// A snapshot could not evaluate a selector. Never leaves the reachability cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported selector `{selector}`: {reason}")]
pub struct UnsupportedSelector {
    pub selector: String,
    pub reason: String,
}

impl UnsupportedSelector {
    pub fn new(selector: &str, reason: impl Into<String>) -> Self {
        UnsupportedSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}
