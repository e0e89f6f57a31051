pub mod config;
pub mod dom;
pub mod error;
pub mod liveness;
pub mod merger;
pub mod minimize;
pub mod pruner;
pub mod reachability;
pub mod registry;
pub mod snapshot;

pub mod parser {
    pub mod dom_indices;
    pub mod html;
}

pub mod style {
    pub mod codec;
    pub mod css_matcher;
    pub mod owned_css;
    pub mod selector_utils;
    pub mod urls;
}

pub use config::TrimOptions;
pub use error::{TrimError, UnsupportedSelector};
pub use minimize::{minimize, prune_parsed, TrimInput, TrimOutput};
pub use registry::HrefRegistry;
pub use snapshot::{DomSnapshot, HtmlSnapshot};
