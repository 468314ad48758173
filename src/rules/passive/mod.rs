//! Built-in passive scan rules.

pub mod cross_domain_script;
pub mod hash_disclosure;
pub mod info_disclosure_url;

pub use cross_domain_script::CrossDomainScriptRule;
pub use hash_disclosure::HashDisclosureRule;
pub use info_disclosure_url::InfoDisclosureInUrlRule;
