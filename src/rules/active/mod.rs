//! Built-in active scan rules.

pub mod get_for_post;
pub mod php_cgi_rce;

pub use get_for_post::GetForPostRule;
pub use php_cgi_rce::PhpCgiRceRule;
