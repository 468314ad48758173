pub mod alert;
pub mod context;
pub mod http;
pub mod site;
pub mod tech;
