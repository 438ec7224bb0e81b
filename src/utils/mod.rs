pub mod input;
pub mod logging;
pub mod syntax;
pub mod url;
