pub mod error;
pub mod layout;
pub mod codec;
pub mod module_spec;
pub mod image;
pub mod locate;
pub mod extract;
pub mod enhance;
pub mod reader;
pub mod pipeline;
pub mod render;
