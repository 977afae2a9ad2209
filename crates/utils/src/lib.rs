pub mod assets;
pub mod logging;
pub mod response;
pub mod template;
pub mod text;
