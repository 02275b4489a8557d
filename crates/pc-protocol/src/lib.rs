pub mod command;
pub mod entity;
pub mod intent;
pub mod resolution;
pub mod utterance;

pub use command::*;
pub use entity::*;
pub use intent::*;
pub use resolution::*;
pub use utterance::*;
