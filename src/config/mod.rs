pub mod page;
pub mod settings;

pub use page::*;
pub use settings::*;
