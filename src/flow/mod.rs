pub mod conversion;
pub mod definition;
pub mod payload;

pub use conversion::*;
pub use definition::*;
pub use payload::*;
