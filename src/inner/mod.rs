pub mod builder;
pub mod inner;
pub mod session;
pub mod value;

pub use builder::*;
pub use inner::*;
pub use session::*;
pub use value::*;
