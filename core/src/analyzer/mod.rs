pub mod checker;
pub mod error;


pub use checker::check;
pub use error::{CheckError, CheckErrorKind};
