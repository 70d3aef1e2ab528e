mod pattern;
mod scanner;
mod signature;

pub use pattern::*;
pub use scanner::*;
pub use signature::*;
