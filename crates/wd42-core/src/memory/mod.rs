pub mod layout;
mod process;
mod reader;

// Mock memory reader for unit tests, and for integration tests through `test-utils`
#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub mod mock;

pub use process::*;
pub use reader::{MemoryRegion, Protection, QueryMemory, ReadMemory};

#[cfg(any(test, feature = "test-utils"))]
#[doc(hidden)]
pub use mock::{MockMemoryBuilder, MockMemoryReader};
