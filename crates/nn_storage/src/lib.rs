pub mod backends;

pub use backends::memory::MemoryStorage;
pub use nn_core::NewsStorage;

pub mod prelude {
    pub use super::backends::memory::MemoryStorage;
    pub use nn_core::{NewsStorage, Result};
}
