pub mod heap;
pub(in crate::storage) mod utils;
