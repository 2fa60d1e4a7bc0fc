/// Reference vs emulated buffer comparison.
pub mod compare;
