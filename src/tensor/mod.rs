mod shape;

pub use shape::{Layout, Shape};
