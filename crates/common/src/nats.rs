mod client;
mod object_store;

pub use client::*;
pub use object_store::*;
