mod object_store;
mod person;
mod result;
mod unit_of_work;

pub use object_store::*;
pub use person::*;
pub use result::*;
pub use unit_of_work::*;
