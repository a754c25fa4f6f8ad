mod client;
mod config;
mod person_repository;
mod unit_of_work;

pub use client::*;
pub use config::*;
pub use person_repository::*;
pub use unit_of_work::*;
