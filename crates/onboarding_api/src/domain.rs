mod file_service;
mod onboarding_service;

pub use file_service::*;
pub use onboarding_service::*;
