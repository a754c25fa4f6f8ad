pub mod domain;
pub mod http;
pub mod onboarding_api;

pub use domain::*;
pub use http::*;
pub use onboarding_api::*;
