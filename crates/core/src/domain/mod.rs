pub mod request;
pub mod strategy;
pub mod template;
