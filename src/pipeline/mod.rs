pub mod extraction;
pub mod validation;
