pub mod catalog;
pub mod pricing;
pub mod variants;
