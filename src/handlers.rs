pub mod catalog;
pub mod pricing;
pub mod tier_rules;
