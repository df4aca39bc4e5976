pub mod variant_keys;
pub mod image_grouping;
pub mod variant_matrix;
pub mod tier_pricing;

pub mod catalog_service;
pub use catalog_service::CatalogService;
pub mod pricing_service;
pub use pricing_service::PricingService;
pub mod tier_rule_service;
pub use tier_rule_service::TierRuleService;
