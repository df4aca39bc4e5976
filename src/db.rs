pub mod store;
pub use store::{CatalogStore, PricingStore};
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod pricing_repo;
pub use pricing_repo::PricingRepository;

#[cfg(test)]
pub mod memory;
