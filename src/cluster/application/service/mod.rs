pub mod enrichment;
pub mod query_service;
