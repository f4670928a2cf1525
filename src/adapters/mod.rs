// Adapters layer: concrete implementations for external systems (HTTP, GraphQL, HTML, storage).

pub mod devpost;
pub mod enrichment;
pub mod graphql;
pub mod http;
pub mod profile_links;
pub mod storage;
