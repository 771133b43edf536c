//! Book library client core.
//!
//! Layers: `domain` (models, filter, gateway trait) → `application` (query
//! cache, debounced search, forms, mutations) → `infra` (reqwest gateway) →
//! `interface` (MCP stdio server).

pub mod config;

pub mod domain {
    pub mod error;
    pub mod filter;
    pub mod gateway;

    pub mod model {
        pub mod book;
        pub mod id;
        pub mod metadata;
    }
}

pub mod application {
    pub mod cache;
    pub mod debounce;
    pub mod error;
    pub mod form;
    pub mod library;
    pub mod search;
    pub mod service;
}

pub mod infra {
    pub mod http_gateway;
}

pub mod interface {
    pub mod mcp;
}
