pub mod cv;
pub mod dataset;
pub mod export;
pub mod grading;
pub mod http_client;
pub mod markets;
pub mod model;
pub mod postgrest;
pub mod retry;
pub mod rollup;
pub mod scores_fetch;
pub mod store;
