//! OpenAPI schema generator
//!
//! Generates the OpenAPI JSON document without starting the daemon or
//! touching the network, so the manually maintained schema (frozen for CI/
//! "any spec generator must preserve the existing endpoint shapes and tag
//! ordering verbatim") can be frozen in the repository for CI and client
//! generation.

use utoipa::OpenApi;
use zxdaemon::api::routes::ApiDoc;

fn main() {
    let openapi = ApiDoc::openapi();

    let json = serde_json::to_string_pretty(&openapi).expect("failed to serialize OpenAPI document");

    let output_path = std::env::args().nth(1).unwrap_or_else(|| "openapi.json".to_string());

    std::fs::write(&output_path, json)
        .unwrap_or_else(|e| panic!("failed to write OpenAPI document to {}: {}", output_path, e));

    eprintln!("OpenAPI document written to {}", output_path);
}
