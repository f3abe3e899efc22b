//! candi-tab/crates/ct-api/src/middleware.rs Middleware
//!
//! Access logging and CORS for the dashboard API.

use actix_cors::Cors;
use actix_web::middleware::Logger;

// remote-ip "request-line" status-code response-size "referrer" "user-agent"
pub fn standard_middleware() -> Logger {
    Logger::default()
}

// The new-tab page may be served by the browser extension host rather than
// by us, so any origin may call the API.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
        .allow_any_header()
        .max_age(3600)
}
