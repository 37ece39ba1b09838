//! DTO for the double meta refresh bridge.

use serde::Deserialize;

/// Query parameters for `GET /bridge`.
#[derive(Debug, Deserialize)]
pub struct BridgeQuery {
    pub to: String,
    pub sig: String,
}
