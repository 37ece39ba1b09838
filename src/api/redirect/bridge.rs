//! Signed links to the double meta refresh bridge.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Error building a [`BridgeSigner`] at startup.
#[derive(Debug, thiserror::Error)]
pub enum BridgeSignerError {
    #[error("invalid public base url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("invalid signing key")]
    Key,
}

/// Builds and checks `/bridge?to=..&sig=..` links.
///
/// The signature is a hex HMAC-SHA256 of the destination, so the bridge only
/// forwards to destinations this service produced.
#[derive(Clone)]
pub struct BridgeSigner {
    mac: HmacSha256,
    bridge_url: url::Url,
}

impl BridgeSigner {
    pub fn new(secret: &str, public_base_url: &str) -> Result<Self, BridgeSignerError> {
        let mac =
            HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| BridgeSignerError::Key)?;
        let bridge_url = url::Url::parse(public_base_url)?.join("/bridge")?;
        Ok(Self { mac, bridge_url })
    }

    /// Hex signature of `destination`.
    pub fn sign(&self, destination: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(destination.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Absolute bridge link for `destination`.
    pub fn link(&self, destination: &str) -> String {
        let signature = self.sign(destination);
        let mut link = self.bridge_url.clone();
        link.query_pairs_mut()
            .append_pair("to", destination)
            .append_pair("sig", &signature);
        link.into()
    }

    /// Constant-time check of a presented signature.
    pub fn verify(&self, destination: &str, signature: &str) -> bool {
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(destination.as_bytes());
        mac.verify_slice(&signature).is_ok()
    }
}
