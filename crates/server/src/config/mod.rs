mod server;
mod session;
mod store;


pub use imagehoster_gallery::GalleryConfig;
pub use server::*;
pub use session::*;
pub use store::*;

use serde::Deserialize;

/// Top-level configuration for the ImageHoster server, loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
pub struct ImageHosterConfig {
    /// HTTP server bind configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Session cookie and token configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Gallery behaviour switches.
    #[serde(default)]
    pub gallery: GalleryConfig,
}
