use anyhow::Result;
use async_trait::async_trait;
use nimbus_common::{Flavor, Image, Server, ServerCreateRequest};

/// A handle to a remote compute service.
///
/// Every method is a single remote round-trip (plus authentication on first use).
/// Implementations never cache entities between calls: callers resolve flavors,
/// images and servers fresh each time.
#[async_trait]
pub trait ComputeProvider: Send + Sync {
    /// Short provider code, e.g. "openstack" or "mock".
    fn code(&self) -> &'static str;

    async fn list_flavors(&self) -> Result<Vec<Flavor>>;
    async fn get_flavor(&self, flavor_id: &str) -> Result<Flavor>;

    async fn list_servers(&self) -> Result<Vec<Server>>;
    async fn get_server(&self, server_id: &str) -> Result<Server>;

    /// Boots a server and returns it as first reported by the provider
    /// (usually still PROVISIONING).
    async fn create_server(&self, request: &ServerCreateRequest) -> Result<Server>;

    /// Deletes the server and returns the id the provider acknowledged.
    async fn destroy_server(&self, server_id: &str) -> Result<String>;

    async fn list_images(&self) -> Result<Vec<Image>>;
    async fn get_image(&self, image_id: &str) -> Result<Image>;
}

#[cfg(feature = "mock")]
pub mod mock;

#[cfg(feature = "openstack")]
pub mod openstack;
