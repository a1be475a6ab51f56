use crate::settings::ComputeSettings;
use anyhow::{anyhow, Result};
use nimbus_providers::ComputeProvider;

/// Builds a compute client from validated settings.
///
/// The dispatcher asks for a fresh client on every command.
pub trait ClientFactory: Send + Sync {
    fn build(&self, settings: &ComputeSettings) -> Result<Box<dyn ComputeProvider>>;
}

impl<F> ClientFactory for F
where
    F: Fn(&ComputeSettings) -> Result<Box<dyn ComputeProvider>> + Send + Sync,
{
    fn build(&self, settings: &ComputeSettings) -> Result<Box<dyn ComputeProvider>> {
        self(settings)
    }
}

/// Maps the configured provider code to a backend.
pub struct ProviderManager {
    // The mock keeps its servers across commands, so one instance is shared.
    #[cfg(feature = "provider-mock")]
    mock: nimbus_providers::mock::MockProvider,
}

impl ProviderManager {
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "provider-mock")]
            mock: nimbus_providers::mock::MockProvider::seeded(),
        }
    }
}

impl Default for ProviderManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientFactory for ProviderManager {
    fn build(&self, settings: &ComputeSettings) -> Result<Box<dyn ComputeProvider>> {
        let provider_name = settings.provider.as_deref().unwrap_or_default();
        match provider_name.to_lowercase().as_str() {
            #[cfg(feature = "provider-openstack")]
            "openstack" => {
                let provider =
                    nimbus_providers::openstack::OpenStackProvider::new(settings.openstack_options())?;
                Ok(Box::new(provider))
            }
            #[cfg(feature = "provider-mock")]
            "mock" => Ok(Box::new(self.mock.clone())),
            // Add other providers here:
            // "rackspace" => ...
            _ => Err(anyhow!("Unsupported compute provider '{}'", provider_name)),
        }
    }
}
