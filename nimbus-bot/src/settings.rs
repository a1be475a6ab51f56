use std::time::Duration;

pub const ENV_PROVIDER: &str = "HUBOT_OPENSTACK_COMPUTE_PROVIDER";
pub const ENV_USERNAME: &str = "HUBOT_OPENSTACK_COMPUTE_USERNAME";
pub const ENV_PASSWORD: &str = "HUBOT_OPENSTACK_COMPUTE_PASSWORD";
pub const ENV_AUTHURL: &str = "HUBOT_OPENSTACK_COMPUTE_AUTHURL";
pub const ENV_REGION: &str = "HUBOT_OPENSTACK_COMPUTE_REGION";
pub const ENV_VERSION: &str = "HUBOT_OPENSTACK_COMPUTE_VERSION";
pub const ENV_TENANTID: &str = "HUBOT_OPENSTACK_COMPUTE_TENANTID";
pub const ENV_TENANTNAME: &str = "HUBOT_OPENSTACK_COMPUTE_TENANTNAME";
pub const ENV_BASEPATH: &str = "HUBOT_OPENSTACK_COMPUTE_BASEPATH";
pub const ENV_USESERVICECATALOG: &str = "HUBOT_OPENSTACK_COMPUTE_USESERVICECATALOG";

pub const ENV_WAIT_INTERVAL: &str = "NIMBUS_WAIT_INTERVAL_SECS";
pub const ENV_WAIT_TIMEOUT: &str = "NIMBUS_WAIT_TIMEOUT_SECS";
pub const ENV_BOT_NAME: &str = "NIMBUS_BOT_NAME";
pub const ENV_MODE: &str = "NIMBUS_MODE";
pub const ENV_LISTEN_ADDR: &str = "NIMBUS_LISTEN_ADDR";

pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// Connection settings for the compute provider.
///
/// Read once at startup and handed to the dispatcher; handlers never look at the
/// process environment themselves.
#[derive(Clone, Debug)]
pub struct ComputeSettings {
    pub provider: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_url: Option<String>,
    pub region: Option<String>,
    pub version: Option<String>,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    pub base_path: Option<String>,
    pub use_service_catalog: bool,
    pub wait_interval: Duration,
    pub wait_timeout: Duration,
}

impl Default for ComputeSettings {
    fn default() -> Self {
        Self {
            provider: None,
            username: None,
            password: None,
            auth_url: None,
            region: None,
            version: None,
            tenant_id: None,
            tenant_name: None,
            base_path: None,
            use_service_catalog: true,
            wait_interval: DEFAULT_WAIT_INTERVAL,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

impl ComputeSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Optional values: blank means "not configured".
        let optional = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            // Required values: only absence is an error, like the original chat script.
            provider: lookup(ENV_PROVIDER).map(|v| v.trim().to_string()),
            username: lookup(ENV_USERNAME),
            password: lookup(ENV_PASSWORD),
            auth_url: lookup(ENV_AUTHURL).map(|v| v.trim().to_string()),
            region: optional(ENV_REGION),
            version: optional(ENV_VERSION),
            tenant_id: optional(ENV_TENANTID),
            tenant_name: optional(ENV_TENANTNAME),
            base_path: optional(ENV_BASEPATH),
            use_service_catalog: optional(ENV_USESERVICECATALOG)
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
            wait_interval: seconds_or(optional(ENV_WAIT_INTERVAL), ENV_WAIT_INTERVAL, DEFAULT_WAIT_INTERVAL),
            wait_timeout: seconds_or(optional(ENV_WAIT_TIMEOUT), ENV_WAIT_TIMEOUT, DEFAULT_WAIT_TIMEOUT),
        }
    }

    /// Names of the required variables that are not set, in a fixed order.
    pub fn missing_required(&self) -> Vec<&'static str> {
        [
            (ENV_PROVIDER, self.provider.is_none()),
            (ENV_USERNAME, self.username.is_none()),
            (ENV_PASSWORD, self.password.is_none()),
            (ENV_AUTHURL, self.auth_url.is_none()),
        ]
        .into_iter()
        .filter_map(|(var, missing)| missing.then_some(var))
        .collect()
    }

    /// Chat messages explaining every missing variable; empty when the settings are usable.
    pub fn validation_messages(&self) -> Vec<String> {
        self.missing_required()
            .into_iter()
            .flat_map(|var| {
                [
                    format!("{} isn't set.", var),
                    format!("Please set the {} environment variable.", var),
                ]
            })
            .collect()
    }

    #[cfg(feature = "provider-openstack")]
    pub fn openstack_options(&self) -> nimbus_providers::openstack::OpenStackOptions {
        nimbus_providers::openstack::OpenStackOptions {
            username: self.username.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
            auth_url: self.auth_url.clone().unwrap_or_default(),
            region: self.region.clone(),
            version: self.version.clone(),
            tenant_id: self.tenant_id.clone(),
            tenant_name: self.tenant_name.clone(),
            base_path: self.base_path.clone(),
            use_service_catalog: self.use_service_catalog,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostMode {
    Http,
    Console,
}

/// How the bot is exposed to the chat side.
#[derive(Clone, Debug)]
pub struct HostSettings {
    pub mode: HostMode,
    pub listen_addr: String,
    pub bot_name: String,
}

impl HostSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = match lookup(ENV_MODE).as_deref().map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("console") => HostMode::Console,
            Some(m) if !m.is_empty() && !m.eq_ignore_ascii_case("http") => {
                tracing::warn!("⚠️ Unknown {}='{}', falling back to http", ENV_MODE, m);
                HostMode::Http
            }
            _ => HostMode::Http,
        };
        Self {
            mode,
            listen_addr: lookup(ENV_LISTEN_ADDR)
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            bot_name: lookup(ENV_BOT_NAME)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "hubot".to_string()),
        }
    }
}

fn parse_flag(raw: &str) -> bool {
    !matches!(
        raw.to_ascii_lowercase().as_str(),
        "false" | "0" | "no" | "off"
    )
}

fn seconds_or(raw: Option<String>, var: &str, default: Duration) -> Duration {
    match raw {
        None => default,
        Some(v) => match v.parse::<u64>() {
            Ok(secs) if secs > 0 => Duration::from_secs(secs),
            _ => {
                tracing::warn!("⚠️ Ignoring {}='{}' (not a positive number of seconds)", var, v);
                default
            }
        },
    }
}
