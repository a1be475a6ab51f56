use crate::ComputeProvider;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use nimbus_common::{Flavor, Image, Server, ServerCreateRequest, ServerStatus};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Connection parameters for a Keystone-authenticated Nova endpoint.
#[derive(Clone, Debug, Default)]
pub struct OpenStackOptions {
    pub username: String,
    pub password: String,
    pub auth_url: String,
    pub region: Option<String>,
    /// Identity API version: "v2.0" (default) or "v3".
    pub version: Option<String>,
    pub tenant_id: Option<String>,
    pub tenant_name: Option<String>,
    /// Compute endpoint used when the service catalog is bypassed.
    pub base_path: Option<String>,
    pub use_service_catalog: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityVersion {
    V2,
    V3,
}

impl IdentityVersion {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|v| v.trim().trim_start_matches(['v', 'V'])) {
            Some(v) if v == "3" || v.starts_with("3.") => IdentityVersion::V3,
            _ => IdentityVersion::V2,
        }
    }
}

#[derive(Debug)]
struct Session {
    token: String,
    compute_url: Url,
}

pub struct OpenStackProvider {
    client: Client,
    options: OpenStackOptions,
    session: OnceCell<Session>,
}

impl OpenStackProvider {
    /// Builds the handle. No network I/O happens here: bad credentials or an
    /// unreachable auth URL surface on the first API call.
    pub fn new(options: OpenStackOptions) -> Result<Self> {
        // Default reqwest client has no overall timeout; a stalled endpoint would hang the command.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            options,
            session: OnceCell::new(),
        })
    }

    async fn session(&self) -> Result<&Session> {
        self.session.get_or_try_init(|| self.authenticate()).await
    }

    async fn authenticate(&self) -> Result<Session> {
        let version = IdentityVersion::parse(self.options.version.as_deref());
        let url = identity_url(&self.options.auth_url, version);
        let body = match version {
            IdentityVersion::V2 => v2_auth_body(&self.options),
            IdentityVersion::V3 => v3_auth_body(&self.options),
        };

        tracing::debug!("🔵 [OpenStack API] POST {} - authenticating user={}", url, self.options.username);
        let resp = self.client.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!("❌ [OpenStack API] POST {} failed: status={}", url, status.as_u16());
            return Err(anyhow!(
                "OpenStack authentication failed: status={} body={}",
                status.as_u16(),
                text
            ));
        }

        let header_token = resp
            .headers()
            .get("X-Subject-Token")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());
        let json_resp: Value = resp.json().await?;

        let (token, catalog) = match version {
            IdentityVersion::V2 => (
                json_resp["access"]["token"]["id"].as_str().map(|s| s.to_string()),
                &json_resp["access"]["serviceCatalog"],
            ),
            IdentityVersion::V3 => (header_token, &json_resp["token"]["catalog"]),
        };
        let token = token.ok_or_else(|| anyhow!("No token in OpenStack authentication response"))?;

        let compute_url = if self.options.use_service_catalog {
            select_compute_endpoint(catalog, self.options.region.as_deref()).ok_or_else(|| {
                anyhow!(
                    "No compute endpoint in service catalog (region={})",
                    self.options.region.as_deref().unwrap_or("any")
                )
            })?
        } else {
            self.options
                .base_path
                .clone()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| anyhow!("Service catalog disabled but no compute base path configured"))?
        };

        let compute_url = Url::parse(compute_url.trim())
            .with_context(|| format!("invalid compute endpoint '{}'", compute_url))?;
        tracing::info!("✅ [OpenStack API] authenticated, compute endpoint={}", compute_url);
        Ok(Session { token, compute_url })
    }

    /// Issues one Nova request; non-2xx answers become errors carrying the provider's body.
    ///
    /// `segments` are appended to the compute endpoint one path segment each, so an id
    /// typed in chat can never climb out of its collection.
    async fn nova(&self, method: Method, segments: &[&str], op: &str, body: Option<Value>) -> Result<Option<Value>> {
        check_segments(segments)?;
        let session = self.session().await?;
        let url = resource_url(&session.compute_url, segments)?;

        tracing::debug!("🔵 [OpenStack API] {} {} - {}", method, url, op);
        let mut req = self
            .client
            .request(method.clone(), url.clone())
            .header("X-Auth-Token", &session.token)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(
                "❌ [OpenStack API] {} {} failed: status={}, response={}",
                method,
                url,
                status.as_u16(),
                text
            );
            return Err(anyhow!(
                "OpenStack {} failed: status={} body={}",
                op,
                status.as_u16(),
                text
            ));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&text)?))
    }

    async fn nova_get(&self, segments: &[&str], op: &str) -> Result<Value> {
        self.nova(Method::GET, segments, op, None)
            .await?
            .ok_or_else(|| anyhow!("OpenStack {} returned an empty body", op))
    }
}

#[async_trait]
impl ComputeProvider for OpenStackProvider {
    fn code(&self) -> &'static str {
        "openstack"
    }

    async fn list_flavors(&self) -> Result<Vec<Flavor>> {
        let json_resp = self.nova_get(&["flavors", "detail"], "get_flavors").await?;
        let flavors: Vec<Flavor> = serde_json::from_value(json_resp["flavors"].clone())
            .context("malformed flavors list")?;
        Ok(flavors)
    }

    async fn get_flavor(&self, flavor_id: &str) -> Result<Flavor> {
        let json_resp = self.nova_get(&["flavors", flavor_id], "get_flavor").await?;
        Ok(serde_json::from_value(json_resp["flavor"].clone()).context("malformed flavor")?)
    }

    async fn list_servers(&self) -> Result<Vec<Server>> {
        let json_resp = self.nova_get(&["servers", "detail"], "get_servers").await?;
        json_resp["servers"]
            .as_array()
            .ok_or_else(|| anyhow!("malformed servers list"))?
            .iter()
            .map(parse_server)
            .collect()
    }

    async fn get_server(&self, server_id: &str) -> Result<Server> {
        let json_resp = self.nova_get(&["servers", server_id], "get_server").await?;
        parse_server(&json_resp["server"])
    }

    async fn create_server(&self, request: &ServerCreateRequest) -> Result<Server> {
        let body = json!({
            "server": {
                "name": request.name,
                "flavorRef": request.flavor_id,
                "imageRef": request.image_id,
                "key_name": request.key_name,
            }
        });
        let json_resp = self
            .nova(Method::POST, &["servers"], "create_server", Some(body))
            .await?
            .ok_or_else(|| anyhow!("OpenStack create_server returned an empty body"))?;
        let server_id = json_resp["server"]["id"]
            .as_str()
            .ok_or_else(|| anyhow!("No server id in create response"))?
            .to_string();
        tracing::info!("✅ [OpenStack API] Server created: id={}, name={}", server_id, request.name);

        // The create response only carries id/links/adminPass; fetch the full record.
        self.get_server(&server_id).await
    }

    async fn destroy_server(&self, server_id: &str) -> Result<String> {
        self.nova(Method::DELETE, &["servers", server_id], "destroy_server", None)
            .await?;
        Ok(server_id.to_string())
    }

    async fn list_images(&self) -> Result<Vec<Image>> {
        let json_resp = self.nova_get(&["images", "detail"], "get_images").await?;
        json_resp["images"]
            .as_array()
            .ok_or_else(|| anyhow!("malformed images list"))?
            .iter()
            .map(parse_image)
            .collect()
    }

    async fn get_image(&self, image_id: &str) -> Result<Image> {
        let json_resp = self.nova_get(&["images", image_id], "get_image").await?;
        parse_image(&json_resp["image"])
    }
}

fn check_segments(segments: &[&str]) -> Result<()> {
    match segments
        .iter()
        .find(|s| s.trim().is_empty() || **s == "." || **s == "..")
    {
        Some(bad) => Err(anyhow!("invalid resource id '{}'", bad)),
        None => Ok(()),
    }
}

/// Appends each segment to the endpoint path, percent-encoding `/`, `?`, `#` and friends.
pub fn resource_url(base: &Url, segments: &[&str]) -> Result<Url> {
    check_segments(segments)?;
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("compute endpoint {} cannot carry a path", base))?
        .pop_if_empty()
        .extend(segments.iter().copied());
    Ok(url)
}

/// Token endpoint for the given identity version; tolerates auth URLs that already carry the version.
pub fn identity_url(auth_url: &str, version: IdentityVersion) -> String {
    let base = auth_url.trim().trim_end_matches('/');
    match version {
        IdentityVersion::V2 if base.ends_with("/v2.0") => format!("{}/tokens", base),
        IdentityVersion::V2 => format!("{}/v2.0/tokens", base),
        IdentityVersion::V3 if base.ends_with("/v3") => format!("{}/auth/tokens", base),
        IdentityVersion::V3 => format!("{}/v3/auth/tokens", base),
    }
}

fn v2_auth_body(options: &OpenStackOptions) -> Value {
    let mut auth = json!({
        "passwordCredentials": {
            "username": options.username,
            "password": options.password,
        }
    });
    if let Some(id) = options.tenant_id.as_deref().filter(|s| !s.is_empty()) {
        auth["tenantId"] = json!(id);
    } else if let Some(name) = options.tenant_name.as_deref().filter(|s| !s.is_empty()) {
        auth["tenantName"] = json!(name);
    }
    json!({ "auth": auth })
}

fn v3_auth_body(options: &OpenStackOptions) -> Value {
    let mut auth = json!({
        "identity": {
            "methods": ["password"],
            "password": {
                "user": {
                    "name": options.username,
                    "domain": { "id": "default" },
                    "password": options.password,
                }
            }
        }
    });
    if let Some(id) = options.tenant_id.as_deref().filter(|s| !s.is_empty()) {
        auth["scope"] = json!({ "project": { "id": id } });
    } else if let Some(name) = options.tenant_name.as_deref().filter(|s| !s.is_empty()) {
        auth["scope"] = json!({ "project": { "name": name, "domain": { "id": "default" } } });
    }
    json!({ "auth": auth })
}

/// Picks the public compute endpoint out of a v2 `serviceCatalog` or v3 `catalog`.
pub fn select_compute_endpoint(catalog: &Value, region: Option<&str>) -> Option<String> {
    let region = region.map(str::trim).filter(|r| !r.is_empty());
    let services = catalog.as_array()?;
    let compute = services
        .iter()
        .find(|s| s.get("type").and_then(|t| t.as_str()) == Some("compute"))?;

    compute["endpoints"].as_array()?.iter().find_map(|ep| {
        let ep_region = ep
            .get("region")
            .or_else(|| ep.get("region_id"))
            .and_then(|r| r.as_str());
        if let Some(wanted) = region {
            if ep_region != Some(wanted) {
                return None;
            }
        }
        // v2.0 entries carry publicURL; v3 entries are split by interface.
        if let Some(url) = ep.get("publicURL").and_then(|u| u.as_str()) {
            return Some(url.to_string());
        }
        match ep.get("interface").and_then(|i| i.as_str()) {
            Some("public") => ep.get("url").and_then(|u| u.as_str()).map(|s| s.to_string()),
            _ => None,
        }
    })
}

pub fn parse_server(raw: &Value) -> Result<Server> {
    let id = raw["id"]
        .as_str()
        .ok_or_else(|| anyhow!("server record without id"))?
        .to_string();

    let mut private_addresses = Vec::new();
    if let Some(networks) = raw["addresses"].as_object() {
        for (network, entries) in networks {
            for entry in entries.as_array().into_iter().flatten() {
                let Some(addr) = entry.get("addr").and_then(|a| a.as_str()) else {
                    continue;
                };
                let is_private = match entry.get("OS-EXT-IPS:type").and_then(|t| t.as_str()) {
                    Some(kind) => kind == "fixed",
                    None => network == "private",
                };
                if is_private {
                    private_addresses.push(addr.to_string());
                }
            }
        }
    }

    Ok(Server {
        id,
        name: raw["name"].as_str().unwrap_or_default().to_string(),
        private_addresses,
        status: ServerStatus::from_nova(raw["status"].as_str().unwrap_or_default()),
        key_name: raw["key_name"].as_str().map(|s| s.to_string()),
        tenant_id: raw["tenant_id"].as_str().unwrap_or_default().to_string(),
        created: parse_timestamp(&raw["created"])?,
    })
}

pub fn parse_image(raw: &Value) -> Result<Image> {
    Ok(Image {
        id: raw["id"]
            .as_str()
            .ok_or_else(|| anyhow!("image record without id"))?
            .to_string(),
        name: raw["name"].as_str().unwrap_or_default().to_string(),
        created: parse_timestamp(&raw["created"])?,
    })
}

fn parse_timestamp(raw: &Value) -> Result<DateTime<Utc>> {
    let s = raw
        .as_str()
        .ok_or_else(|| anyhow!("record without creation timestamp"))?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    // Some deployments drop the zone designator; Nova timestamps are always UTC.
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .with_context(|| format!("invalid timestamp '{}'", s))?;
    Ok(naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_url_appends_version_once() {
        assert_eq!(
            identity_url("https://keystone.example:5000/", IdentityVersion::V2),
            "https://keystone.example:5000/v2.0/tokens"
        );
        assert_eq!(
            identity_url("https://keystone.example:5000/v2.0", IdentityVersion::V2),
            "https://keystone.example:5000/v2.0/tokens"
        );
        assert_eq!(
            identity_url("https://keystone.example:5000", IdentityVersion::V3),
            "https://keystone.example:5000/v3/auth/tokens"
        );
        assert_eq!(
            identity_url("https://keystone.example:5000/v3/", IdentityVersion::V3),
            "https://keystone.example:5000/v3/auth/tokens"
        );
    }

    #[test]
    fn identity_version_parsing() {
        assert_eq!(IdentityVersion::parse(None), IdentityVersion::V2);
        assert_eq!(IdentityVersion::parse(Some("v2.0")), IdentityVersion::V2);
        assert_eq!(IdentityVersion::parse(Some("3")), IdentityVersion::V3);
        assert_eq!(IdentityVersion::parse(Some("v3")), IdentityVersion::V3);
        assert_eq!(IdentityVersion::parse(Some("V3.14")), IdentityVersion::V3);
    }

    #[test]
    fn v2_body_prefers_tenant_id() {
        let options = OpenStackOptions {
            username: "demo".into(),
            password: "secret".into(),
            tenant_id: Some("t-1".into()),
            tenant_name: Some("demo-project".into()),
            ..Default::default()
        };
        let body = v2_auth_body(&options);
        assert_eq!(body["auth"]["tenantId"], "t-1");
        assert!(body["auth"].get("tenantName").is_none());
        assert_eq!(body["auth"]["passwordCredentials"]["username"], "demo");
    }

    #[test]
    fn v3_body_scopes_by_project_name() {
        let options = OpenStackOptions {
            username: "demo".into(),
            password: "secret".into(),
            tenant_name: Some("demo-project".into()),
            ..Default::default()
        };
        let body = v3_auth_body(&options);
        assert_eq!(body["auth"]["scope"]["project"]["name"], "demo-project");
        assert_eq!(body["auth"]["identity"]["methods"][0], "password");
    }

    #[test]
    fn compute_endpoint_from_v2_catalog_honours_region() {
        let catalog = json!([
            { "type": "identity", "endpoints": [{ "region": "RegionOne", "publicURL": "http://id" }] },
            { "type": "compute", "endpoints": [
                { "region": "RegionOne", "publicURL": "http://nova-one/v2/t" },
                { "region": "RegionTwo", "publicURL": "http://nova-two/v2/t" }
            ]}
        ]);
        assert_eq!(
            select_compute_endpoint(&catalog, None).as_deref(),
            Some("http://nova-one/v2/t")
        );
        assert_eq!(
            select_compute_endpoint(&catalog, Some("RegionTwo")).as_deref(),
            Some("http://nova-two/v2/t")
        );
        assert_eq!(select_compute_endpoint(&catalog, Some("Nowhere")), None);
    }

    #[test]
    fn compute_endpoint_from_v3_catalog_uses_public_interface() {
        let catalog = json!([
            { "type": "compute", "endpoints": [
                { "interface": "internal", "region_id": "RegionOne", "url": "http://internal" },
                { "interface": "public", "region_id": "RegionOne", "url": "http://public" }
            ]}
        ]);
        assert_eq!(
            select_compute_endpoint(&catalog, Some("RegionOne")).as_deref(),
            Some("http://public")
        );
    }

    #[test]
    fn server_parsing_keeps_fixed_addresses_only() {
        let raw = json!({
            "id": "abc",
            "name": "web-1",
            "status": "ACTIVE",
            "key_name": "ops",
            "tenant_id": "t-1",
            "created": "2024-05-01T10:00:00Z",
            "addresses": {
                "private": [
                    { "addr": "10.0.0.4", "version": 4, "OS-EXT-IPS:type": "fixed" },
                    { "addr": "172.24.4.9", "version": 4, "OS-EXT-IPS:type": "floating" }
                ]
            }
        });
        let server = parse_server(&raw).unwrap();
        assert_eq!(server.private_addresses, vec!["10.0.0.4".to_string()]);
        assert_eq!(server.status, ServerStatus::Running);
        assert_eq!(server.key_name.as_deref(), Some("ops"));
    }

    #[test]
    fn server_parsing_falls_back_to_network_name() {
        let raw = json!({
            "id": "abc",
            "name": "web-1",
            "status": "BUILD",
            "tenant_id": "t-1",
            "created": "2024-05-01T10:00:00",
            "addresses": {
                "private": [{ "addr": "10.0.0.5" }],
                "public": [{ "addr": "203.0.113.5" }]
            }
        });
        let server = parse_server(&raw).unwrap();
        assert_eq!(server.private_addresses, vec!["10.0.0.5".to_string()]);
        assert_eq!(server.status, ServerStatus::Provisioning);
        assert_eq!(server.key_name, None);
        assert_eq!(server.created.to_rfc3339(), "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn resource_ids_stay_inside_one_segment() {
        let base = Url::parse("http://nova.example:8774/v2.1/").unwrap();
        assert_eq!(
            resource_url(&base, &["servers", "detail"]).unwrap().as_str(),
            "http://nova.example:8774/v2.1/servers/detail"
        );
        assert_eq!(
            resource_url(&base, &["servers", "../flavors/1"]).unwrap().path(),
            "/v2.1/servers/..%2Fflavors%2F1"
        );
        assert_eq!(
            resource_url(&base, &["servers", "a?b#c"]).unwrap().path(),
            "/v2.1/servers/a%3Fb%23c"
        );
        assert!(resource_url(&base, &["servers", ".."]).is_err());
        assert!(resource_url(&base, &["servers", ""]).is_err());
    }

    #[test]
    fn image_without_timestamp_is_an_error() {
        assert!(parse_image(&json!({ "id": "i-1", "name": "cirros" })).is_err());
    }
}
