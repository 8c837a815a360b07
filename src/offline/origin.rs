//! Resolution of the field ticket API origin for a request.

use reqwest::Url;

/// Placeholder replaced by the tenant subdomain.
const TENANT_PLACEHOLDER: &str = "{tenant}";

#[derive(Debug, Clone)]
pub enum OriginResolver {
    /// One API origin for every caller
    Static(Url),
    /// Per-tenant origin; the tenant is the first label of the caller's host
    Tenant(String),
}

impl OriginResolver {
    pub fn parse(origin: &str) -> anyhow::Result<Self> {
        if origin.contains(TENANT_PLACEHOLDER) {
            // Validate the template with a sample tenant
            Url::parse(&origin.replace(TENANT_PLACEHOLDER, "tenant"))?;
            Ok(Self::Tenant(origin.to_string()))
        } else {
            Ok(Self::Static(Url::parse(origin)?))
        }
    }

    /// API origin for a caller reaching us as `host`.
    pub fn resolve(&self, host: Option<&str>) -> Result<Url, String> {
        match self {
            Self::Static(url) => Ok(url.clone()),
            Self::Tenant(template) => {
                let host = host.ok_or_else(|| "missing Host header".to_string())?;
                let hostname = host.split(':').next().unwrap_or_default();
                let tenant = hostname
                    .split('.')
                    .next()
                    .filter(|label| !label.is_empty() && hostname.contains('.'))
                    .ok_or_else(|| format!("no tenant subdomain in host '{}'", host))?;
                Url::parse(&template.replace(TENANT_PLACEHOLDER, tenant)).map_err(|e| e.to_string())
            }
        }
    }

    /// Absolute upstream URL for a proxied path and query.
    pub fn target(&self, host: Option<&str>, path: &str, query: Option<&str>) -> Result<Url, String> {
        let mut origin = self.resolve(host)?;
        if !origin.path().ends_with('/') {
            let base = format!("{}/", origin.path());
            origin.set_path(&base);
        }
        let mut url = origin
            .join(path.trim_start_matches('/'))
            .map_err(|e| e.to_string())?;
        url.set_query(query.filter(|q| !q.is_empty()));
        Ok(url)
    }
}
