//! IP geolocation over the ip-api.com JSON API.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::error_handling::ProbeError;

/// Where an IP address is located and who announces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GeoLocation {
    pub country: String,
    pub country_code: String,
    pub region: String,
    pub city: String,
    pub isp: String,
    pub asn: String,
}

/// Response body of `GET <endpoint>/<ip>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeoApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    country: String,
    #[serde(default)]
    country_code: String,
    #[serde(default)]
    region_name: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    isp: String,
    #[serde(default, rename = "as")]
    asn: String,
}

impl GeoApiResponse {
    fn into_location(self) -> Result<GeoLocation, ProbeError> {
        if self.status != "success" {
            return Err(ProbeError::Http(format!(
                "geolocation lookup failed: {}",
                self.message.unwrap_or(self.status)
            )));
        }
        Ok(GeoLocation {
            country: self.country,
            country_code: self.country_code.to_uppercase(),
            region: self.region_name,
            city: self.city,
            isp: self.isp,
            asn: self.asn,
        })
    }
}

pub(crate) async fn lookup_ip(
    client: &reqwest::Client,
    endpoint: &str,
    ip: IpAddr,
) -> Result<GeoLocation, ProbeError> {
    let url = format!("{}/{ip}", endpoint.trim_end_matches('/'));
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| ProbeError::from(&e))?
        .error_for_status()
        .map_err(|e| ProbeError::from(&e))?;
    let body: GeoApiResponse = response.json().await.map_err(|e| ProbeError::from(&e))?;
    body.into_location()
}
