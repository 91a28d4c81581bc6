//! Resolution and geolocation stage.

use async_trait::async_trait;
use log::{debug, warn};

use crate::connection::GeoLocation;
use crate::detection::{DetectionStage, PipelineContext};
use crate::error_handling::ProbeError;
use crate::models::LocationResult;

const UNKNOWN: &str = "Unknown";

/// Resolves the domain (DNS cache first) and geolocates the address.
///
/// Geolocation is best effort: a failed lookup leaves an unknown country and
/// the run continues. Only a failed resolution or a domestic server stops it.
pub struct LocationStage;

#[async_trait]
impl DetectionStage for LocationStage {
    async fn execute(&self, ctx: &mut PipelineContext<'_>) -> Result<(), ProbeError> {
        let ip = match ctx.cache.get_dns(&ctx.domain) {
            Some(ip) => {
                debug!("DNS cache hit for {}: {ip}", ctx.domain);
                ip
            }
            None => {
                let ip = ctx.connections.resolve(&ctx.domain).await?;
                ctx.cache.put_dns(&ctx.domain, ip);
                ip
            }
        };
        ctx.ip = Some(ip);

        let geo = match ctx.connections.locate(ip).await {
            Ok(geo) => geo,
            Err(e) => {
                warn!("Geolocation failed for {} ({ip}): {e}", ctx.domain);
                GeoLocation {
                    country: UNKNOWN.to_string(),
                    ..GeoLocation::default()
                }
            }
        };

        let home = &ctx.config.detection.home_country;
        let is_domestic = !geo.country_code.is_empty() && geo.country_code.eq_ignore_ascii_case(home);
        let country_code = geo.country_code.clone();
        ctx.result.location = Some(LocationResult {
            country: geo.country,
            country_code: geo.country_code,
            is_domestic,
            ip_address: ip.to_string(),
            isp: geo.isp,
            asn: geo.asn,
            city: geo.city,
            region: geo.region,
        });

        if is_domestic {
            return Err(ProbeError::Domestic(country_code));
        }
        Ok(())
    }

    fn priority(&self) -> u32 {
        20
    }

    fn name(&self) -> &'static str {
        "location"
    }
}
