//! Geocoding enricher
//!
//! External collaborator that resolves a parcel's free-text address to
//! coordinates. The lookup service is rate limited and unreliable, so
//! it is never allowed to fail an ingestion run: every per-row failure
//! (timeout, non-success response, bad payload) degrades to null
//! coordinates with a warning.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::models::{Coordinates, ParcelRow};
use crate::config::GeocoderConfig;

/// Address-to-coordinates resolver
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a composed free-text address.
    ///
    /// `Ok(None)` means the service answered but has no match;
    /// `Err` means the lookup itself failed. Callers treat both as
    /// "no coordinates".
    async fn resolve(&self, address: &str) -> anyhow::Result<Option<Coordinates>>;
}

/// Reqwest-backed geocoder against the configured lookup service
///
/// Expects `GET {base_url}/search?q={address}` returning
/// `{"data": [{"lat": .., "lon": ..}, ..]}`; the first hit wins.
#[derive(Clone)]
pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchReply {
    #[serde(default)]
    data: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: f64,
    lon: f64,
}

impl HttpGeocoder {
    pub fn new(config: &GeocoderConfig) -> anyhow::Result<Self> {
        // Bounded per-call timeout so a hung lookup cannot stall the
        // enrichment barrier indefinitely.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn resolve(&self, address: &str) -> anyhow::Result<Option<Coordinates>> {
        let url = format!("{}/search", self.base_url);
        let mut request = self.client.get(&url).query(&[("q", address)]);
        if let Some(ref key) = self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await?.error_for_status()?;
        let reply: SearchReply = response.json().await?;

        Ok(reply.data.first().map(|hit| Coordinates {
            latitude: hit.lat,
            longitude: hit.lon,
        }))
    }
}

/// Compose the lookup text for one row: street address through postal
/// code, comma-joined.
pub fn compose_address(row: &ParcelRow) -> String {
    [
        row.address.as_str(),
        row.subdistrict.as_str(),
        row.district.as_str(),
        row.province.as_str(),
        row.postal_code.as_str(),
    ]
    .join(", ")
}

/// Enrich a batch of rows concurrently.
///
/// All lookups are issued with bounded concurrency and the function
/// only returns once every lookup has settled; the result vector is
/// keyed by original row index so downstream aggregation replays in
/// input order. Lookup failures yield `None` and never propagate.
pub async fn enrich_rows<G>(
    geocoder: &G,
    rows: &[ParcelRow],
    concurrency: usize,
) -> Vec<Option<Coordinates>>
where
    G: Geocoder + ?Sized,
{
    // Addresses are composed up front so each lookup future owns its
    // input and carries no borrow of the row slice.
    let addresses: Vec<(usize, String)> = rows.iter().map(compose_address).enumerate().collect();

    let resolved = stream::iter(addresses)
        .map(|(index, address)| async move {
            match geocoder.resolve(&address).await {
                Ok(coordinates) => (index, coordinates),
                Err(e) => {
                    warn!(
                        row = index,
                        error = %e,
                        "Geocoding lookup failed, keeping null coordinates"
                    );
                    (index, None)
                },
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut by_index = vec![None; rows.len()];
    for (index, coordinates) in resolved {
        by_index[index] = coordinates;
    }
    by_index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::IngestMode;
    use crate::ingest::parser::RowParser;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_rows(n: usize) -> Vec<ParcelRow> {
        let header = "Width,Height,Length,Weight,Price,Sender,Sender_Tel,Receiver,Receiver_Tel,ShippingTypeID,Address,Subdistrict,District,Province,Postal_code";
        let mut csv = header.to_string();
        for i in 0..n {
            csv.push_str(&format!(
                "\n10,20,30,1.5,99.0,Ann,08,Bob,08,EXP,{i} Main Rd,Sub,Dist,Prov,74110"
            ));
        }
        RowParser::new(IngestMode::ParcelsOnly)
            .parse(csv.as_bytes())
            .unwrap()
            .rows
    }

    fn geocoder_for(server: &MockServer) -> HttpGeocoder {
        HttpGeocoder::new(&GeocoderConfig {
            base_url: server.uri(),
            api_key: None,
            timeout_secs: 1,
            concurrency: 4,
        })
        .unwrap()
    }

    #[test]
    fn test_enrichment_future_is_send() {
        fn require_send<T: Send>(_: &T) {}

        // Handlers await this future on the multi-threaded runtime, so
        // it must stay Send even through a trait object.
        let geocoder = HttpGeocoder::new(&GeocoderConfig {
            base_url: "http://localhost:4500".to_string(),
            api_key: None,
            timeout_secs: 1,
            concurrency: 2,
        })
        .unwrap();
        let rows = test_rows(2);
        let shared: &dyn Geocoder = &geocoder;
        require_send(&enrich_rows(shared, &rows, 2));
    }

    #[test]
    fn test_compose_address_joins_fields() {
        let row = &test_rows(1)[0];
        assert_eq!(compose_address(row), "0 Main Rd, Sub, Dist, Prov, 74110");
    }

    #[tokio::test]
    async fn test_resolve_returns_first_hit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"lat": 13.7563, "lon": 100.5018},
                    {"lat": 18.7883, "lon": 98.9853}
                ]
            })))
            .mount(&server)
            .await;

        let geocoder = geocoder_for(&server);
        let coordinates = geocoder.resolve("1 Main Rd").await.unwrap().unwrap();
        assert_eq!(coordinates.latitude, 13.7563);
        assert_eq!(coordinates.longitude, 100.5018);
    }

    #[tokio::test]
    async fn test_resolve_no_match_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
            )
            .mount(&server)
            .await;

        let geocoder = geocoder_for(&server);
        assert!(geocoder.resolve("nowhere").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_passes_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("key", "secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let geocoder = HttpGeocoder::new(&GeocoderConfig {
            base_url: server.uri(),
            api_key: Some("secret".to_string()),
            timeout_secs: 1,
            concurrency: 4,
        })
        .unwrap();
        let _ = geocoder.resolve("somewhere").await.unwrap();
    }

    #[tokio::test]
    async fn test_enrich_survives_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let rows = test_rows(3);
        let geocoder = geocoder_for(&server);
        let enriched = enrich_rows(&geocoder, &rows, 4).await;

        assert_eq!(enriched.len(), 3);
        assert!(enriched.iter().all(|c| c.is_none()));
    }

    #[tokio::test]
    async fn test_enrich_survives_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [{"lat": 1.0, "lon": 2.0}]}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let rows = test_rows(2);
        // 1-second client timeout against a 5-second delay.
        let geocoder = geocoder_for(&server);
        let enriched = enrich_rows(&geocoder, &rows, 2).await;

        assert!(enriched.iter().all(|c| c.is_none()));
    }

    #[tokio::test]
    async fn test_enrich_preserves_row_order() {
        let server = MockServer::start().await;
        // Every row resolves to the same point; the property under test
        // is that the output vector lines up with input indexes even
        // though lookups complete out of order.
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"lat": 7.0, "lon": 11.0}]
            })))
            .mount(&server)
            .await;

        let rows = test_rows(10);
        let geocoder = geocoder_for(&server);
        let enriched = enrich_rows(&geocoder, &rows, 3).await;

        assert_eq!(enriched.len(), 10);
        for coordinates in enriched {
            let coordinates = coordinates.unwrap();
            assert_eq!(coordinates.latitude, 7.0);
            assert_eq!(coordinates.longitude, 11.0);
        }
    }
}
