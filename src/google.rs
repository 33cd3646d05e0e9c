use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::address::{
    AddressComponent, Coordinate, GeocodeCandidate, LocationPrecision, PlaceCandidate,
};
use crate::config::AppConfig;
use crate::errors::{ResolveError, ResolveResult};

const USER_AGENT: &str = "revgeo/0.1.0";
const BUILDING_RESULT_TYPES: &str =
    "street_address|premise|subpremise|establishment|point_of_interest";
const BUILDING_LOCATION_TYPES: &str = "ROOFTOP|RANGE_INTERPOLATED";

#[derive(Debug, Clone)]
pub struct GeocodeQuery {
    pub coordinate: Coordinate,
    pub language: String,
    pub region: Option<String>,
    pub filter: GeocodeFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodeFilter {
    BuildingLevel,
    PostalCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailScope {
    Name,
    AddressComponents,
}

impl DetailScope {
    fn field_mask(&self) -> &'static str {
        match self {
            DetailScope::Name => "name",
            DetailScope::AddressComponents => "address_component",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlaceDetail {
    pub name: Option<String>,
    pub components: Vec<AddressComponent>,
}

#[async_trait]
pub trait MapsGateway: Send + Sync {
    async fn reverse_geocode(&self, query: &GeocodeQuery) -> ResolveResult<Vec<GeocodeCandidate>>;
    async fn nearby_search(
        &self,
        center: Coordinate,
        radius_m: u32,
        language: &str,
    ) -> ResolveResult<Vec<PlaceCandidate>>;
    async fn place_details(
        &self,
        place_id: &str,
        scope: DetailScope,
        language: &str,
    ) -> ResolveResult<PlaceDetail>;
}

#[derive(Clone)]
pub struct MapsService {
    inner: Arc<dyn MapsGateway>,
}

impl MapsService {
    pub fn new(config: &AppConfig) -> ResolveResult<Self> {
        let client = HttpMapsClient::new(config)?;
        Ok(Self {
            inner: Arc::new(client),
        })
    }

    #[cfg(test)]
    pub fn from_gateway(gateway: Arc<dyn MapsGateway>) -> Self {
        Self { inner: gateway }
    }

    pub async fn reverse_geocode(
        &self,
        query: &GeocodeQuery,
    ) -> ResolveResult<Vec<GeocodeCandidate>> {
        self.inner.reverse_geocode(query).await
    }

    pub async fn nearby_search(
        &self,
        center: Coordinate,
        radius_m: u32,
        language: &str,
    ) -> ResolveResult<Vec<PlaceCandidate>> {
        self.inner.nearby_search(center, radius_m, language).await
    }

    pub async fn place_details(
        &self,
        place_id: &str,
        scope: DetailScope,
        language: &str,
    ) -> ResolveResult<PlaceDetail> {
        self.inner.place_details(place_id, scope, language).await
    }
}

struct RateLimiter {
    interval: Duration,
    last_tick: AsyncMutex<Option<Instant>>,
}

impl RateLimiter {
    fn new(qps: u32) -> Self {
        Self {
            interval: Duration::from_millis(Self::interval_ms(qps)),
            last_tick: AsyncMutex::new(None),
        }
    }

    fn interval_ms(qps: u32) -> u64 {
        let per_second = u64::from(qps.max(1));
        let spacing = (1000 + per_second - 1) / per_second;
        spacing.max(50)
    }

    // The lock spans the sleep so concurrent callers queue behind it.
    async fn wait(&self) {
        let mut last_tick = self.last_tick.lock().await;
        if let Some(prev) = *last_tick {
            let pause = self.interval.saturating_sub(prev.elapsed());
            if !pause.is_zero() {
                sleep(pause).await;
            }
        }
        *last_tick = Some(Instant::now());
    }
}

pub struct HttpMapsClient {
    http: Client,
    api_key: SecretString,
    api_base: String,
    rate_limiter: RateLimiter,
}

impl HttpMapsClient {
    pub fn new(config: &AppConfig) -> ResolveResult<Self> {
        let api_key = config.google_maps_api_key.clone().ok_or_else(|| {
            ResolveError::Configuration("GOOGLE_MAPS_API_KEY is not configured".into())
        })?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
            .build()
            .map_err(|err| {
                ResolveError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self {
            http,
            api_key,
            api_base: config.maps_api_base.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::new(config.geocode_rate_limit_qps.max(1)),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> ResolveResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|err| ResolveError::Configuration(format!("invalid maps API base: {err}")))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ResolveError::Configuration("invalid maps API base".into()))?;
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn fetch<T>(&self, url: Url) -> ResolveResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.rate_limiter.wait().await;
        trace!(path = url.path(), "maps api request");
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl MapsGateway for HttpMapsClient {
    async fn reverse_geocode(&self, query: &GeocodeQuery) -> ResolveResult<Vec<GeocodeCandidate>> {
        let mut url = self.endpoint(&["geocode", "json"])?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("latlng", &query.coordinate.as_latlng())
                .append_pair("language", &query.language);
            match query.filter {
                GeocodeFilter::BuildingLevel => {
                    pairs
                        .append_pair("result_type", BUILDING_RESULT_TYPES)
                        .append_pair("location_type", BUILDING_LOCATION_TYPES);
                }
                GeocodeFilter::PostalCode => {
                    pairs.append_pair("result_type", "postal_code");
                }
            }
            if let Some(region) = &query.region {
                pairs.append_pair("region", region);
            }
            pairs.append_pair("key", self.api_key.expose_secret());
        }

        let body: GeocodeResponseRaw = self.fetch(url).await?;
        ensure_provider_status(&body.status, body.error_message)?;
        Ok(body.results.into_iter().map(GeocodeCandidate::from).collect())
    }

    async fn nearby_search(
        &self,
        center: Coordinate,
        radius_m: u32,
        language: &str,
    ) -> ResolveResult<Vec<PlaceCandidate>> {
        let mut url = self.endpoint(&["place", "nearbysearch", "json"])?;
        url.query_pairs_mut()
            .append_pair("location", &center.as_latlng())
            .append_pair("radius", &radius_m.to_string())
            .append_pair("language", language)
            .append_pair("key", self.api_key.expose_secret());

        let body: NearbyResponseRaw = self.fetch(url).await?;
        ensure_provider_status(&body.status, body.error_message)?;
        Ok(body.results.into_iter().map(PlaceCandidate::from).collect())
    }

    async fn place_details(
        &self,
        place_id: &str,
        scope: DetailScope,
        language: &str,
    ) -> ResolveResult<PlaceDetail> {
        let mut url = self.endpoint(&["place", "details", "json"])?;
        url.query_pairs_mut()
            .append_pair("place_id", place_id)
            .append_pair("fields", scope.field_mask())
            .append_pair("language", language)
            .append_pair("key", self.api_key.expose_secret());

        let body: DetailsResponseRaw = self.fetch(url).await?;
        ensure_provider_status(&body.status, body.error_message)?;
        Ok(body.result.map(PlaceDetail::from).unwrap_or_default())
    }
}

// OK and ZERO_RESULTS are the only statuses that carry a usable body.
fn ensure_provider_status(status: &str, error_message: Option<String>) -> ResolveResult<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        denied => Err(ResolveError::Provider(match error_message {
            Some(message) => format!("{denied}: {message}"),
            None => denied.to_string(),
        })),
    }
}

#[derive(Deserialize)]
struct GeocodeResponseRaw {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResultRaw>,
}

#[derive(Deserialize)]
struct GeocodeResultRaw {
    #[serde(default)]
    formatted_address: String,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    address_components: Vec<AddressComponentRaw>,
    geometry: GeometryRaw,
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    plus_code: Option<PlusCodeRaw>,
}

#[derive(Deserialize)]
struct GeometryRaw {
    location: LatLngRaw,
    #[serde(default)]
    location_type: String,
}

#[derive(Deserialize)]
struct LatLngRaw {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct AddressComponentRaw {
    long_name: String,
    #[serde(default)]
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct PlusCodeRaw {
    #[serde(default)]
    global_code: Option<String>,
    #[serde(default)]
    compound_code: Option<String>,
}

#[derive(Deserialize)]
struct NearbyResponseRaw {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<NearbyPlaceRaw>,
}

#[derive(Deserialize)]
struct NearbyPlaceRaw {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    place_id: Option<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    user_ratings_total: Option<u32>,
}

#[derive(Deserialize)]
struct DetailsResponseRaw {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    result: Option<PlaceDetailRaw>,
}

#[derive(Deserialize)]
struct PlaceDetailRaw {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address_components: Vec<AddressComponentRaw>,
}

impl From<AddressComponentRaw> for AddressComponent {
    fn from(value: AddressComponentRaw) -> Self {
        Self {
            long_name: value.long_name,
            short_name: value.short_name,
            types: value.types,
        }
    }
}

impl From<GeocodeResultRaw> for GeocodeCandidate {
    fn from(value: GeocodeResultRaw) -> Self {
        let plus_code = value
            .plus_code
            .and_then(|code| code.global_code.or(code.compound_code));
        Self {
            formatted_address: value.formatted_address,
            types: value.types,
            location_type: LocationPrecision::from_tag(&value.geometry.location_type),
            components: value
                .address_components
                .into_iter()
                .map(AddressComponent::from)
                .collect(),
            place_id: value.place_id,
            location: Coordinate::new(value.geometry.location.lat, value.geometry.location.lng),
            plus_code,
        }
    }
}

impl From<NearbyPlaceRaw> for PlaceCandidate {
    fn from(value: NearbyPlaceRaw) -> Self {
        Self {
            name: value.name.filter(|name| !name.trim().is_empty()),
            place_id: value.place_id,
            types: value.types,
            rating_count: value.user_ratings_total.unwrap_or(0),
        }
    }
}

impl From<PlaceDetailRaw> for PlaceDetail {
    fn from(value: PlaceDetailRaw) -> Self {
        Self {
            name: value.name.filter(|name| !name.trim().is_empty()),
            components: value
                .address_components
                .into_iter()
                .map(AddressComponent::from)
                .collect(),
        }
    }
}
