use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::address::{Coordinate, GeocodeCandidate, NormalizedAddress};
use crate::compose;
use crate::config::AppConfig;
use crate::enrich;
use crate::errors::{ResolveError, ResolveResult};
use crate::google::{GeocodeFilter, GeocodeQuery, MapsService};
use crate::journal::{JournalRecord, ResolutionJournal};
use crate::select;

const BASE_BACKOFF_MS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildingGuard {
    #[default]
    AnyMissing,
    BothMissing,
}

impl BuildingGuard {
    pub fn as_tag(&self) -> &'static str {
        match self {
            BuildingGuard::AnyMissing => "any-missing",
            BuildingGuard::BothMissing => "both-missing",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "any-missing" | "any_missing" => Some(BuildingGuard::AnyMissing),
            "both-missing" | "both_missing" => Some(BuildingGuard::BothMissing),
            _ => None,
        }
    }

    fn fires(&self, premise_present: bool, street_number_present: bool) -> bool {
        match self {
            BuildingGuard::AnyMissing => !premise_present || !street_number_present,
            BuildingGuard::BothMissing => !premise_present && !street_number_present,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub coordinate: Coordinate,
    pub language: Option<String>,
    pub region: Option<String>,
}

impl ResolveRequest {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            coordinate: Coordinate::new(latitude, longitude),
            language: None,
            region: None,
        }
    }
}

#[derive(Debug, Clone)]
struct ResolverSettings {
    default_language: String,
    nearby_radius_m: u32,
    building_guard: BuildingGuard,
    geocode_retry_attempts: u32,
}

impl ResolverSettings {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            default_language: config.default_language.clone(),
            nearby_radius_m: config.nearby_radius_m,
            building_guard: config.building_guard,
            geocode_retry_attempts: config.geocode_retry_attempts.max(1),
        }
    }
}

struct PipelineOutcome {
    address: NormalizedAddress,
    degraded: Vec<&'static str>,
}

pub struct Resolver {
    maps: MapsService,
    settings: ResolverSettings,
    journal: Option<ResolutionJournal>,
    retry_rng: Arc<Mutex<StdRng>>,
}

impl Resolver {
    pub fn new(config: &AppConfig) -> ResolveResult<Self> {
        let maps = MapsService::new(config)?;
        let journal = match &config.journal_dir {
            Some(dir) => Some(ResolutionJournal::new(dir, config)?),
            None => None,
        };
        Ok(Self {
            maps,
            settings: ResolverSettings::from_config(config),
            journal,
            retry_rng: Arc::new(Mutex::new(StdRng::from_entropy())),
        })
    }

    pub fn from_env() -> ResolveResult<Self> {
        crate::init_tracing();
        Self::new(&AppConfig::from_env())
    }

    #[cfg(test)]
    fn with_gateway(
        gateway: Arc<dyn crate::google::MapsGateway>,
        settings: ResolverSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            maps: MapsService::from_gateway(gateway),
            settings,
            journal: None,
            retry_rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn journal(&self) -> Option<&ResolutionJournal> {
        self.journal.as_ref()
    }

    pub async fn resolve(
        &self,
        request: ResolveRequest,
        cancel: Option<CancellationToken>,
    ) -> ResolveResult<NormalizedAddress> {
        let started = Instant::now();
        let result = self.run_pipeline(&request, cancel.as_ref()).await;
        self.record_outcome(&request, &result, started.elapsed());
        result.map(|outcome| outcome.address)
    }

    async fn run_pipeline(
        &self,
        request: &ResolveRequest,
        cancel: Option<&CancellationToken>,
    ) -> ResolveResult<PipelineOutcome> {
        if !request.coordinate.is_finite() {
            return Err(ResolveError::Configuration(
                "coordinate components must be finite".into(),
            ));
        }
        let language = request
            .language
            .clone()
            .unwrap_or_else(|| self.settings.default_language.clone());

        ensure_not_cancelled(cancel)?;
        let candidates = self.primary_geocode(request, &language, cancel).await?;
        let Some(selected) = select::best_candidate(&candidates) else {
            return Err(ResolveError::NoResults);
        };
        let mut address = NormalizedAddress::from_candidate(selected.clone());
        let mut degraded = Vec::new();

        if address.postal_code.is_none() {
            ensure_not_cancelled(cancel)?;
            let backfill = enrich::postal_code(
                &self.maps,
                request.coordinate,
                &language,
                request.region.as_deref(),
            );
            match guarded(cancel, backfill).await {
                Ok(postal) => address.postal_code = postal,
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(err) => {
                    warn!(?err, "postal code backfill failed");
                    degraded.push("postal_backfill");
                }
            }
        }

        let guard = self.settings.building_guard;
        if guard.fires(address.premise.is_some(), address.street_number.is_some()) {
            ensure_not_cancelled(cancel)?;
            let lookup = enrich::building_match(
                &self.maps,
                request.coordinate,
                self.settings.nearby_radius_m,
                &language,
            );
            match guarded(cancel, lookup).await {
                Ok(Some(building)) => {
                    if address.route.is_none() {
                        if let Some(place_id) = building.place_id.clone() {
                            ensure_not_cancelled(cancel)?;
                            let route = enrich::route_name(&self.maps, &place_id, &language);
                            match guarded(cancel, route).await {
                                Ok(route) => address.route = route,
                                Err(ResolveError::Cancelled) => {
                                    return Err(ResolveError::Cancelled)
                                }
                                Err(err) => {
                                    warn!(?err, "route backfill failed");
                                    degraded.push("route_backfill");
                                }
                            }
                        }
                    }
                    address.building_name = building.name;
                }
                Ok(None) => {}
                Err(ResolveError::Cancelled) => return Err(ResolveError::Cancelled),
                Err(err) => {
                    warn!(?err, "building enrichment failed");
                    degraded.push("building_enrichment");
                }
            }
        }

        let (address1, address2) = compose::compose(&address);
        address.address1 = address1;
        address.address2 = address2;

        debug!(
            place_id = address.place_id.as_deref().unwrap_or(""),
            building = address.building_name.as_deref().unwrap_or(""),
            degraded = degraded.len(),
            "address resolved"
        );
        Ok(PipelineOutcome { address, degraded })
    }

    async fn primary_geocode(
        &self,
        request: &ResolveRequest,
        language: &str,
        cancel: Option<&CancellationToken>,
    ) -> ResolveResult<Vec<GeocodeCandidate>> {
        let query = GeocodeQuery {
            coordinate: request.coordinate,
            language: language.to_string(),
            region: request.region.clone(),
            filter: GeocodeFilter::BuildingLevel,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            ensure_not_cancelled(cancel)?;
            match guarded(cancel, self.maps.reverse_geocode(&query)).await {
                Ok(candidates) => return Ok(candidates),
                Err(err)
                    if err.is_retryable() && attempt < self.settings.geocode_retry_attempts =>
                {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        ?err,
                        attempt, "primary geocode failed; retrying after {:?}", delay
                    );
                    match cancel {
                        None => sleep(delay).await,
                        Some(token) => tokio::select! {
                            _ = token.cancelled() => return Err(ResolveError::Cancelled),
                            _ = sleep(delay) => {}
                        },
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(6);
        let backoff_ms = BASE_BACKOFF_MS << doublings;
        let jitter_ms = self.retry_rng.lock().gen_range(0..BASE_BACKOFF_MS);
        Duration::from_millis(backoff_ms + jitter_ms)
    }

    fn record_outcome(
        &self,
        request: &ResolveRequest,
        result: &ResolveResult<PipelineOutcome>,
        elapsed: Duration,
    ) {
        let Some(journal) = &self.journal else {
            return;
        };
        let record = match result {
            Ok(outcome) => {
                JournalRecord::success(request, &outcome.address, &outcome.degraded, elapsed)
            }
            Err(err) => JournalRecord::failure(request, err, elapsed),
        };
        if let Err(err) = journal.record(record) {
            warn!(?err, "failed to append resolution journal entry");
        }
    }
}

fn ensure_not_cancelled(cancel: Option<&CancellationToken>) -> ResolveResult<()> {
    if cancel.map(|token| token.is_cancelled()).unwrap_or(false) {
        return Err(ResolveError::Cancelled);
    }
    Ok(())
}

async fn guarded<T>(
    cancel: Option<&CancellationToken>,
    operation: impl Future<Output = ResolveResult<T>>,
) -> ResolveResult<T> {
    match cancel {
        None => operation.await,
        Some(token) => tokio::select! {
            _ = token.cancelled() => Err(ResolveError::Cancelled),
            outcome = operation => outcome,
        },
    }
}
