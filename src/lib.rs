mod address;
mod compose;
mod config;
mod enrich;
mod errors;
mod google;
mod journal;
mod resolver;
mod select;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use crate::address::{
    AddressComponent, BuildingMatch, Coordinate, GeocodeCandidate, LocationPrecision,
    NormalizedAddress, PlaceCandidate,
};
pub use crate::compose::compose;
pub use crate::config::{AppConfig, PublicAppConfig};
pub use crate::errors::{ResolveError, ResolveResult};
pub use crate::google::{
    DetailScope, GeocodeFilter, GeocodeQuery, HttpMapsClient, MapsGateway, MapsService, PlaceDetail,
};
pub use crate::journal::{JournalRecord, ResolutionJournal};
pub use crate::resolver::{BuildingGuard, ResolveRequest, Resolver};
pub use crate::select::best_candidate;

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,revgeo=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
