use tracing::warn;

use crate::address::{component_value, BuildingMatch, Coordinate, PlaceCandidate};
use crate::errors::ResolveResult;
use crate::google::{DetailScope, GeocodeFilter, GeocodeQuery, MapsService};
use crate::select::{first_max_by_key, intersects};

const NEARBY_BUILDING_TYPES: &[&str] = &["premise", "point_of_interest", "establishment"];

pub(crate) async fn postal_code(
    maps: &MapsService,
    center: Coordinate,
    language: &str,
    region: Option<&str>,
) -> ResolveResult<Option<String>> {
    let query = GeocodeQuery {
        coordinate: center,
        language: language.to_string(),
        region: region.map(str::to_string),
        filter: GeocodeFilter::PostalCode,
    };
    let candidates = maps.reverse_geocode(&query).await?;
    Ok(candidates
        .first()
        .and_then(|candidate| component_value(&candidate.components, "postal_code")))
}

fn building_score(place: &PlaceCandidate) -> (u8, u8, u8) {
    (
        if intersects(&place.types, NEARBY_BUILDING_TYPES) {
            2
        } else {
            0
        },
        u8::from(place.name.is_some()),
        u8::from(place.rating_count > 0),
    )
}

pub(crate) async fn building_match(
    maps: &MapsService,
    center: Coordinate,
    radius_m: u32,
    language: &str,
) -> ResolveResult<Option<BuildingMatch>> {
    let places = maps.nearby_search(center, radius_m, language).await?;
    let Some(index) = first_max_by_key(&places, building_score) else {
        return Ok(None);
    };
    let place = &places[index];

    let mut name = place.name.clone();
    if name.is_none() {
        if let Some(place_id) = &place.place_id {
            match maps.place_details(place_id, DetailScope::Name, language).await {
                Ok(detail) => name = detail.name,
                Err(err) => warn!(?err, %place_id, "place name lookup failed"),
            }
        }
    }

    Ok(Some(BuildingMatch {
        name,
        place_id: place.place_id.clone(),
    }))
}

pub(crate) async fn route_name(
    maps: &MapsService,
    place_id: &str,
    language: &str,
) -> ResolveResult<Option<String>> {
    let detail = maps
        .place_details(place_id, DetailScope::AddressComponents, language)
        .await?;
    Ok(component_value(&detail.components, "route"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::address::{AddressComponent, GeocodeCandidate};
    use crate::errors::ResolveError;
    use crate::google::{MapsGateway, PlaceDetail};

    #[derive(Default)]
    struct FixedGateway {
        geocode: Mutex<Vec<GeocodeCandidate>>,
        places: Mutex<Vec<PlaceCandidate>>,
        detail: Mutex<Option<PlaceDetail>>,
        detail_error: Mutex<Option<ResolveError>>,
    }

    #[async_trait]
    impl MapsGateway for FixedGateway {
        async fn reverse_geocode(
            &self,
            _query: &GeocodeQuery,
        ) -> ResolveResult<Vec<GeocodeCandidate>> {
            Ok(self.geocode.lock().clone())
        }

        async fn nearby_search(
            &self,
            _center: Coordinate,
            _radius_m: u32,
            _language: &str,
        ) -> ResolveResult<Vec<PlaceCandidate>> {
            Ok(self.places.lock().clone())
        }

        async fn place_details(
            &self,
            _place_id: &str,
            _scope: DetailScope,
            _language: &str,
        ) -> ResolveResult<PlaceDetail> {
            if let Some(err) = self.detail_error.lock().take() {
                return Err(err);
            }
            Ok(self.detail.lock().clone().unwrap_or_default())
        }
    }

    fn service(gateway: FixedGateway) -> MapsService {
        MapsService::from_gateway(Arc::new(gateway))
    }

    fn place(name: Option<&str>, place_id: Option<&str>, types: &[&str], ratings: u32) -> PlaceCandidate {
        PlaceCandidate {
            name: name.map(str::to_string),
            place_id: place_id.map(str::to_string),
            types: types.iter().map(|t| t.to_string()).collect(),
            rating_count: ratings,
        }
    }

    #[tokio::test]
    async fn postal_code_reads_first_candidate() {
        let gateway = FixedGateway::default();
        gateway.geocode.lock().push(GeocodeCandidate {
            formatted_address: "2038 3054, Lebanon".to_string(),
            types: vec!["postal_code".to_string()],
            location_type: crate::address::LocationPrecision::Approximate,
            components: vec![AddressComponent {
                long_name: "2038 3054".to_string(),
                short_name: "2038 3054".to_string(),
                types: vec!["postal_code".to_string()],
            }],
            place_id: None,
            location: Coordinate::new(33.9, 35.6),
            plus_code: None,
        });

        let postal = postal_code(&service(gateway), Coordinate::new(33.9, 35.6), "en", None)
            .await
            .unwrap();
        assert_eq!(postal.as_deref(), Some("2038 3054"));
    }

    #[tokio::test]
    async fn postal_code_absent_when_no_candidates() {
        let postal = postal_code(
            &service(FixedGateway::default()),
            Coordinate::new(33.9, 35.6),
            "en",
            None,
        )
        .await
        .unwrap();
        assert_eq!(postal, None);
    }

    #[tokio::test]
    async fn building_match_prefers_named_building_types() {
        let gateway = FixedGateway::default();
        {
            let mut places = gateway.places.lock();
            places.push(place(None, Some("p-unnamed"), &["premise"], 0));
            places.push(place(Some("Harbor Mall"), Some("p-mall"), &["premise"], 12));
            places.push(place(Some("Bus Stop"), Some("p-stop"), &["transit_station"], 40));
        }

        let matched = building_match(&service(gateway), Coordinate::new(33.9, 35.6), 30, "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(matched.name.as_deref(), Some("Harbor Mall"));
        assert_eq!(matched.place_id.as_deref(), Some("p-mall"));
    }

    #[tokio::test]
    async fn building_match_ties_keep_the_first_place() {
        let gateway = FixedGateway::default();
        {
            let mut places = gateway.places.lock();
            places.push(place(Some("First"), Some("p-1"), &["premise"], 5));
            places.push(place(Some("Second"), Some("p-2"), &["premise"], 5));
        }

        let matched = building_match(&service(gateway), Coordinate::new(33.9, 35.6), 30, "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(matched.name.as_deref(), Some("First"));
    }

    #[tokio::test]
    async fn building_match_fills_missing_name_from_details() {
        let gateway = FixedGateway::default();
        gateway
            .places
            .lock()
            .push(place(None, Some("p-tower"), &["premise"], 0));
        *gateway.detail.lock() = Some(PlaceDetail {
            name: Some("Example Tower".to_string()),
            components: Vec::new(),
        });

        let matched = building_match(&service(gateway), Coordinate::new(33.9, 35.6), 30, "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(matched.name.as_deref(), Some("Example Tower"));
        assert_eq!(matched.place_id.as_deref(), Some("p-tower"));
    }

    #[tokio::test]
    async fn building_match_survives_failed_name_lookup() {
        let gateway = FixedGateway::default();
        gateway
            .places
            .lock()
            .push(place(None, Some("p-tower"), &["premise"], 0));
        *gateway.detail_error.lock() = Some(ResolveError::Provider("boom".to_string()));

        let matched = building_match(&service(gateway), Coordinate::new(33.9, 35.6), 30, "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(matched.name, None);
        assert_eq!(matched.place_id.as_deref(), Some("p-tower"));
    }

    #[tokio::test]
    async fn building_match_empty_results_yield_none() {
        let matched = building_match(
            &service(FixedGateway::default()),
            Coordinate::new(33.9, 35.6),
            30,
            "en",
        )
        .await
        .unwrap();
        assert_eq!(matched, None);
    }

    #[tokio::test]
    async fn route_name_extracts_route_component() {
        let gateway = FixedGateway::default();
        *gateway.detail.lock() = Some(PlaceDetail {
            name: None,
            components: vec![AddressComponent {
                long_name: "King Street".to_string(),
                short_name: "King St".to_string(),
                types: vec!["route".to_string()],
            }],
        });

        let route = route_name(&service(gateway), "p-tower", "en").await.unwrap();
        assert_eq!(route.as_deref(), Some("King Street"));
    }
}
