use crate::address::NormalizedAddress;

pub fn compose(address: &NormalizedAddress) -> (Option<String>, Option<String>) {
    let street_number = address.street_number.as_deref();
    let route = address.route.as_deref();
    let premise = address.premise.as_deref();

    let address1 = match (street_number, route, premise) {
        (Some(number), Some(route), _) => Some(format!("{number} {route}")),
        (_, Some(route), Some(premise)) => Some(format!("{premise} {route}")),
        (_, Some(route), None) => Some(route.to_string()),
        (_, None, Some(premise)) => Some(premise.to_string()),
        (_, None, None) => None,
    };

    let address2 = address
        .subpremise
        .clone()
        .or_else(|| address.neighborhood.clone());

    (address1, address2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Coordinate, GeocodeCandidate, LocationPrecision};

    fn address_with(
        street_number: Option<&str>,
        route: Option<&str>,
        premise: Option<&str>,
    ) -> NormalizedAddress {
        let mut address = NormalizedAddress::from_candidate(GeocodeCandidate {
            formatted_address: "fixture".to_string(),
            types: Vec::new(),
            location_type: LocationPrecision::Rooftop,
            components: Vec::new(),
            place_id: None,
            location: Coordinate::new(0.0, 0.0),
            plus_code: None,
        });
        address.street_number = street_number.map(str::to_string);
        address.route = route.map(str::to_string);
        address.premise = premise.map(str::to_string);
        address
    }

    #[test]
    fn number_and_route_win_over_premise() {
        let address = address_with(Some("12"), Some("Main St"), Some("Tower A"));
        let (address1, _) = compose(&address);
        assert_eq!(address1.as_deref(), Some("12 Main St"));
    }

    #[test]
    fn premise_pairs_with_route_when_number_is_absent() {
        let address = address_with(None, Some("Main St"), Some("Tower A"));
        let (address1, _) = compose(&address);
        assert_eq!(address1.as_deref(), Some("Tower A Main St"));
    }

    #[test]
    fn route_alone_is_used_as_is() {
        let address = address_with(None, Some("Main St"), None);
        let (address1, _) = compose(&address);
        assert_eq!(address1.as_deref(), Some("Main St"));
    }

    #[test]
    fn premise_alone_is_used_as_is() {
        let address = address_with(None, None, Some("Tower A"));
        let (address1, _) = compose(&address);
        assert_eq!(address1.as_deref(), Some("Tower A"));
    }

    #[test]
    fn nothing_usable_leaves_address1_absent() {
        let address = address_with(None, None, None);
        let (address1, address2) = compose(&address);
        assert_eq!(address1, None);
        assert_eq!(address2, None);
    }

    #[test]
    fn orphan_street_number_is_never_emitted_alone() {
        let address = address_with(Some("12"), None, None);
        let (address1, _) = compose(&address);
        assert_eq!(address1, None);
    }

    #[test]
    fn subpremise_takes_precedence_over_neighborhood() {
        let mut address = address_with(Some("12"), Some("Main St"), None);
        address.subpremise = Some("Unit 4".to_string());
        address.neighborhood = Some("Dockside".to_string());

        let (_, address2) = compose(&address);
        assert_eq!(address2.as_deref(), Some("Unit 4"));

        address.subpremise = None;
        let (_, address2) = compose(&address);
        assert_eq!(address2.as_deref(), Some("Dockside"));
    }

    #[test]
    fn composition_is_idempotent() {
        let mut address = address_with(Some("12"), Some("Main St"), Some("Tower A"));
        let (first1, first2) = compose(&address);
        address.address1 = first1.clone();
        address.address2 = first2.clone();

        let (second1, second2) = compose(&address);
        assert_eq!(first1, second1);
        assert_eq!(first2, second2);
    }
}
