use crate::address::{GeocodeCandidate, LocationPrecision};

const ADDRESS_TYPES: &[&str] = &["street_address", "premise", "subpremise"];
const POI_TYPES: &[&str] = &["establishment", "point_of_interest"];

// Ties keep the earliest element.
pub(crate) fn first_max_by_key<T, K, F>(items: &[T], mut key: F) -> Option<usize>
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    let mut best: Option<(usize, K)> = None;
    for (index, item) in items.iter().enumerate() {
        let score = key(item);
        let improves = match &best {
            None => true,
            Some((_, top)) => score > *top,
        };
        if improves {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}

pub(crate) fn intersects(types: &[String], wanted: &[&str]) -> bool {
    types.iter().any(|t| wanted.contains(&t.as_str()))
}

fn type_score(candidate: &GeocodeCandidate) -> u8 {
    if intersects(&candidate.types, ADDRESS_TYPES) {
        2
    } else if intersects(&candidate.types, POI_TYPES) {
        1
    } else {
        0
    }
}

pub fn best_candidate(candidates: &[GeocodeCandidate]) -> Option<&GeocodeCandidate> {
    first_max_by_key(candidates, |candidate| {
        (
            type_score(candidate),
            u8::from(candidate.location_type == LocationPrecision::Rooftop),
        )
    })
    .map(|index| &candidates[index])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Coordinate;

    fn candidate(types: &[&str], precision: LocationPrecision, label: &str) -> GeocodeCandidate {
        GeocodeCandidate {
            formatted_address: label.to_string(),
            types: types.iter().map(|t| t.to_string()).collect(),
            location_type: precision,
            components: Vec::new(),
            place_id: None,
            location: Coordinate::new(0.0, 0.0),
            plus_code: None,
        }
    }

    #[test]
    fn empty_input_selects_nothing() {
        assert!(best_candidate(&[]).is_none());
    }

    #[test]
    fn address_type_outranks_poi_type() {
        let candidates = vec![
            candidate(
                &["point_of_interest", "establishment"],
                LocationPrecision::Rooftop,
                "poi",
            ),
            candidate(&["premise"], LocationPrecision::RangeInterpolated, "building"),
        ];

        let selected = best_candidate(&candidates).unwrap();
        assert_eq!(selected.formatted_address, "building");
    }

    #[test]
    fn rooftop_breaks_ties_within_same_type_score() {
        let candidates = vec![
            candidate(&["street_address"], LocationPrecision::RangeInterpolated, "a"),
            candidate(&["street_address"], LocationPrecision::Rooftop, "b"),
        ];

        let selected = best_candidate(&candidates).unwrap();
        assert_eq!(selected.formatted_address, "b");
    }

    #[test]
    fn full_tie_keeps_the_first_candidate() {
        let candidates = vec![
            candidate(&["premise"], LocationPrecision::Rooftop, "first"),
            candidate(&["premise"], LocationPrecision::Rooftop, "second"),
            candidate(&["premise"], LocationPrecision::Rooftop, "third"),
        ];

        for _ in 0..3 {
            let selected = best_candidate(&candidates).unwrap();
            assert_eq!(selected.formatted_address, "first");
        }
    }

    #[test]
    fn poi_candidate_beats_untyped_candidate() {
        let candidates = vec![
            candidate(&["plus_code"], LocationPrecision::Rooftop, "untyped"),
            candidate(&["establishment"], LocationPrecision::Approximate, "poi"),
        ];

        let selected = best_candidate(&candidates).unwrap();
        assert_eq!(selected.formatted_address, "poi");
    }

    #[test]
    fn rooftop_premise_outranks_interpolated_poi() {
        let candidates = vec![
            candidate(
                &["point_of_interest"],
                LocationPrecision::RangeInterpolated,
                "poi",
            ),
            candidate(&["premise"], LocationPrecision::Rooftop, "building"),
        ];

        let selected = best_candidate(&candidates).unwrap();
        assert_eq!(selected.formatted_address, "building");
    }

    #[test]
    fn first_max_prefers_earliest_on_equal_keys() {
        let items = [3, 1, 3, 2];
        assert_eq!(first_max_by_key(&items, |value| *value), Some(0));
    }
}
