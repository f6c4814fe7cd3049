use serde_derive::{Deserialize, Serialize};

/// One rating row as projected by the friends' review traversal.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RatingRow {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedRestaurant {
    pub id: String,
    pub name: Option<String>,
    pub address: Option<String>,
    pub average_rating: f64,
}

/// Collapse rows into one entry per restaurant id, averaging the ratings,
/// then keep the `limit` best by descending average.
///
/// Rows without a rating contribute nothing. Restaurants tied on average
/// keep the order in which they first appeared.
pub fn average_by_restaurant<I>(rows: I, limit: usize) -> Vec<RatedRestaurant>
where
    I: IntoIterator<Item = RatingRow>,
{
    let mut grouped: Vec<(RatingRow, Vec<f64>)> = Vec::new();
    for row in rows {
        let rating = match row.rating {
            Some(rating) => rating,
            None => continue,
        };
        match grouped.iter_mut().find(|(first, _)| first.id == row.id) {
            Some((_, ratings)) => ratings.push(rating),
            None => grouped.push((row, vec![rating])),
        }
    }

    let mut restaurants: Vec<RatedRestaurant> = grouped
        .into_iter()
        .map(|(row, ratings)| RatedRestaurant {
            average_rating: ratings.iter().sum::<f64>() / ratings.len() as f64,
            id: row.id,
            name: row.name,
            address: row.address,
        })
        .collect();
    restaurants.sort_by(|a, b| {
        b.average_rating
            .partial_cmp(&a.average_rating)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    restaurants.truncate(limit);
    restaurants
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(id: &str, rating: Option<f64>) -> RatingRow {
        RatingRow {
            id: id.into(),
            name: Some(format!("{} name", id)),
            address: Some(format!("{} street", id)),
            rating,
        }
    }

    #[test]
    fn groups_strictly_by_id() {
        let rows = vec![
            row("a", Some(2.0)),
            row("b", Some(4.0)),
            row("a", Some(5.0)),
            row("a", None),
        ];

        let ranked = average_by_restaurant(rows, 10);

        assert_eq!(
            ranked,
            vec![
                RatedRestaurant {
                    id: "b".into(),
                    name: Some("b name".into()),
                    address: Some("b street".into()),
                    average_rating: 4.0,
                },
                RatedRestaurant {
                    id: "a".into(),
                    name: Some("a name".into()),
                    address: Some("a street".into()),
                    average_rating: 3.5,
                },
            ]
        );
    }

    #[test]
    fn caps_the_result() {
        let rows = (0..15).map(|i| row(&format!("r{}", i), Some(i as f64)));

        let ranked = average_by_restaurant(rows, 10);

        assert_eq!(ranked.len(), 10);
        assert_eq!(ranked[0].id, "r14");
        assert_eq!(ranked[9].id, "r5");
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let rows = vec![row("x", Some(3.0)), row("y", Some(3.0))];
        let ids: Vec<String> = average_by_restaurant(rows, 10)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["x", "y"]);
    }
}
