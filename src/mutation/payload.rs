//! Payloads of the vertex-creating mutations and the writes they map to.

use serde_derive::Deserialize;
use serde_json::{json, Value};

use crate::traversal::{anon, g, Traversal};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerson {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Home city; people created at sign-up may not have one yet.
    #[serde(default)]
    pub city_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPerson {
    pub id: String,
    pub new_person: NewPerson,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCity {
    pub id: String,
    pub name: String,
    pub state_id: String,
}

/// States and cuisines only carry a name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddNamed {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRestaurant {
    pub name: String,
    pub address: String,
    pub city_id: String,
    pub cuisine_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRestaurant {
    pub id: String,
    pub new_restaurant: NewRestaurant,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub rating: f64,
    pub body: String,
    pub person_id: String,
    pub restaurant_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReview {
    pub id: String,
    /// Epoch seconds.
    pub created_at: i64,
    pub new_review: NewReview,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReviewRating {
    pub thumbs_up: bool,
    pub person_id: String,
    pub review_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReviewRating {
    pub id: String,
    /// Epoch seconds.
    pub review_date: i64,
    pub new_review_rating: NewReviewRating,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFriendsEdge {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
}

/// A vertex-creating mutation, guarded by the id-exists check.
#[derive(Debug, Clone, PartialEq)]
pub enum Create {
    Person(AddPerson),
    City(AddCity),
    State(AddNamed),
    Cuisine(AddNamed),
    Restaurant(AddRestaurant),
    Review(AddReview),
    ReviewRating(AddReviewRating),
}

fn vertex(label: &str, id: &str) -> Traversal {
    anon().v().has_on(label, "id", id)
}

impl Create {
    pub fn id(&self) -> &str {
        match self {
            Create::Person(p) => &p.id,
            Create::City(c) => &c.id,
            Create::State(s) | Create::Cuisine(s) => &s.id,
            Create::Restaurant(r) => &r.id,
            Create::Review(r) => &r.id,
            Create::ReviewRating(r) => &r.id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Create::Person(_) => "person",
            Create::City(_) => "city",
            Create::State(_) => "state",
            Create::Cuisine(_) => "cuisine",
            Create::Restaurant(_) => "restaurant",
            Create::Review(_) => "review",
            Create::ReviewRating(_) => "reviewRating",
        }
    }

    /// The vertex and its relationship edges, written in one traversal.
    pub fn traversal(&self) -> Traversal {
        let new = g().add_v(self.label()).property("id", self.id());
        match self {
            Create::Person(AddPerson { new_person: p, .. }) => {
                let person = new
                    .property("username", p.username.as_str())
                    .property("email", p.email.as_str())
                    .property("firstName", p.first_name.as_str())
                    .property("lastName", p.last_name.as_str());
                match &p.city_id {
                    Some(city_id) => person.add_e("livesIn").to(vertex("city", city_id)),
                    None => person,
                }
            }
            Create::City(c) => new
                .property("name", c.name.as_str())
                .add_e("within")
                .to(vertex("state", &c.state_id)),
            Create::State(s) | Create::Cuisine(s) => new.property("name", s.name.as_str()),
            Create::Restaurant(AddRestaurant {
                new_restaurant: r, ..
            }) => new
                .property("name", r.name.as_str())
                .property("address", r.address.as_str())
                .as_("restaurant")
                .add_e("within")
                .to(vertex("city", &r.city_id))
                .select("restaurant")
                .add_e("serves")
                .to(vertex("cuisine", &r.cuisine_id)),
            Create::Review(AddReview {
                created_at,
                new_review: r,
                ..
            }) => new
                .property("createdAt", *created_at)
                .property("rating", r.rating)
                .property("body", r.body.as_str())
                .as_("review")
                .add_e("about")
                .to(vertex("restaurant", &r.restaurant_id))
                .select("review")
                .add_e("wrote")
                .from(vertex("person", &r.person_id)),
            Create::ReviewRating(AddReviewRating {
                review_date,
                new_review_rating: r,
                ..
            }) => new
                .property("reviewDate", *review_date)
                .property("thumbsUp", r.thumbs_up)
                .as_("reviewRating")
                .add_e("about")
                .to(vertex("review", &r.review_id))
                .select("reviewRating")
                .add_e("wrote")
                .from(vertex("person", &r.person_id)),
        }
    }

    /// Echo of what was written; the store is not read back.
    pub fn summary(&self) -> Value {
        let label = self.label();
        match self {
            Create::Person(AddPerson { id, new_person: p }) => json!({
                "id": id,
                "username": p.username,
                "email": p.email,
                "firstName": p.first_name,
                "lastName": p.last_name,
                "cityId": p.city_id,
                "label": label,
            }),
            Create::City(c) => json!({
                "id": c.id,
                "name": c.name,
                "stateId": c.state_id,
                "label": label,
            }),
            Create::State(s) | Create::Cuisine(s) => json!({
                "id": s.id,
                "name": s.name,
                "label": label,
            }),
            Create::Restaurant(AddRestaurant {
                id,
                new_restaurant: r,
            }) => json!({
                "id": id,
                "name": r.name,
                "address": r.address,
                "cityId": r.city_id,
                "cuisineId": r.cuisine_id,
                "label": label,
            }),
            Create::Review(AddReview {
                id,
                created_at,
                new_review: r,
            }) => json!({
                "id": id,
                "createdAt": created_at,
                "rating": r.rating,
                "body": r.body,
                "personId": r.person_id,
                "restaurantId": r.restaurant_id,
                "label": label,
            }),
            Create::ReviewRating(AddReviewRating {
                id,
                review_date,
                new_review_rating: r,
            }) => json!({
                "id": id,
                "reviewDate": review_date,
                "thumbsUp": r.thumbs_up,
                "personId": r.person_id,
                "reviewId": r.review_id,
                "label": label,
            }),
        }
    }
}

impl AddFriendsEdge {
    /// Matches an existing `friends` edge in either direction.
    pub fn existing(&self) -> Traversal {
        g().v()
            .has_on("person", "id", self.from_id.as_str())
            .both("friends")
            .has("id", self.to_id.as_str())
            .limit(1)
    }

    pub fn traversal(&self) -> Traversal {
        g().v()
            .has_on("person", "id", self.from_id.as_str())
            .add_e("friends")
            .to(vertex("person", &self.to_id))
            .property("id", self.id.as_str())
    }

    pub fn summary(&self) -> Value {
        json!({
            "id": self.id,
            "fromId": self.from_id,
            "toId": self.to_id,
            "label": "friends",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn review_write_links_restaurant_and_author() {
        let review: AddReview = serde_json::from_value(json!({
            "id": "rv1",
            "createdAt": 1_620_000_000,
            "newReview": {
                "rating": 4,
                "body": "Great crust",
                "personId": "p1",
                "restaurantId": "r1"
            }
        }))
        .unwrap();

        assert_eq!(
            Create::Review(review).traversal().to_string(),
            "g.addV('review').property('id','rv1').property('createdAt',1620000000)\
             .property('rating',4.0d).property('body','Great crust').as('review')\
             .addE('about').to(__.V().has('restaurant','id','r1'))\
             .select('review').addE('wrote').from(__.V().has('person','id','p1'))"
        );
    }

    #[test]
    fn person_without_city_skips_lives_in() {
        let person: AddPerson = serde_json::from_value(json!({
            "id": "p1",
            "newPerson": {
                "username": "ann",
                "email": "ann@example.com",
                "firstName": "Ann",
                "lastName": "Lee"
            }
        }))
        .unwrap();
        let create = Create::Person(person);

        assert!(!create.traversal().to_string().contains("livesIn"));
        assert_eq!(create.summary()["cityId"], Value::Null);
    }

    #[test]
    fn friends_guard_looks_both_ways() {
        let edge = AddFriendsEdge {
            id: "f1".into(),
            from_id: "a".into(),
            to_id: "b".into(),
        };

        assert_eq!(
            edge.existing().to_string(),
            "g.V().has('person','id','a').both('friends').has('id','b').limit(1)"
        );
    }
}
