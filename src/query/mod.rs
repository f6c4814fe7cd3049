//! Query dispatch.
//!
//! Queries arrive synchronously from AppSync as a field name plus an
//! arguments record and run one read-only traversal each. Two of them
//! post-process the rows in memory.

use std::sync::Arc;

use chrono::Utc;
use serde_derive::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::store::GraphStore;
use crate::traversal::{anon, g, Column, Order, OrderBy, Traversal, P};

mod ranking;

pub use ranking::{average_by_restaurant, RatedRestaurant, RatingRow};

const PERSON: &[&str] = &["id", "username", "email", "firstName", "lastName"];
const RESTAURANT: &[&str] = &["id", "name", "address"];
const REVIEW: &[&str] = &["id", "createdAt", "rating", "body"];
const REVIEW_RATING: &[&str] = &["id", "thumbsUp", "reviewDate"];
const NAMED: &[&str] = &["id", "name"];

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Arguments {
    pub person_id: Option<String>,
    #[serde(rename = "person1Id")]
    pub person1_id: Option<String>,
    #[serde(rename = "person2Id")]
    pub person2_id: Option<String>,
    pub cuisine_ids: Option<Vec<String>>,
    pub restaurant_id: Option<String>,
    pub num_days: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryType {
    GetPerson,
    GetFriends,
    GetFriendsOfFriends,
    FindPathBetweenPeople,
    HighestRatedRestaurantByCuisine,
    HighestRatedRestaurants,
    NewestRestaurantReviews,
    RestaurantsByFriendsRecommendations,
    RestaurantsByFriendsReviewRatings,
    RestaurantsRatedOrReviewedByFriendsInXDays,
    GetAllStates,
    GetAllCities,
    GetAllCuisines,
    GetAllRestaurants,
    GetAllPersons,
    GetAllReviews,
    GetAllReviewRatings,
}

impl QueryType {
    pub const ALL: [QueryType; 17] = [
        QueryType::GetPerson,
        QueryType::GetFriends,
        QueryType::GetFriendsOfFriends,
        QueryType::FindPathBetweenPeople,
        QueryType::HighestRatedRestaurantByCuisine,
        QueryType::HighestRatedRestaurants,
        QueryType::NewestRestaurantReviews,
        QueryType::RestaurantsByFriendsRecommendations,
        QueryType::RestaurantsByFriendsReviewRatings,
        QueryType::RestaurantsRatedOrReviewedByFriendsInXDays,
        QueryType::GetAllStates,
        QueryType::GetAllCities,
        QueryType::GetAllCuisines,
        QueryType::GetAllRestaurants,
        QueryType::GetAllPersons,
        QueryType::GetAllReviews,
        QueryType::GetAllReviewRatings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            QueryType::GetPerson => "getPerson",
            QueryType::GetFriends => "getFriends",
            QueryType::GetFriendsOfFriends => "getFriendsOfFriends",
            QueryType::FindPathBetweenPeople => "findPathBetweenPeople",
            QueryType::HighestRatedRestaurantByCuisine => "highestRatedRestaurantByCuisine",
            QueryType::HighestRatedRestaurants => "highestRatedRestaurants",
            QueryType::NewestRestaurantReviews => "newestRestaurantReviews",
            QueryType::RestaurantsByFriendsRecommendations => {
                "restaurantsByFriendsRecommendations"
            }
            QueryType::RestaurantsByFriendsReviewRatings => "restaurantsByFriendsReviewRatings",
            // The lower-case "in" is part of the published schema.
            QueryType::RestaurantsRatedOrReviewedByFriendsInXDays => {
                "restaurantsRatedOrReviewedByFriendsinXDays"
            }
            QueryType::GetAllStates => "getAllStates",
            QueryType::GetAllCities => "getAllCities",
            QueryType::GetAllCuisines => "getAllCuisines",
            QueryType::GetAllRestaurants => "getAllRestaurants",
            QueryType::GetAllPersons => "getAllPersons",
            QueryType::GetAllReviews => "getAllReviews",
            QueryType::GetAllReviewRatings => "getAllReviewRatings",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|q| q.name() == name)
    }
}

fn require<'a>(
    query: QueryType,
    value: &'a Option<String>,
    argument: &'static str,
) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| Error::missing(query.name(), argument))
}

fn person(id: &str) -> Traversal {
    g().v().has_on("person", "id", id)
}

/// Group restaurants, average the ratings of the reviews about them and keep
/// the best `limit` entries, highest mean first.
fn rank_by_mean_rating(restaurants: Traversal, limit: usize) -> Traversal {
    restaurants
        .group(anon().identity(), anon().in_("about").values("rating").mean())
        .unfold()
        .order(OrderBy::Column(Column::Values), Order::Desc)
        .limit(limit)
}

fn ranked_restaurant() -> Vec<(&'static str, Traversal)> {
    vec![
        ("id", anon().select_column(Column::Keys).values("id")),
        ("name", anon().select_column(Column::Keys).values("name")),
        ("address", anon().select_column(Column::Keys).values("address")),
        ("averageRating", anon().select_column(Column::Values)),
    ]
}

/// Reviews written by the person's friends; ratings of reviews resolve to the
/// review they rate.
fn friends_reviews(person_id: &str) -> Traversal {
    person(person_id)
        .both("friends")
        .out("wrote")
        .optional(anon().has_label("reviewRating").out("about"))
}

/// Runs query invocations against the graph.
pub struct QueryDispatcher<G> {
    graph: Arc<G>,
    clock: fn() -> i64,
}

impl<G> Clone for QueryDispatcher<G> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            clock: self.clock,
        }
    }
}

fn now() -> i64 {
    Utc::now().timestamp()
}

impl<G: GraphStore> QueryDispatcher<G> {
    pub fn new(graph: Arc<G>) -> Self {
        Self { graph, clock: now }
    }

    /// Use `clock` (epoch seconds) for the recency cutoff instead of the
    /// system time.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Dispatch one query.
    ///
    /// Unknown field names resolve to `Ok(None)`, as does a single-record
    /// query that matches nothing.
    #[instrument(skip(self, arguments))]
    pub async fn dispatch(&self, name: &str, arguments: Value) -> Result<Option<Value>> {
        let query = match QueryType::from_name(name) {
            Some(query) => query,
            None => {
                warn!("unknown query {}, nothing to do", name);
                return Ok(None);
            }
        };
        let args: Arguments = match arguments {
            Value::Null => Arguments::default(),
            arguments => {
                serde_json::from_value(arguments).map_err(|e| Error::payload(query.name(), e))?
            }
        };

        let result = self.run(query, &args).await?;
        info!(query = query.name(), ?result, "query result");
        Ok(result)
    }

    async fn run(&self, query: QueryType, args: &Arguments) -> Result<Option<Value>> {
        use QueryType as Q;

        match query {
            Q::GetPerson => {
                let person_id = require(query, &args.person_id, "personId")?;
                self.graph
                    .first(&person(person_id).element_map(PERSON))
                    .await
            }
            Q::GetFriends => {
                let person_id = require(query, &args.person_id, "personId")?;
                self.list(person(person_id).both("friends").dedup().element_map(PERSON))
                    .await
            }
            Q::GetFriendsOfFriends => {
                let person_id = require(query, &args.person_id, "personId")?;
                let t = person(person_id)
                    .both("friends")
                    .both("friends")
                    .dedup()
                    .has_pred("id", P::neq(person_id))
                    .element_map(PERSON);
                self.list(t).await
            }
            Q::FindPathBetweenPeople => {
                let from = require(query, &args.person1_id, "person1Id")?;
                let to = require(query, &args.person2_id, "person2Id")?;
                let t = person(from)
                    .repeat_until(
                        anon().both("friends").simple_path(),
                        anon().has_on("person", "id", to),
                    )
                    .path_by(anon().element_map(PERSON));
                let paths = self
                    .graph
                    .submit(&t)
                    .await?
                    .into_iter()
                    .map(|path| match path {
                        Value::Object(mut path) => path.remove("objects").unwrap_or(Value::Null),
                        other => other,
                    })
                    .collect();
                Ok(Some(Value::Array(paths)))
            }
            Q::HighestRatedRestaurantByCuisine => {
                let person_id = require(query, &args.person_id, "personId")?;
                let mut restaurants = person(person_id).out("livesIn").in_("within");
                if let Some(cuisine_ids) = &args.cuisine_ids {
                    restaurants = restaurants.where_(
                        anon()
                            .out("serves")
                            .has_pred("id", P::within(cuisine_ids.iter().map(String::as_str))),
                    );
                }
                let mut projection = ranked_restaurant();
                projection.push((
                    "cuisine",
                    anon().select_column(Column::Keys).out("serves").values("name"),
                ));
                let t = rank_by_mean_rating(restaurants.where_(anon().in_e("about")), 1)
                    .project(projection);
                self.graph.first(&t).await
            }
            Q::HighestRatedRestaurants => {
                let person_id = require(query, &args.person_id, "personId")?;
                let restaurants = person(person_id)
                    .out("livesIn")
                    .in_("within")
                    .where_(anon().in_e("about"));
                self.list(rank_by_mean_rating(restaurants, 10).project(ranked_restaurant()))
                    .await
            }
            Q::NewestRestaurantReviews => {
                let restaurant_id = require(query, &args.restaurant_id, "restaurantId")?;
                let t = g()
                    .v()
                    .has_on("restaurant", "id", restaurant_id)
                    .in_("about")
                    .order(OrderBy::Property("createdAt".into()), Order::Desc)
                    .limit(3)
                    .element_map(REVIEW);
                self.list(t).await
            }
            Q::RestaurantsByFriendsRecommendations => {
                let person_id = require(query, &args.person_id, "personId")?;
                let city_id = match self.home_city(person_id).await? {
                    Some(city_id) => city_id,
                    None => return Ok(Some(Value::Array(Vec::new()))),
                };
                let restaurants = friends_reviews(person_id)
                    .out("about")
                    .where_(anon().out("within").has_on("city", "id", city_id));
                self.list(rank_by_mean_rating(restaurants, 3).project(ranked_restaurant()))
                    .await
            }
            Q::RestaurantsByFriendsReviewRatings => {
                let person_id = require(query, &args.person_id, "personId")?;
                let city_id = match self.home_city(person_id).await? {
                    Some(city_id) => city_id,
                    None => return Ok(Some(Value::Array(Vec::new()))),
                };
                let t = friends_reviews(person_id)
                    .dedup()
                    .where_(anon().out("about").out("within").has("id", city_id))
                    .project(vec![
                        ("id", anon().out("about").values("id")),
                        ("name", anon().out("about").values("name")),
                        ("address", anon().out("about").values("address")),
                        ("rating", anon().values("rating")),
                    ]);
                let rows = self
                    .graph
                    .submit(&t)
                    .await?
                    .into_iter()
                    .map(serde_json::from_value::<RatingRow>)
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                debug!(rows = rows.len(), "friends' review rows");
                let restaurants = average_by_restaurant(rows, 10);
                Ok(Some(serde_json::to_value(restaurants)?))
            }
            Q::RestaurantsRatedOrReviewedByFriendsInXDays => {
                let person_id = require(query, &args.person_id, "personId")?;
                let num_days = args
                    .num_days
                    .ok_or_else(|| Error::missing(query.name(), "numDays"))?;
                let cutoff = (self.clock)() - num_days * SECONDS_PER_DAY;
                let t = person(person_id)
                    .both("friends")
                    .out("wrote")
                    .union(vec![
                        anon().has_on_pred("review", "createdAt", P::gte(cutoff)),
                        anon()
                            .has_on_pred("reviewRating", "reviewDate", P::gte(cutoff))
                            .out("about"),
                    ])
                    .out("about")
                    .dedup()
                    .order(OrderBy::Property("name".into()), Order::Asc)
                    .element_map(RESTAURANT);
                self.list(t).await
            }
            Q::GetAllStates => self.all("state", NAMED).await,
            Q::GetAllCities => self.all("city", NAMED).await,
            Q::GetAllCuisines => self.all("cuisine", NAMED).await,
            Q::GetAllRestaurants => self.all("restaurant", RESTAURANT).await,
            Q::GetAllPersons => self.all("person", PERSON).await,
            Q::GetAllReviews => self.all("review", REVIEW).await,
            Q::GetAllReviewRatings => self.all("reviewRating", REVIEW_RATING).await,
        }
    }

    async fn list(&self, t: Traversal) -> Result<Option<Value>> {
        Ok(Some(Value::Array(self.graph.submit(&t).await?)))
    }

    async fn all(&self, label: &str, keys: &[&str]) -> Result<Option<Value>> {
        self.list(g().v().has_label(label).element_map(keys)).await
    }

    async fn home_city(&self, person_id: &str) -> Result<Option<String>> {
        let city = self
            .graph
            .first(&person(person_id).out("livesIn").values("id"))
            .await?;
        Ok(city.and_then(|city| city.as_str().map(str::to_owned)))
    }
}
