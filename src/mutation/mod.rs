//! Mutation dispatch.
//!
//! Every mutation arrives as an EventBridge event whose `detail-type` is the
//! operation name. Creates are guarded by an existence check, updates
//! overwrite one single-cardinality property, deletes drop an element.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::store::GraphStore;
use crate::traversal::{g, Traversal};

mod payload;

pub use payload::{
    AddCity, AddFriendsEdge, AddNamed, AddPerson, AddRestaurant, AddReview, AddReviewRating,
    Create, NewPerson, NewRestaurant, NewReview, NewReviewRating,
};

/// Sentinel returned when a create targets an id that is already taken.
pub const ID_ALREADY_EXISTS: &str = "Id already exists. No need to run the query.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationType {
    AddPerson,
    AddUpdateFirstName,
    AddUpdateLastName,
    DeletePerson,
    AddCity,
    UpdateCityName,
    DeleteCity,
    AddState,
    UpdateStateName,
    DeleteState,
    AddCuisine,
    UpdateCuisineName,
    DeleteCuisine,
    AddRestaurant,
    UpdateRestaurantName,
    UpdateRestaurantAddress,
    DeleteRestaurant,
    AddReview,
    DeleteReview,
    AddReviewRating,
    DeleteReviewRating,
    AddFriendsEdge,
    DeleteFriendsEdge,
}

/// What an update or delete does to the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Effect {
    Update {
        label: &'static str,
        id_field: &'static str,
        value_field: &'static str,
        property: &'static str,
    },
    DropVertex {
        label: &'static str,
        id_field: &'static str,
    },
    DropEdge {
        label: &'static str,
        id_field: &'static str,
    },
}

impl MutationType {
    pub const ALL: [MutationType; 23] = [
        MutationType::AddPerson,
        MutationType::AddUpdateFirstName,
        MutationType::AddUpdateLastName,
        MutationType::DeletePerson,
        MutationType::AddCity,
        MutationType::UpdateCityName,
        MutationType::DeleteCity,
        MutationType::AddState,
        MutationType::UpdateStateName,
        MutationType::DeleteState,
        MutationType::AddCuisine,
        MutationType::UpdateCuisineName,
        MutationType::DeleteCuisine,
        MutationType::AddRestaurant,
        MutationType::UpdateRestaurantName,
        MutationType::UpdateRestaurantAddress,
        MutationType::DeleteRestaurant,
        MutationType::AddReview,
        MutationType::DeleteReview,
        MutationType::AddReviewRating,
        MutationType::DeleteReviewRating,
        MutationType::AddFriendsEdge,
        MutationType::DeleteFriendsEdge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MutationType::AddPerson => "addPerson",
            MutationType::AddUpdateFirstName => "addUpdateFirstName",
            MutationType::AddUpdateLastName => "addUpdateLastName",
            MutationType::DeletePerson => "deletePerson",
            MutationType::AddCity => "addCity",
            MutationType::UpdateCityName => "updateCityName",
            MutationType::DeleteCity => "deleteCity",
            MutationType::AddState => "addState",
            MutationType::UpdateStateName => "updateStateName",
            MutationType::DeleteState => "deleteState",
            MutationType::AddCuisine => "addCuisine",
            MutationType::UpdateCuisineName => "updateCuisineName",
            MutationType::DeleteCuisine => "deleteCuisine",
            MutationType::AddRestaurant => "addRestaurant",
            MutationType::UpdateRestaurantName => "updateRestaurantName",
            MutationType::UpdateRestaurantAddress => "updateRestaurantAddress",
            MutationType::DeleteRestaurant => "deleteRestaurant",
            MutationType::AddReview => "addReview",
            MutationType::DeleteReview => "deleteReview",
            MutationType::AddReviewRating => "addReviewRating",
            MutationType::DeleteReviewRating => "deleteReviewRating",
            MutationType::AddFriendsEdge => "addFriendsEdge",
            MutationType::DeleteFriendsEdge => "deleteFriendsEdge",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.name() == name)
    }

    /// Updates and deletes; `None` for the creating mutations.
    fn effect(self) -> Option<Effect> {
        use MutationType as M;

        let update = |label, id_field, value_field, property| Effect::Update {
            label,
            id_field,
            value_field,
            property,
        };
        let drop_vertex = |label, id_field| Effect::DropVertex { label, id_field };

        Some(match self {
            M::AddPerson
            | M::AddCity
            | M::AddState
            | M::AddCuisine
            | M::AddRestaurant
            | M::AddReview
            | M::AddReviewRating
            | M::AddFriendsEdge => return None,
            M::AddUpdateFirstName => update("person", "personId", "firstName", "firstName"),
            M::AddUpdateLastName => update("person", "personId", "lastName", "lastName"),
            M::UpdateCityName => update("city", "cityId", "newName", "name"),
            M::UpdateStateName => update("state", "stateId", "newName", "name"),
            M::UpdateCuisineName => update("cuisine", "cuisineId", "newName", "name"),
            M::UpdateRestaurantName => update("restaurant", "restaurantId", "newName", "name"),
            M::UpdateRestaurantAddress => {
                update("restaurant", "restaurantId", "newAddress", "address")
            }
            M::DeletePerson => drop_vertex("person", "personId"),
            M::DeleteCity => drop_vertex("city", "cityId"),
            M::DeleteState => drop_vertex("state", "stateId"),
            M::DeleteCuisine => drop_vertex("cuisine", "cuisineId"),
            M::DeleteRestaurant => drop_vertex("restaurant", "restaurantId"),
            M::DeleteReview => drop_vertex("review", "reviewId"),
            M::DeleteReviewRating => drop_vertex("reviewRating", "reviewRatingId"),
            M::DeleteFriendsEdge => Effect::DropEdge {
                label: "friends",
                id_field: "friendsEdgeId",
            },
        })
    }
}

fn parse<T: DeserializeOwned>(mutation: MutationType, detail: Value) -> Result<T> {
    serde_json::from_value(detail).map_err(|e| Error::payload(mutation.name(), e))
}

fn string_field(mutation: MutationType, detail: &Value, field: &'static str) -> Result<String> {
    detail
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| Error::missing(mutation.name(), field))
}

/// Runs mutation events against the graph.
pub struct MutationDispatcher<G> {
    graph: Arc<G>,
}

impl<G> Clone for MutationDispatcher<G> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
        }
    }
}

impl<G: GraphStore> MutationDispatcher<G> {
    pub fn new(graph: Arc<G>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &G {
        &self.graph
    }

    /// Dispatch one mutation.
    ///
    /// Unknown operation names resolve to `Ok(None)`. Store failures are
    /// returned unchanged; nothing is retried here.
    #[instrument(skip(self, detail))]
    pub async fn dispatch(&self, name: &str, detail: Value) -> Result<Option<Value>> {
        let mutation = match MutationType::from_name(name) {
            Some(mutation) => mutation,
            None => {
                warn!("unknown mutation {}, nothing to do", name);
                return Ok(None);
            }
        };

        use MutationType as M;

        let create = match mutation {
            M::AddFriendsEdge => return self.add_friends_edge(parse(mutation, detail)?).await,
            M::AddPerson => Create::Person(parse(mutation, detail)?),
            M::AddCity => Create::City(parse(mutation, detail)?),
            M::AddState => Create::State(parse(mutation, detail)?),
            M::AddCuisine => Create::Cuisine(parse(mutation, detail)?),
            M::AddRestaurant => Create::Restaurant(parse(mutation, detail)?),
            M::AddReview => Create::Review(parse(mutation, detail)?),
            M::AddReviewRating => Create::ReviewRating(parse(mutation, detail)?),
            _ => return self.modify(mutation, &detail).await,
        };
        self.create(create).await
    }

    async fn modify(&self, mutation: MutationType, detail: &Value) -> Result<Option<Value>> {
        match mutation.effect() {
            Some(Effect::Update {
                label,
                id_field,
                value_field,
                property,
            }) => {
                let id = string_field(mutation, detail, id_field)?;
                let value = string_field(mutation, detail, value_field)?;
                let t = g()
                    .v()
                    .has_on(label, "id", id.as_str())
                    .property_single(property, value.as_str());
                self.run(&t).await?;
                Ok(Some(json!({ "id": id, property: value, "label": label })))
            }
            Some(Effect::DropVertex { label, id_field }) => {
                let id = string_field(mutation, detail, id_field)?;
                self.run(&g().v().has_on(label, "id", id.as_str()).drop())
                    .await?;
                Ok(Some(json!({ "id": id, "label": label })))
            }
            Some(Effect::DropEdge { label, id_field }) => {
                let id = string_field(mutation, detail, id_field)?;
                self.run(&g().e().has_on(label, "id", id.as_str()).drop())
                    .await?;
                Ok(Some(json!({ "id": id, "label": label })))
            }
            None => Ok(None),
        }
    }

    /// Create a vertex unless its id is already taken.
    pub async fn create(&self, create: Create) -> Result<Option<Value>> {
        if self.id_exists(create.id()).await? {
            info!(id = create.id(), "id already exists, skipping write");
            return Ok(Some(json!({ "result": ID_ALREADY_EXISTS })));
        }
        self.run(&create.traversal()).await?;
        Ok(Some(create.summary()))
    }

    /// Connected pairs are skipped silently, without the id sentinel.
    async fn add_friends_edge(&self, edge: AddFriendsEdge) -> Result<Option<Value>> {
        if self.graph.first(&edge.existing()).await?.is_some() {
            info!(
                from = %edge.from_id,
                to = %edge.to_id,
                "friends edge already exists, skipping write"
            );
            return Ok(None);
        }
        self.run(&edge.traversal()).await?;
        Ok(Some(edge.summary()))
    }

    async fn id_exists(&self, id: &str) -> Result<bool> {
        let exists = self
            .graph
            .first(&g().v().has("id", id).limit(1))
            .await?
            .is_some();
        debug!(id, exists, "id exists check");
        Ok(exists)
    }

    async fn run(&self, t: &Traversal) -> Result<()> {
        let result = self.graph.submit(t).await?;
        debug!(?result, "gremlin query result");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for mutation in MutationType::ALL.iter().copied() {
            assert_eq!(MutationType::from_name(mutation.name()), Some(mutation));
        }
        assert_eq!(MutationType::from_name("AddPerson"), None);
    }

    #[test]
    fn only_adds_create() {
        for mutation in MutationType::ALL.iter().copied() {
            assert_eq!(
                mutation.effect().is_none(),
                mutation.name().starts_with("add") && !mutation.name().starts_with("addUpdate"),
                "{}",
                mutation.name()
            );
        }
    }
}
