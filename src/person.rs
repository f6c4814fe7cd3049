//! Adds a person vertex when a user confirms their Cognito sign-up.

use aws_lambda_events::event::cognito::CognitoEventUserPoolsPostConfirmation;
use tracing::info;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::mutation::{AddPerson, Create, MutationDispatcher, MutationType, NewPerson};
use crate::store::GraphStore;

const PERSON_ID: &str = "custom:personId";
const CITY_ID: &str = "custom:cityId";

/// Map a confirmed user onto an `addPerson` write.
///
/// A redelivered event whose user already carries a person id reuses it, so
/// the id guard turns the retry into a no-op.
pub fn person_from_event(event: &CognitoEventUserPoolsPostConfirmation) -> Result<AddPerson> {
    let attributes = &event.request.user_attributes;
    let attribute = |name: &'static str| {
        attributes
            .get(name)
            .cloned()
            .ok_or_else(|| Error::missing(MutationType::AddPerson.name(), name))
    };

    let email = attribute("email")?;
    let username = event
        .cognito_event_user_pools_header
        .user_name
        .clone()
        .unwrap_or_else(|| email.clone());
    let id = attributes
        .get(PERSON_ID)
        .cloned()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Ok(AddPerson {
        id,
        new_person: NewPerson {
            username,
            email,
            first_name: attribute("given_name")?,
            last_name: attribute("family_name")?,
            city_id: attributes.get(CITY_ID).cloned(),
        },
    })
}

/// Write the person for a confirmed user and hand the event back to Cognito.
pub async fn add_confirmed_person<G: GraphStore>(
    dispatcher: &MutationDispatcher<G>,
    event: CognitoEventUserPoolsPostConfirmation,
) -> Result<CognitoEventUserPoolsPostConfirmation> {
    let person = person_from_event(&event)?;
    let id = person.id.clone();
    let result = dispatcher.create(Create::Person(person)).await?;
    info!(person_id = %id, ?result, "confirmed user added to the graph");
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn event(extra: serde_json::Value) -> CognitoEventUserPoolsPostConfirmation {
        let mut attributes = json!({
            "email": "ann@example.com",
            "given_name": "Ann",
            "family_name": "Lee"
        });
        if let (Some(attributes), Some(extra)) = (attributes.as_object_mut(), extra.as_object()) {
            attributes.extend(extra.clone());
        }
        serde_json::from_value(json!({
            "version": "1",
            "triggerSource": "PostConfirmation_ConfirmSignUp",
            "region": "us-east-1",
            "userPoolId": "us-east-1_pool",
            "userName": "ann",
            "callerContext": {
                "awsSdkVersion": "aws-sdk-unknown-unknown",
                "clientId": "client"
            },
            "request": { "userAttributes": attributes },
            "response": {}
        }))
        .unwrap()
    }

    #[test]
    fn maps_attributes() {
        let event = event(json!({ "custom:personId": "p1", "custom:cityId": "c1" }));

        let person = person_from_event(&event).unwrap();

        assert_eq!(
            person,
            AddPerson {
                id: "p1".into(),
                new_person: NewPerson {
                    username: "ann".into(),
                    email: "ann@example.com".into(),
                    first_name: "Ann".into(),
                    last_name: "Lee".into(),
                    city_id: Some("c1".into()),
                },
            }
        );
    }

    #[test]
    fn generates_an_id_for_new_users() {
        let person = person_from_event(&event(json!({}))).unwrap();
        assert!(Uuid::parse_str(&person.id).is_ok());
        assert_eq!(person.new_person.city_id, None);
    }

    #[test]
    fn email_is_required() {
        let mut event = event(json!({}));
        event.request.user_attributes.remove("email");

        match person_from_event(&event) {
            Err(Error::MissingArgument { argument, .. }) => assert_eq!(argument, "email"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
