/*!

# dining_by_friends

Lambda handlers behind a "dining by friends" restaurant recommendation
service, backed by an [Amazon Neptune][Neptune] property graph.

* **Mutations** arrive as [EventBridge][EventBridge] events; the
  `detail-type` names the operation and `detail` carries its payload.
  They are handled by [`MutationHandler`].
* **Queries** arrive from [AppSync][AppSync] direct resolvers as
  `{ "arguments": {..}, "info": { "fieldName": ".." } }` and are answered
  synchronously by [`QueryHandler`].
* **Sign-ups** confirmed in Cognito add a person vertex through
  [`NewPersonHandler`].

Every operation maps to one Gremlin traversal built with the
[`traversal`] module. [`NeptuneGraph`] submits it over HTTPS;
[`MemoryGraph`] evaluates it in process for tests and local runs.

## Example

```no_run
use std::sync::Arc;

use dining_by_friends::{GraphConfig, MutationHandler, NeptuneGraph};

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let config = GraphConfig::from_env()?;
    let handler = MutationHandler::new(Arc::new(NeptuneGraph::writer(&config)));
    lambda_runtime::run(handler).await
}
```

## Configuration

| Variable | Meaning |
| --- | --- |
| `NEPTUNE_WRITER` | writer endpoint host, required |
| `NEPTUNE_READER` | reader endpoint host, used by the query lambda |
| `NEPTUNE_PORT` | Gremlin port, `8182` by default |
| `NEPTUNE_TIMEOUT_SECS` | request timeout, `30` by default |
| `RUST_LOG` | log filter, `info` by default |

[Neptune]: https://aws.amazon.com/neptune/
[EventBridge]: https://aws.amazon.com/eventbridge/
[AppSync]: https://aws.amazon.com/appsync/

*/

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

use aws_lambda_events::event::cognito::CognitoEventUserPoolsPostConfirmation;
use aws_lambda_events::event::eventbridge::EventBridgeEvent;
use lambda_runtime::{Error as LambdaError, LambdaEvent, Service};
use serde_derive::Deserialize;
use serde_json::Value;
use tracing::info;

pub mod config;
pub mod error;
pub mod mutation;
pub mod person;
pub mod query;
pub mod store;
pub mod traversal;

pub use config::GraphConfig;
pub use error::{Error, Result};
pub use mutation::{MutationDispatcher, MutationType, ID_ALREADY_EXISTS};
pub use query::{QueryDispatcher, QueryType};
pub use store::{GraphStore, MemoryGraph, NeptuneGraph};

type HandlerFuture<R> = Pin<Box<dyn Future<Output = std::result::Result<R, LambdaError>> + Send>>;

/// AppSync direct resolver invocation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverEvent {
    #[serde(default)]
    pub arguments: Value,
    pub info: ResolverInfo,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverInfo {
    pub field_name: String,
    #[serde(default)]
    pub parent_type_name: Option<String>,
}

/// EventBridge mutation handler
pub struct MutationHandler<G> {
    dispatcher: Arc<MutationDispatcher<G>>,
}

impl<G: GraphStore + 'static> MutationHandler<G> {
    pub fn new(graph: Arc<G>) -> Self {
        Self {
            dispatcher: Arc::new(MutationDispatcher::new(graph)),
        }
    }
}

impl<G: GraphStore + 'static> Service<LambdaEvent<EventBridgeEvent>> for MutationHandler<G> {
    type Response = Option<Value>;
    type Error = LambdaError;
    type Future = HandlerFuture<Option<Value>>;

    fn poll_ready(
        &mut self,
        _cx: &mut TaskContext<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: LambdaEvent<EventBridgeEvent>) -> Self::Future {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move {
            let (event, context) = event.into_parts();
            info!(
                request_id = %context.request_id,
                detail_type = %event.detail_type,
                detail = %event.detail,
                "mutation event"
            );
            let result = dispatcher.dispatch(&event.detail_type, event.detail).await?;
            Ok(result)
        })
    }
}

/// AppSync query handler
pub struct QueryHandler<G> {
    dispatcher: Arc<QueryDispatcher<G>>,
}

impl<G: GraphStore + 'static> QueryHandler<G> {
    pub fn new(graph: Arc<G>) -> Self {
        Self::with_dispatcher(QueryDispatcher::new(graph))
    }

    pub fn with_dispatcher(dispatcher: QueryDispatcher<G>) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }
}

impl<G: GraphStore + 'static> Service<LambdaEvent<ResolverEvent>> for QueryHandler<G> {
    type Response = Option<Value>;
    type Error = LambdaError;
    type Future = HandlerFuture<Option<Value>>;

    fn poll_ready(
        &mut self,
        _cx: &mut TaskContext<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: LambdaEvent<ResolverEvent>) -> Self::Future {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move {
            let (event, context) = event.into_parts();
            info!(
                request_id = %context.request_id,
                field = %event.info.field_name,
                arguments = %event.arguments,
                "query event"
            );
            let result = dispatcher
                .dispatch(&event.info.field_name, event.arguments)
                .await?;
            Ok(result)
        })
    }
}

/// Cognito post-confirmation handler
pub struct NewPersonHandler<G> {
    dispatcher: Arc<MutationDispatcher<G>>,
}

impl<G: GraphStore + 'static> NewPersonHandler<G> {
    pub fn new(graph: Arc<G>) -> Self {
        Self {
            dispatcher: Arc::new(MutationDispatcher::new(graph)),
        }
    }
}

impl<G: GraphStore + 'static> Service<LambdaEvent<CognitoEventUserPoolsPostConfirmation>>
    for NewPersonHandler<G>
{
    type Response = CognitoEventUserPoolsPostConfirmation;
    type Error = LambdaError;
    type Future = HandlerFuture<CognitoEventUserPoolsPostConfirmation>;

    fn poll_ready(
        &mut self,
        _cx: &mut TaskContext<'_>,
    ) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: LambdaEvent<CognitoEventUserPoolsPostConfirmation>) -> Self::Future {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move {
            let (event, context) = event.into_parts();
            info!(
                request_id = %context.request_id,
                user = ?event.cognito_event_user_pools_header.user_name,
                "post confirmation event"
            );
            let event = person::add_confirmed_person(&dispatcher, event).await?;
            Ok(event)
        })
    }
}
