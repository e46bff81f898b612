use std::sync::Arc;

use async_graphql::{EmptyMutation, EmptySubscription, Schema as GraphQLSchema};

use crate::{app_state::AppState, graphql::QueryRoot};

/// Read-only: every mutation goes through the REST handlers.
pub type Schema = GraphQLSchema<QueryRoot, EmptyMutation, EmptySubscription>;

pub fn create_schema(app_state: Arc<AppState>) -> Schema {
    GraphQLSchema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .data(app_state)
        .limit_depth(8)
        .finish()
}
