use mongodb::{
    bson::doc,
    options::{ClientOptions, ServerApi, ServerApiVersion},
    Client, ClientSession, Collection,
};
use std::time::Duration;

use crate::{config::Config, errors::AppResult};

pub mod timestamps;

pub const QUESTIONS: &str = "questions";
pub const QUESTION_ATTEMPTS: &str = "question_attempts";
pub const STAGES: &str = "stages";
pub const STAGE_PROGRESS: &str = "stage_progress";
pub const USERS: &str = "users";
pub const CLASSROOMS: &str = "classrooms";
pub const ITEMS: &str = "items";
pub const PLAYER_ITEMS: &str = "player_items";
pub const ACTIVE_EFFECTS: &str = "active_effects";

#[derive(Clone)]
pub struct Database {
    client: Client,
    db_name: String,
}

impl Database {
    pub async fn connect(config: &Config) -> AppResult<Self> {
        let mut client_options = ClientOptions::parse(&config.mongo_conn_string).await?;

        let server_api = ServerApi::builder().version(ServerApiVersion::V1).build();
        client_options.server_api = Some(server_api);
        client_options.max_pool_size = Some(10);
        client_options.min_pool_size = Some(2);
        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let client = Client::with_options(client_options)?;

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;

        log::info!("Connected to MongoDB database '{}'", config.mongo_db_name);

        Ok(Self {
            client,
            db_name: config.mongo_db_name.clone(),
        })
    }

    pub fn get_collection<T>(&self, collection_name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.client
            .database(&self.db_name)
            .collection(collection_name)
    }

    /// Opens a session with a transaction already started.
    /// Requires a replica set or sharded deployment.
    pub async fn begin_transaction(&self) -> AppResult<ClientSession> {
        let mut session = self.client.start_session().await?;
        session.start_transaction().await?;
        Ok(session)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(())
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Commits on success, aborts on failure and hands back the original error.
pub async fn finish_transaction<T>(
    session: &mut ClientSession,
    outcome: AppResult<T>,
) -> AppResult<T> {
    match outcome {
        Ok(value) => {
            session.commit_transaction().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                log::warn!("failed to abort transaction after '{}': {}", err, abort_err);
            }
            Err(err)
        }
    }
}
