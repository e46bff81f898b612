use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use actix_web_httpauth::middleware::HttpAuthentication;

use adventure_server::{
    app_state::AppState,
    auth::{validate_bearer, JwtService},
    config::Config,
    graphql::create_schema,
    handlers,
    middleware::RequestIdMiddleware,
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env();
    if cfg!(not(debug_assertions)) {
        config.validate_for_production();
    }

    let host = config.web_server_host.clone();
    let port = config.web_server_port;
    let jwt_service = JwtService::new(&config.jwt_secret, config.jwt_expiration_hours);

    let state = match AppState::new(config).await {
        Ok(state) => Arc::new(state),
        Err(err) => {
            log::error!("failed to initialise application state: {}", err);
            return Err(std::io::Error::other(err.to_string()));
        }
    };
    let schema = create_schema(state.clone());

    log::info!("starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .app_data(web::Data::new(schema.clone()))
            .wrap(Cors::permissive())
            .wrap(Logger::default())
            .wrap(RequestIdMiddleware)
            .configure(handlers::configure_health)
            .service(
                web::scope("/api")
                    .wrap(HttpAuthentication::bearer(validate_bearer))
                    .configure(handlers::configure_api),
            )
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
