pub mod graphql_handler;
pub mod health_handler;
pub mod item_handler;
pub mod leaderboard_handler;
pub mod profile_handler;
pub mod question_handler;
pub mod stage_handler;

use actix_web::web;

pub use graphql_handler::graphql;
pub use health_handler::{health_check, health_check_live, health_check_ready};
pub use item_handler::{
    equip_item, get_active_effects, get_inventory, purchase_item, use_item, use_quiz_item,
};
pub use leaderboard_handler::get_leaderboard;
pub use profile_handler::get_profile;
pub use question_handler::{random_question, submit_answer};
pub use stage_handler::{complete_session, next_stage_question, stage_progress, start_session};

/// Routes mounted under the authenticated `/api` scope.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    cfg.service(random_question)
        .service(submit_answer)
        .service(next_stage_question)
        .service(start_session)
        .service(complete_session)
        .service(stage_progress)
        .service(use_item)
        .service(use_quiz_item)
        .service(purchase_item)
        .service(equip_item)
        .service(get_inventory)
        .service(get_active_effects)
        .service(get_leaderboard)
        .service(get_profile)
        .service(graphql);
}

pub fn configure_health(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(health_check_live)
        .service(health_check_ready);
}
