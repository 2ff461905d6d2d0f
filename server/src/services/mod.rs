use axum::{
    routing::{get, post},
    Router,
};
use privtx::constants::{
    PARTYINFO_PATH, PARTYINFO_VALIDATE_PATH, PUSH_PATH, PUSH_PRIVACY_GROUP_PATH,
};

use crate::state::AppState;

pub mod partyinfo;
pub mod privacy_groups;
pub mod transactions;

pub async fn upcheck() -> &'static str {
    "I'm up!"
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/upcheck", get(upcheck))
        .route(
            &format!("/{PARTYINFO_PATH}"),
            get(partyinfo::get_party_info).post(partyinfo::post_party_info),
        )
        .route(
            &format!("/{PARTYINFO_VALIDATE_PATH}"),
            post(partyinfo::validate),
        )
        .route(&format!("/{PUSH_PATH}"), post(transactions::push))
        .route("/resend", post(transactions::resend))
        .route("/send", post(transactions::send))
        .route("/storeraw", post(transactions::store_raw))
        .route("/sendsignedtx", post(transactions::send_signed))
        .route(
            "/transaction/{hash}",
            get(transactions::receive).delete(transactions::delete),
        )
        .route(
            &format!("/{PUSH_PRIVACY_GROUP_PATH}"),
            post(privacy_groups::push_privacy_group),
        )
        .route(
            "/createPrivacyGroup",
            post(privacy_groups::create_privacy_group),
        )
        .route("/findPrivacyGroup", post(privacy_groups::find_privacy_group))
        .route(
            "/retrievePrivacyGroup",
            post(privacy_groups::retrieve_privacy_group),
        )
        .route(
            "/deletePrivacyGroup",
            post(privacy_groups::delete_privacy_group),
        )
        .with_state(state)
}
