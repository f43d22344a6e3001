use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use shared_store::AppContext;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

/// Every appointment route sits behind the session gate. The literal
/// segments (`booked`, `availability`) are registered before the `{id}`
/// capture so they never parse as appointment ids.
pub fn appointment_routes(state: Arc<AppContext>) -> Router {
    Router::new()
        .route(
            "/",
            get(handlers::list_appointments).post(handlers::create_appointment),
        )
        .route("/booked", get(handlers::booked_slots))
        .route("/availability", get(handlers::availability))
        .route(
            "/{id}",
            get(handlers::get_appointment)
                .put(handlers::update_appointment)
                .delete(handlers::delete_appointment),
        )
        .route(
            "/{id}/notes",
            get(handlers::list_notes).post(handlers::add_note),
        )
        .route("/{id}/notes/{record_id}", delete(handlers::delete_note))
        .route(
            "/{id}/medications",
            get(handlers::list_medications).post(handlers::add_medication),
        )
        .route(
            "/{id}/medications/{record_id}",
            delete(handlers::delete_medication),
        )
        .route(
            "/{id}/reports",
            get(handlers::list_lab_reports).post(handlers::add_lab_report),
        )
        .route(
            "/{id}/reports/{record_id}",
            delete(handlers::delete_lab_report),
        )
        .route(
            "/{id}/payments",
            get(handlers::list_payments).post(handlers::add_payment),
        )
        .route(
            "/{id}/payments/{record_id}",
            delete(handlers::delete_payment),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
