//! Route definitions for the AgriStock API

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Account routes (public and protected)
        .nest("/users", user_routes(state.clone()))
        // Protected routes - product catalogue
        .nest("/products", product_routes(state.clone()))
        // Protected routes - stock ledger
        .nest("/transactions", transaction_routes(state.clone()))
        // Protected routes - orders
        .nest("/orders", order_routes(state.clone()))
        // Protected routes - invoices
        .nest("/invoices", invoice_routes(state))
}

/// Account routes
fn user_routes(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/login", post(handlers::sign_in))
        .route("/logout", post(handlers::sign_out))
        .route("/signup", post(handlers::sign_up))
        .route("/refresh_auth", post(handlers::refresh))
        .route("/resend-verification", post(handlers::resend_verification))
        .route("/verifytoken", post(handlers::verify_email))
        .route("/forgotpwd", post(handlers::forgot_password))
        .route("/resetpwd", post(handlers::reset_password));

    let protected = Router::new()
        .route("/all", get(handlers::list_users))
        .route("/profile", get(handlers::profile))
        .route("/:user_id/adminverify", patch(handlers::admin_verify))
        .route("/:user_id/admindelete", delete(handlers::delete_user))
        .route("/:user_id/editDetails", patch(handlers::edit_details))
        .route("/:user_id", delete(handlers::delete_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    public.merge(protected)
}

/// Product catalogue routes (protected)
fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/add", post(handlers::add_product))
        .route("/all", get(handlers::list_products))
        .route(
            "/:id",
            get(handlers::get_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Stock ledger routes (protected)
fn transaction_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/restock/:id", post(handlers::restock_product))
        .route(
            "/issue/:id",
            post(handlers::issue_product).patch(handlers::confirm_pickup),
        )
        .route("/product/:product_id", get(handlers::list_transactions))
        .route(
            "/:transaction_id/product/:product_id",
            delete(handlers::delete_transaction),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Order routes (protected)
fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/create", post(handlers::create_order))
        .route("/all", get(handlers::list_orders))
        .route("/pending-count", get(handlers::pending_orders_count))
        .route("/user/:farmer_id", get(handlers::farmer_orders))
        .route("/:order_id/status", patch(handlers::mark_order_paid))
        .route(
            "/:order_id",
            get(handlers::get_order).patch(handlers::update_order),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Invoice routes (protected)
fn invoice_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/create", post(handlers::create_invoice))
        .route("/all", get(handlers::list_invoices))
        .route(
            "/:invoice_id",
            get(handlers::get_invoice)
                .patch(handlers::update_invoice_status)
                .delete(handlers::delete_invoice),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
