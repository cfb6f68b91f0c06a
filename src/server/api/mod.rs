mod auth;
mod files;
mod groups;
mod permissions;
mod roles;
mod shares;
mod users;
mod versions;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::server::AppState;

pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Sessions
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        // Permission catalog and roles
        .route("/permissions", get(permissions::list_permissions))
        .route("/permissions/{id}", get(permissions::get_permission))
        .route("/roles", get(roles::list_roles).post(roles::create_role))
        .route(
            "/roles/{id}",
            get(roles::get_role)
                .put(roles::update_role)
                .delete(roles::delete_role),
        )
        // Groups (hierarchical)
        .route("/groups", get(groups::list_groups).post(groups::create_group))
        .route("/groups/tree", get(groups::group_tree))
        .route(
            "/groups/{id}",
            get(groups::get_group)
                .put(groups::update_group)
                .delete(groups::delete_group),
        )
        .route(
            "/groups/{id}/members/{user_id}",
            put(groups::add_member).delete(groups::remove_member),
        )
        // Files
        .route("/files", get(files::list_files).post(files::upload_file))
        .route("/files/shared", get(files::list_shared_files))
        .route(
            "/files/{id}",
            get(files::get_file)
                .put(files::update_file)
                .delete(files::delete_file),
        )
        .route("/files/{id}/content", get(files::download_file))
        // Versions
        .route(
            "/files/{id}/versions",
            get(versions::list_versions).post(versions::create_version),
        )
        .route("/files/{id}/versions/upload", post(versions::upload_version))
        .route("/files/{id}/current-version", put(versions::set_current_version))
        .route(
            "/versions/{id}",
            put(versions::rename_version).delete(versions::delete_version),
        )
        .route("/versions/{id}/content", get(versions::download_version))
        // Sharing
        .route("/files/{id}/permissions", get(shares::file_permissions))
        .route(
            "/files/{id}/shares/users/{user_id}",
            put(shares::share_with_user).delete(shares::revoke_user),
        )
        .route(
            "/files/{id}/shares/groups/{group_id}",
            put(shares::share_with_group).delete(shares::revoke_group),
        )
}
