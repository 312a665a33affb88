// ABOUTME: Root admin page: resolves a URL to one redirect, a not-found page, or a rendered view
// ABOUTME: Enforces the first-user flow with a single existence read on the user collection

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::admin::auth::session_user_id;
use crate::admin::init_page::init_page;
use crate::admin::routes::{AdminError, AdminState};
use crate::admin::templates::wrap_in_template;
use crate::admin::url::{current_route, format_admin_url, split_segments, SearchParams};
use crate::admin::view::get_view_from_config;
use crate::admin::views::{render_not_found, render_view};

/// The single result of resolving an admin request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootOutcome {
    Redirect(String),
    NotFound,
    /// A complete HTML page (or a bare view for the `none` template)
    Render(String),
}

/// Resolve `segments` (the path below the admin route) for a request
pub async fn resolve_root_page(
    state: &AdminState,
    segments: &[String],
    search_params: &SearchParams,
    session_user_id: Option<&str>,
) -> Result<RootOutcome> {
    let config = state.config.as_ref();
    let admin_route = config.routes.admin.as_str();
    let route = current_route(admin_route, segments);

    let descriptor = get_view_from_config(config, &route, segments, search_params);

    let init = init_page(
        config,
        state.db.as_ref(),
        &descriptor.init_page_options,
        session_user_id,
    )
    .await?;

    if let Some(target) = init.redirect_to {
        tracing::debug!(route = %route, target = %target, "Page init requested redirect");
        return Ok(RootOutcome::Redirect(target));
    }

    let db_has_user = state.db.find_one(&config.admin.user).await?.is_some();
    let disable_local_strategy = config.disable_local_strategy();
    let create_first_user_route =
        format_admin_url(admin_route, &config.admin.routes.create_first_user);

    if route == create_first_user_route {
        if disable_local_strategy || db_has_user {
            return Ok(RootOutcome::Redirect(format_admin_url(admin_route, "")));
        }
    } else if !db_has_user && !disable_local_strategy {
        return Ok(RootOutcome::Redirect(create_first_user_route));
    }

    let Some(view) = descriptor.view else {
        return Ok(RootOutcome::NotFound);
    };
    let Some(rendered) = render_view(state, &view, &init).await? else {
        return Ok(RootOutcome::NotFound);
    };

    let html = wrap_in_template(
        config,
        descriptor.template_type,
        &descriptor.template_class_name,
        &rendered.title,
        rendered.html,
        &init,
    )?;
    Ok(RootOutcome::Render(html))
}

/// GET handler for every admin page
pub async fn root_page(
    State(state): State<AdminState>,
    session: Session,
    uri: Uri,
    Query(search_params): Query<SearchParams>,
) -> Result<Response, AdminError> {
    // Nesting strips the admin route, so this is already the path below it
    let segments = split_segments(uri.path());
    let user_id = session_user_id(&session).await;

    let outcome = resolve_root_page(&state, &segments, &search_params, user_id.as_deref()).await?;

    Ok(match outcome {
        RootOutcome::Redirect(target) => Redirect::temporary(&target).into_response(),
        RootOutcome::NotFound => {
            tracing::debug!(path = %uri.path(), "Admin view not found");
            (StatusCode::NOT_FOUND, Html(render_not_found(&state.config)?)).into_response()
        }
        RootOutcome::Render(html) => Html(html).into_response(),
    })
}
