use uuid::Uuid;
use warp::Filter;

use crate::handlers::{self, AppContext};
use crate::models::User;

const FORM_SIZE_LIMIT: u64 = 16 * 1024;
const UPLOAD_SIZE_LIMIT: u64 = 16 * 1024 * 1024;

fn with_ctx(
    ctx: AppContext,
) -> impl Filter<Extract = (AppContext,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || ctx.clone())
}

/// Resolves the session cookie to a user. Anything short of a valid token
/// backed by an existing account is the anonymous state.
fn with_session(
    ctx: AppContext,
) -> impl Filter<Extract = (Option<User>,), Error = std::convert::Infallible> + Clone {
    warp::cookie::optional::<String>("session")
        .and(with_ctx(ctx))
        .and_then(|token: Option<String>, ctx: AppContext| async move {
            let user = match token {
                Some(token) => ctx.auth.current_user(&token).await,
                None => None,
            };
            Ok::<_, std::convert::Infallible>(user)
        })
}

fn flash_cookie() -> impl Filter<Extract = (Option<String>,), Error = std::convert::Infallible> + Clone
{
    warp::cookie::optional::<String>("flash")
}

pub fn make_routes(
    ctx: AppContext,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let session = with_session(ctx.clone());

    // Public pages
    let home = warp::path::end()
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and_then(handlers::home);

    let login_page = warp::path!("auth" / "login")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and_then(handlers::login_page);

    let login_submit = warp::path!("auth" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(FORM_SIZE_LIMIT))
        .and(warp::body::form())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::login_submit);

    let register_page = warp::path!("auth" / "register")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and_then(handlers::register_page);

    let register_submit = warp::path!("auth" / "register")
        .and(warp::post())
        .and(warp::body::content_length_limit(FORM_SIZE_LIMIT))
        .and(warp::body::form())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::register_submit);

    let bootstrap_admin = warp::path!("auth" / "bootstrap-admin")
        .and(warp::post())
        .and(warp::body::content_length_limit(FORM_SIZE_LIMIT))
        .and(warp::body::form())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::bootstrap_admin);

    let logout = warp::path!("auth" / "logout")
        .and(warp::get())
        .and_then(|| handlers::logout());

    // Authenticated pages
    let dashboard = warp::path!("dashboard")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::dashboard);

    let chat_page = warp::path!("chat")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::chat_page);

    // Chat API
    let api_chat_send = warp::path!("api" / "chat" / "send")
        .and(warp::post())
        .and(session.clone())
        .and(warp::body::content_length_limit(FORM_SIZE_LIMIT))
        .and(warp::body::json())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::api_chat_send);

    let api_chat_history = warp::path!("api" / "chat" / "history")
        .and(warp::get())
        .and(session.clone())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::api_chat_history);

    let api_chat_clear = warp::path!("api" / "chat" / "clear")
        .and(warp::post())
        .and(session.clone())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::api_chat_clear);

    let api_agent_info = warp::path!("api" / "chat" / "agent-info")
        .and(warp::get())
        .and(session.clone())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::api_agent_info);

    // Admin surface
    let admin_dashboard = warp::path!("admin")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::admin_dashboard);

    let admin_users = warp::path!("admin" / "users")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::admin_users);

    let admin_upload_page = warp::path!("admin" / "upload")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and_then(handlers::admin_upload_page);

    let admin_upload_submit = warp::path!("admin" / "upload")
        .and(warp::post())
        .and(session.clone())
        .and(warp::multipart::form().max_length(UPLOAD_SIZE_LIMIT))
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::admin_upload_submit);

    let admin_documents = warp::path!("admin" / "documents")
        .and(warp::get())
        .and(session.clone())
        .and(flash_cookie())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::admin_documents);

    let admin_delete_document = warp::path!("admin" / "delete-document" / Uuid)
        .and(warp::post())
        .and(session.clone())
        .and(with_ctx(ctx.clone()))
        .and_then(handlers::admin_delete_document);

    let admin_document_url = warp::path!("admin" / "document-url" / Uuid)
        .and(warp::get())
        .and(session)
        .and(with_ctx(ctx))
        .and_then(handlers::admin_document_url);

    home.or(login_page)
        .or(login_submit)
        .or(register_page)
        .or(register_submit)
        .or(bootstrap_admin)
        .or(logout)
        .or(dashboard)
        .or(chat_page)
        .or(api_chat_send)
        .or(api_chat_history)
        .or(api_chat_clear)
        .or(api_agent_info)
        .or(admin_dashboard)
        .or(admin_users)
        .or(admin_upload_page)
        .or(admin_upload_submit)
        .or(admin_documents)
        .or(admin_delete_document)
        .or(admin_document_url)
        .with(warp::log("document_portal"))
}
