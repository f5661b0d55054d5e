use std::convert::Infallible;
use std::sync::Arc;

use bytes::Buf;
use futures::TryStreamExt;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use warp::http::{StatusCode, Uri};
use warp::multipart::{FormData, Part};
use warp::Reply;

use crate::errors::ServiceError;
use crate::models::User;
use crate::pages::{self, Flash};
use crate::services::auth_service::AuthService;
use crate::services::chat_service::{ChatService, ChatTurn};
use crate::services::document_service::{DocumentService, NewUpload};

#[derive(Clone)]
pub struct AppContext {
    pub auth: Arc<AuthService>,
    pub chat: Arc<ChatService>,
    pub documents: Arc<DocumentService>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Deserialize)]
pub struct BootstrapAdminForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

type Response = warp::reply::Response;
type HandlerResult = Result<Response, Infallible>;

// ---- reply helpers ----------------------------------------------------

const CLEAR_FLASH: &str = "flash=; Path=/; Max-Age=0";
const CLEAR_SESSION: &str = "session=; Path=/; HttpOnly; Max-Age=0";

fn page(html: String, had_flash: bool) -> Response {
    let reply = warp::reply::html(html);
    if had_flash {
        warp::reply::with_header(reply, "set-cookie", CLEAR_FLASH).into_response()
    } else {
        reply.into_response()
    }
}

fn see_other(location: &'static str) -> Response {
    warp::redirect::see_other(Uri::from_static(location)).into_response()
}

fn flash_cookie(level: &str, message: &str) -> String {
    format!(
        "flash={}:{}; Path=/; Max-Age=60",
        level,
        urlencoding::encode(message)
    )
}

fn redirect_flash(location: &'static str, level: &str, message: &str) -> Response {
    warp::reply::with_header(
        warp::redirect::see_other(Uri::from_static(location)),
        "set-cookie",
        flash_cookie(level, message),
    )
    .into_response()
}

pub fn parse_flash(cookie: Option<String>) -> Option<Flash> {
    let raw = cookie?;
    let (level, encoded) = raw.split_once(':')?;
    let message = urlencoding::decode(encoded).ok()?.into_owned();
    Some(Flash {
        level: level.to_string(),
        message,
    })
}

fn json_with_status(status: StatusCode, value: serde_json::Value) -> Response {
    warp::reply::with_status(warp::reply::json(&value), status).into_response()
}

fn unauthorized_json() -> Response {
    json_with_status(
        StatusCode::UNAUTHORIZED,
        json!({ "success": false, "error": "no autorizado" }),
    )
}

fn forbidden_json() -> Response {
    json_with_status(
        StatusCode::FORBIDDEN,
        json!({ "success": false, "error": "se requiere rol de administrador" }),
    )
}

/// User-facing text for an error; internal details stay in the logs.
fn flash_message(err: &ServiceError) -> String {
    match err {
        ServiceError::Validation(message) => message.clone(),
        ServiceError::EmailTaken => "este email ya está registrado".to_string(),
        ServiceError::InvalidCredentials => "email o contraseña incorrectos".to_string(),
        other => {
            error!("request failed: {}", other);
            "ocurrió un error inesperado, intenta de nuevo".to_string()
        }
    }
}

fn landing_for(user: &User) -> &'static str {
    if user.is_admin() {
        "/admin"
    } else {
        "/dashboard"
    }
}

// ---- public pages -----------------------------------------------------

pub async fn home(user: Option<User>, flash: Option<String>) -> HandlerResult {
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    Ok(page(pages::home(user.as_ref(), flash.as_ref()), had_flash))
}

pub async fn login_page(user: Option<User>, flash: Option<String>) -> HandlerResult {
    if let Some(user) = user {
        return Ok(see_other(landing_for(&user)));
    }
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    Ok(page(pages::login(flash.as_ref()), had_flash))
}

pub async fn login_submit(form: LoginForm, ctx: AppContext) -> HandlerResult {
    match ctx.auth.login(&form.email, &form.password).await {
        Ok((user, token)) => {
            info!("user {} logged in", user.email);
            let session = format!(
                "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age=86400",
                token
            );
            let reply = warp::reply::with_header(
                warp::redirect::see_other(Uri::from_static("/")),
                "set-cookie",
                session,
            );
            Ok(reply.into_response())
        }
        Err(err) => Ok(redirect_flash("/auth/login", "error", &flash_message(&err))),
    }
}

pub async fn register_page(user: Option<User>, flash: Option<String>) -> HandlerResult {
    if let Some(user) = user {
        return Ok(see_other(landing_for(&user)));
    }
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    Ok(page(pages::register(flash.as_ref()), had_flash))
}

pub async fn register_submit(form: RegisterForm, ctx: AppContext) -> HandlerResult {
    match ctx
        .auth
        .register(&form.email, &form.password, &form.confirm_password)
        .await
    {
        Ok(user) => {
            info!("registered new user {}", user.email);
            Ok(redirect_flash(
                "/auth/login",
                "success",
                "cuenta creada, ya puedes iniciar sesión",
            ))
        }
        Err(err) => Ok(redirect_flash("/auth/register", "error", &flash_message(&err))),
    }
}

/// One-time setup endpoint; refused once an admin account exists.
pub async fn bootstrap_admin(form: BootstrapAdminForm, ctx: AppContext) -> HandlerResult {
    match ctx.auth.bootstrap_admin(&form.email, &form.password).await {
        Ok(user) => {
            info!("bootstrapped admin account {}", user.email);
            Ok(json_with_status(
                StatusCode::CREATED,
                json!({ "success": true, "email": user.email }),
            ))
        }
        Err(err) => Ok(json_with_status(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "error": flash_message(&err) }),
        )),
    }
}

pub async fn logout() -> HandlerResult {
    let reply = warp::reply::with_header(
        warp::redirect::see_other(Uri::from_static("/")),
        "set-cookie",
        CLEAR_SESSION,
    );
    Ok(reply.into_response())
}

// ---- user pages -------------------------------------------------------

pub async fn dashboard(user: Option<User>, flash: Option<String>, ctx: AppContext) -> HandlerResult {
    let user = match user {
        Some(user) => user,
        None => return Ok(redirect_flash("/auth/login", "error", "inicia sesión primero")),
    };
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    match ctx.documents.list_for_owner(user.user_id).await {
        Ok(documents) => Ok(page(
            pages::dashboard(&user, &documents, flash.as_ref()),
            had_flash,
        )),
        Err(err) => {
            error!("listing documents for {} failed: {}", user.user_id, err);
            Ok(page(pages::dashboard(&user, &[], flash.as_ref()), had_flash))
        }
    }
}

pub async fn chat_page(user: Option<User>, flash: Option<String>, ctx: AppContext) -> HandlerResult {
    let user = match user {
        Some(user) => user,
        None => return Ok(redirect_flash("/auth/login", "error", "inicia sesión primero")),
    };
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    match ctx.chat.history(user.user_id).await {
        Ok(history) => Ok(page(pages::chat(&user, &history, flash.as_ref()), had_flash)),
        Err(err) => {
            error!("loading chat history for {} failed: {}", user.user_id, err);
            Ok(page(pages::chat(&user, &[], flash.as_ref()), had_flash))
        }
    }
}

// ---- chat API ---------------------------------------------------------

/// Success and failure carry disjoint payload shapes. The assistant's
/// synthesized error message is still in the history either way.
fn chat_turn_json(turn: &ChatTurn) -> serde_json::Value {
    if turn.success {
        json!({
            "success": true,
            "response": turn.message.content,
            "message_id": turn.message.message_id,
            "timestamp": turn.message.timestamp.to_rfc3339(),
            "has_citations": turn.has_citations,
            "citations_count": turn.citations_count,
        })
    } else {
        json!({ "success": false, "error": turn.error })
    }
}

pub async fn api_chat_send(
    user: Option<User>,
    req: SendMessageRequest,
    ctx: AppContext,
) -> HandlerResult {
    let user = match user {
        Some(user) => user,
        None => return Ok(unauthorized_json()),
    };
    match ctx.chat.send_message(user.user_id, &req.message).await {
        Ok(turn) => Ok(json_with_status(StatusCode::OK, chat_turn_json(&turn))),
        Err(ServiceError::Validation(message)) => Ok(json_with_status(
            StatusCode::BAD_REQUEST,
            json!({ "success": false, "error": message }),
        )),
        Err(err) => {
            error!("chat turn for {} failed: {}", user.user_id, err);
            Ok(json_with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "ocurrió un error inesperado" }),
            ))
        }
    }
}

pub async fn api_chat_history(user: Option<User>, ctx: AppContext) -> HandlerResult {
    let user = match user {
        Some(user) => user,
        None => return Ok(unauthorized_json()),
    };
    match ctx.chat.history(user.user_id).await {
        Ok(messages) => {
            let history: Vec<serde_json::Value> = messages
                .iter()
                .map(|m| {
                    json!({
                        "id": m.message_id,
                        "role": m.role,
                        "content": m.content,
                        "timestamp": m.timestamp.to_rfc3339(),
                        "is_user": m.role == crate::models::MESSAGE_ROLE_USER,
                    })
                })
                .collect();
            Ok(json_with_status(
                StatusCode::OK,
                json!({ "success": true, "history": history }),
            ))
        }
        Err(err) => {
            error!("chat history for {} failed: {}", user.user_id, err);
            Ok(json_with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "ocurrió un error inesperado" }),
            ))
        }
    }
}

pub async fn api_chat_clear(user: Option<User>, ctx: AppContext) -> HandlerResult {
    let user = match user {
        Some(user) => user,
        None => return Ok(unauthorized_json()),
    };
    match ctx.chat.clear(user.user_id).await {
        Ok(deleted) => {
            info!("cleared {} chat messages for {}", deleted, user.user_id);
            Ok(json_with_status(
                StatusCode::OK,
                json!({ "success": true, "message": "Historial limpiado" }),
            ))
        }
        Err(err) => {
            error!("clearing chat history for {} failed: {}", user.user_id, err);
            Ok(json_with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "ocurrió un error inesperado" }),
            ))
        }
    }
}

pub async fn api_agent_info(user: Option<User>, ctx: AppContext) -> HandlerResult {
    if user.is_none() {
        return Ok(unauthorized_json());
    }
    match ctx.chat.agent_info().await {
        Ok(info) => Ok(json_with_status(
            StatusCode::OK,
            json!({ "success": true, "agent": info }),
        )),
        Err(err) => {
            warn!("agent info unavailable: {}", err);
            Ok(json_with_status(
                StatusCode::BAD_GATEWAY,
                json!({ "success": false, "error": "el asistente no está disponible" }),
            ))
        }
    }
}

// ---- admin pages ------------------------------------------------------

fn require_admin(user: Option<User>) -> Result<User, Response> {
    match user {
        Some(user) if user.is_admin() => Ok(user),
        Some(_) => Err(redirect_flash(
            "/",
            "error",
            "se requiere rol de administrador",
        )),
        None => Err(redirect_flash("/auth/login", "error", "inicia sesión primero")),
    }
}

pub async fn admin_dashboard(
    user: Option<User>,
    flash: Option<String>,
    ctx: AppContext,
) -> HandlerResult {
    let user = match require_admin(user) {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();

    let user_count = ctx.auth.list_users().await.map(|u| u.len()).unwrap_or(0);
    let document_count = ctx.documents.list_all().await.map(|d| d.len()).unwrap_or(0);

    Ok(page(
        pages::admin_dashboard(&user, user_count, document_count, flash.as_ref()),
        had_flash,
    ))
}

pub async fn admin_users(
    user: Option<User>,
    flash: Option<String>,
    ctx: AppContext,
) -> HandlerResult {
    let user = match require_admin(user) {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    match ctx.auth.list_users().await {
        Ok(users) => Ok(page(
            pages::admin_users(&user, &users, flash.as_ref()),
            had_flash,
        )),
        Err(err) => {
            error!("listing users failed: {}", err);
            Ok(page(pages::admin_users(&user, &[], flash.as_ref()), had_flash))
        }
    }
}

pub async fn admin_upload_page(user: Option<User>, flash: Option<String>) -> HandlerResult {
    let user = match require_admin(user) {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    Ok(page(pages::admin_upload(&user, flash.as_ref()), had_flash))
}

async fn part_bytes(part: Part) -> Result<Vec<u8>, warp::Error> {
    let mut data = Vec::new();
    let mut stream = part.stream();
    while let Some(mut buf) = stream.try_next().await? {
        while buf.has_remaining() {
            let chunk = buf.chunk();
            data.extend_from_slice(chunk);
            let advanced = chunk.len();
            buf.advance(advanced);
        }
    }
    Ok(data)
}

pub async fn admin_upload_submit(
    user: Option<User>,
    form: FormData,
    ctx: AppContext,
) -> HandlerResult {
    let user = match require_admin(user) {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };

    let mut original_filename = String::new();
    let mut content_type = "application/octet-stream".to_string();
    let mut data = Vec::new();
    let mut category = String::new();
    let mut description = String::new();

    let mut parts = form;
    loop {
        let part = match parts.try_next().await {
            Ok(Some(part)) => part,
            Ok(None) => break,
            Err(err) => {
                warn!("multipart read failed: {}", err);
                return Ok(redirect_flash(
                    "/admin/upload",
                    "error",
                    "no se pudo leer el formulario",
                ));
            }
        };

        let name = part.name().to_string();
        match name.as_str() {
            "file" => {
                original_filename = part.filename().unwrap_or_default().to_string();
                if let Some(ct) = part.content_type() {
                    content_type = ct.to_string();
                }
                match part_bytes(part).await {
                    Ok(bytes) => data = bytes,
                    Err(err) => {
                        warn!("reading upload body failed: {}", err);
                        return Ok(redirect_flash(
                            "/admin/upload",
                            "error",
                            "no se pudo leer el archivo",
                        ));
                    }
                }
            }
            "category" => {
                if let Ok(bytes) = part_bytes(part).await {
                    category = String::from_utf8_lossy(&bytes).trim().to_string();
                }
            }
            "description" => {
                if let Ok(bytes) = part_bytes(part).await {
                    description = String::from_utf8_lossy(&bytes).trim().to_string();
                }
            }
            _ => {}
        }
    }

    let upload = NewUpload {
        original_filename,
        content_type,
        data,
        description,
        category,
    };

    match ctx.documents.upload(user.user_id, upload).await {
        Ok(document) => {
            info!(
                "uploaded document {} ({})",
                document.document_id, document.original_filename
            );
            Ok(redirect_flash(
                "/admin/documents",
                "success",
                "documento subido correctamente",
            ))
        }
        Err(err) => Ok(redirect_flash(
            "/admin/upload",
            "error",
            &flash_message(&err),
        )),
    }
}

pub async fn admin_documents(
    user: Option<User>,
    flash: Option<String>,
    ctx: AppContext,
) -> HandlerResult {
    let user = match require_admin(user) {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };
    let flash = parse_flash(flash);
    let had_flash = flash.is_some();
    match ctx.documents.list_all().await {
        Ok(documents) => Ok(page(
            pages::admin_documents(&user, &documents, flash.as_ref()),
            had_flash,
        )),
        Err(err) => {
            error!("listing all documents failed: {}", err);
            Ok(page(
                pages::admin_documents(&user, &[], flash.as_ref()),
                had_flash,
            ))
        }
    }
}

pub async fn admin_delete_document(
    document_id: Uuid,
    user: Option<User>,
    ctx: AppContext,
) -> HandlerResult {
    match user {
        Some(user) if user.is_admin() => {}
        Some(_) => return Ok(forbidden_json()),
        None => return Ok(unauthorized_json()),
    }

    match ctx.documents.delete(document_id).await {
        Ok(document) => {
            info!(
                "deleted document {} ({})",
                document.document_id, document.original_filename
            );
            Ok(json_with_status(
                StatusCode::OK,
                json!({ "success": true, "message": "documento eliminado" }),
            ))
        }
        Err(ServiceError::NotFound { .. }) => Ok(json_with_status(
            StatusCode::NOT_FOUND,
            json!({ "success": false, "error": "documento no encontrado" }),
        )),
        Err(err) => {
            error!("deleting document {} failed: {}", document_id, err);
            Ok(json_with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "no se pudo eliminar el documento" }),
            ))
        }
    }
}

pub async fn admin_document_url(
    document_id: Uuid,
    user: Option<User>,
    ctx: AppContext,
) -> HandlerResult {
    match user {
        Some(user) if user.is_admin() => {}
        Some(_) => return Ok(forbidden_json()),
        None => return Ok(unauthorized_json()),
    }

    match ctx.documents.download_url(document_id).await {
        Ok(url) => {
            let reply = warp::reply::with_header(
                warp::reply::with_status(warp::reply(), StatusCode::SEE_OTHER),
                "location",
                url,
            );
            Ok(reply.into_response())
        }
        Err(ServiceError::NotFound { .. }) => Ok(json_with_status(
            StatusCode::NOT_FOUND,
            json!({ "success": false, "error": "documento no encontrado" }),
        )),
        Err(err) => {
            error!("signing url for document {} failed: {}", document_id, err);
            Ok(json_with_status(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "success": false, "error": "no se pudo generar el enlace" }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    #[test]
    fn flash_cookie_round_trips_through_url_encoding() {
        let cookie = flash_cookie("error", "email o contraseña incorrectos");
        let value = cookie
            .strip_prefix("flash=")
            .and_then(|rest| rest.split(';').next())
            .map(str::to_string);

        let flash = parse_flash(value).expect("flash should parse");
        assert_eq!(flash.level, "error");
        assert_eq!(flash.message, "email o contraseña incorrectos");
    }

    #[test]
    fn malformed_flash_cookie_is_ignored() {
        assert!(parse_flash(None).is_none());
        assert!(parse_flash(Some("no-colon".to_string())).is_none());
    }

    #[test]
    fn chat_turn_payloads_are_disjoint() {
        let user_id = Uuid::new_v4();

        let ok = ChatTurn {
            success: true,
            message: ChatMessage::assistant(
                user_id,
                "Claro, puedo ayudarte.".to_string(),
                Some("kb-agent".to_string()),
            ),
            has_citations: false,
            citations_count: 0,
            error: None,
        };
        let body = chat_turn_json(&ok);
        assert_eq!(body["success"], true);
        assert_eq!(body["response"], "Claro, puedo ayudarte.");
        assert!(body.get("error").is_none());

        let failed = ChatTurn {
            success: false,
            message: ChatMessage::assistant(user_id, "⚠️ Lo siento".to_string(), None),
            has_citations: false,
            citations_count: 0,
            error: Some("agent unavailable".to_string()),
        };
        let body = chat_turn_json(&failed);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "agent unavailable");
        assert!(body.get("response").is_none());
        assert!(body.get("citations_count").is_none());
    }
}
