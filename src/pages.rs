//! Server-rendered HTML. Pages are assembled with plain string formatting;
//! everything user-controlled goes through [`escape`].

use crate::models::{ChatMessage, Document, User, MESSAGE_ROLE_USER};
use crate::services::document_service::CATEGORIES;

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// One-shot notice carried across a redirect.
pub struct Flash {
    pub level: String,
    pub message: String,
}

fn nav(user: Option<&User>) -> String {
    match user {
        Some(user) if user.is_admin() => format!(
            r#"<nav><a href="/">Inicio</a> <a href="/admin">Panel</a> <a href="/admin/users">Usuarios</a> <a href="/admin/upload">Subir</a> <a href="/admin/documents">Documentos</a> <a href="/chat">Chat</a> <span>{}</span> <a href="/auth/logout">Salir</a></nav>"#,
            escape(&user.email)
        ),
        Some(user) => format!(
            r#"<nav><a href="/">Inicio</a> <a href="/dashboard">Mis documentos</a> <a href="/chat">Chat</a> <span>{}</span> <a href="/auth/logout">Salir</a></nav>"#,
            escape(&user.email)
        ),
        None => {
            r#"<nav><a href="/">Inicio</a> <a href="/auth/login">Entrar</a> <a href="/auth/register">Registrarse</a></nav>"#.to_string()
        }
    }
}

pub fn layout(title: &str, user: Option<&User>, flash: Option<&Flash>, body: &str) -> String {
    let flash_html = match flash {
        Some(f) => format!(
            r#"<div class="flash flash-{}">{}</div>"#,
            escape(&f.level),
            escape(&f.message)
        ),
        None => String::new(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{} - Portal de Documentos</title>
<style>
body {{ font-family: sans-serif; max-width: 960px; margin: 0 auto; padding: 1rem; }}
nav a {{ margin-right: 0.75rem; }}
table {{ border-collapse: collapse; width: 100%; }}
th, td {{ border: 1px solid #ccc; padding: 0.4rem; text-align: left; }}
.flash {{ padding: 0.6rem; margin: 0.6rem 0; border-radius: 4px; }}
.flash-success {{ background: #e6f4ea; }}
.flash-error {{ background: #fce8e6; }}
.msg-user {{ text-align: right; color: #1a3c6e; }}
.msg-assistant {{ text-align: left; color: #333; }}
#chat-box {{ border: 1px solid #ccc; height: 24rem; overflow-y: auto; padding: 0.5rem; }}
</style>
</head>
<body>
{}
{}
{}
</body>
</html>"#,
        escape(title),
        nav(user),
        flash_html,
        body
    )
}

pub fn home(user: Option<&User>, flash: Option<&Flash>) -> String {
    let body = match user {
        Some(_) => {
            r#"<h1>Portal de Documentos</h1>
<p>Bienvenido. Usa el menú para gestionar tus documentos o conversar con el asistente.</p>"#
        }
        None => {
            r#"<h1>Portal de Documentos</h1>
<p>Inicia sesión para acceder a tus documentos y al asistente.</p>
<p><a href="/auth/login">Entrar</a> o <a href="/auth/register">crear una cuenta</a>.</p>"#
        }
    };
    layout("Inicio", user, flash, body)
}

pub fn login(flash: Option<&Flash>) -> String {
    let body = r#"<h1>Iniciar sesión</h1>
<form method="post" action="/auth/login">
<p><label>Email<br><input type="email" name="email" required></label></p>
<p><label>Contraseña<br><input type="password" name="password" required></label></p>
<p><button type="submit">Entrar</button></p>
</form>
<p>¿No tienes cuenta? <a href="/auth/register">Regístrate</a>.</p>"#;
    layout("Iniciar sesión", None, flash, body)
}

pub fn register(flash: Option<&Flash>) -> String {
    let body = r#"<h1>Crear cuenta</h1>
<form method="post" action="/auth/register">
<p><label>Email<br><input type="email" name="email" required></label></p>
<p><label>Contraseña<br><input type="password" name="password" minlength="6" required></label></p>
<p><label>Confirmar contraseña<br><input type="password" name="confirm_password" minlength="6" required></label></p>
<p><button type="submit">Registrarse</button></p>
</form>
<p>¿Ya tienes cuenta? <a href="/auth/login">Entrar</a>.</p>"#;
    layout("Registrarse", None, flash, body)
}

fn document_rows(documents: &[Document], with_owner: bool, with_actions: bool) -> String {
    let mut rows = String::new();
    for doc in documents {
        rows.push_str("<tr>");
        rows.push_str(&format!(
            "<td>{}</td><td>{}</td><td>{}</td><td>{} KB</td><td>{}</td>",
            escape(&doc.original_filename),
            escape(&doc.category),
            escape(&doc.description),
            doc.size / 1024,
            doc.created_at.format("%Y-%m-%d %H:%M")
        ));
        if with_owner {
            rows.push_str(&format!("<td>{}</td>", doc.owner_id));
        }
        if with_actions {
            rows.push_str(&format!(
                r#"<td><a href="/admin/document-url/{id}" target="_blank">Descargar</a>
<button onclick="deleteDocument('{id}')">Eliminar</button></td>"#,
                id = doc.document_id
            ));
        } else {
            rows.push_str(&format!(
                r#"<td><a href="{}" target="_blank">Ver</a></td>"#,
                escape(&doc.url)
            ));
        }
        rows.push_str("</tr>\n");
    }
    rows
}

pub fn dashboard(user: &User, documents: &[Document], flash: Option<&Flash>) -> String {
    let table = if documents.is_empty() {
        "<p>Todavía no tienes documentos.</p>".to_string()
    } else {
        format!(
            r#"<table>
<tr><th>Archivo</th><th>Categoría</th><th>Descripción</th><th>Tamaño</th><th>Fecha</th><th></th></tr>
{}
</table>"#,
            document_rows(documents, false, false)
        )
    };
    let body = format!("<h1>Mis documentos</h1>\n{}", table);
    layout("Mis documentos", Some(user), flash, &body)
}

pub fn chat(user: &User, history: &[ChatMessage], flash: Option<&Flash>) -> String {
    let mut messages = String::new();
    for msg in history {
        let class = if msg.role == MESSAGE_ROLE_USER {
            "msg-user"
        } else {
            "msg-assistant"
        };
        messages.push_str(&format!(
            r#"<p class="{}">{}</p>
"#,
            class,
            escape(&msg.content)
        ));
    }

    let body = format!(
        r#"<h1>Asistente</h1>
<div id="chat-box">{}</div>
<form id="chat-form">
<p><input id="chat-input" type="text" autocomplete="off" placeholder="Escribe tu pregunta..." style="width:80%">
<button type="submit">Enviar</button>
<button type="button" id="chat-clear">Limpiar</button></p>
</form>
<script>
const box = document.getElementById('chat-box');
const form = document.getElementById('chat-form');
const input = document.getElementById('chat-input');
box.scrollTop = box.scrollHeight;

function append(role, text) {{
  const p = document.createElement('p');
  p.className = role === 'user' ? 'msg-user' : 'msg-assistant';
  p.textContent = text;
  box.appendChild(p);
  box.scrollTop = box.scrollHeight;
}}

form.addEventListener('submit', async (e) => {{
  e.preventDefault();
  const text = input.value.trim();
  if (!text) return;
  input.value = '';
  append('user', text);
  const resp = await fetch('/api/chat/send', {{
    method: 'POST',
    headers: {{ 'Content-Type': 'application/json' }},
    body: JSON.stringify({{ message: text }})
  }});
  const data = await resp.json();
  append('assistant', data.response || data.error || 'Error');
}});

document.getElementById('chat-clear').addEventListener('click', async () => {{
  await fetch('/api/chat/clear', {{ method: 'POST' }});
  box.innerHTML = '';
}});
</script>"#,
        messages
    );
    layout("Chat", Some(user), flash, &body)
}

pub fn admin_dashboard(
    user: &User,
    user_count: usize,
    document_count: usize,
    flash: Option<&Flash>,
) -> String {
    let body = format!(
        r#"<h1>Panel de administración</h1>
<ul>
<li>Usuarios registrados: {}</li>
<li>Documentos almacenados: {}</li>
</ul>
<p><a href="/admin/upload">Subir documento</a> | <a href="/admin/documents">Ver documentos</a> | <a href="/admin/users">Ver usuarios</a></p>"#,
        user_count, document_count
    );
    layout("Panel", Some(user), flash, &body)
}

pub fn admin_users(user: &User, users: &[User], flash: Option<&Flash>) -> String {
    let mut rows = String::new();
    for u in users {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            u.user_id,
            escape(&u.email),
            escape(&u.role),
            u.created_at.format("%Y-%m-%d %H:%M")
        ));
    }
    let body = format!(
        r#"<h1>Usuarios</h1>
<table>
<tr><th>ID</th><th>Email</th><th>Rol</th><th>Alta</th></tr>
{}
</table>"#,
        rows
    );
    layout("Usuarios", Some(user), flash, &body)
}

pub fn admin_upload(user: &User, flash: Option<&Flash>) -> String {
    let mut options = String::new();
    for category in CATEGORIES {
        options.push_str(&format!(
            r#"<option value="{0}">{0}</option>"#,
            category
        ));
    }
    let body = format!(
        r#"<h1>Subir documento</h1>
<form method="post" action="/admin/upload" enctype="multipart/form-data">
<p><label>Archivo<br><input type="file" name="file" required></label></p>
<p><label>Categoría<br><select name="category">{}</select></label></p>
<p><label>Descripción (máx. 200 caracteres)<br><textarea name="description" maxlength="200" required></textarea></label></p>
<p><button type="submit">Subir</button></p>
</form>"#,
        options
    );
    layout("Subir documento", Some(user), flash, &body)
}

pub fn admin_documents(user: &User, documents: &[Document], flash: Option<&Flash>) -> String {
    let table = if documents.is_empty() {
        "<p>No hay documentos.</p>".to_string()
    } else {
        format!(
            r#"<table>
<tr><th>Archivo</th><th>Categoría</th><th>Descripción</th><th>Tamaño</th><th>Fecha</th><th>Propietario</th><th>Acciones</th></tr>
{}
</table>"#,
            document_rows(documents, true, true)
        )
    };
    let body = format!(
        r#"<h1>Documentos</h1>
{}
<script>
async function deleteDocument(id) {{
  if (!confirm('¿Eliminar este documento?')) return;
  const resp = await fetch('/admin/delete-document/' + id, {{ method: 'POST' }});
  const data = await resp.json();
  if (data.success) {{
    location.reload();
  }} else {{
    alert(data.error || 'Error al eliminar');
  }}
}}
</script>"#,
        table
    );
    layout("Documentos", Some(user), flash, &body)
}
