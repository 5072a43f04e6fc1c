//! # Legal Pages
//!
//! Server-rendered HTML for the public legal pages:
//!
//! - **GET `/legal`**, **GET `/en/legal`** — index of current documents.
//! - **GET `/legal/:slug`** — Spanish page, e.g. `/legal/politica-privacidad`.
//! - **GET `/en/legal/:slug`** — English page, e.g. `/en/legal/privacy-policy`.
//!
//! Section ids in the body and links in the table of contents both come
//! from the same anchors, so every TOC entry lands on its heading. All
//! document text is HTML-escaped.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::Utc;
use enigma_core::toc::{parse_blocks, Block};
use enigma_core::{LegalDocumentType, Locale, TocEntry};

use crate::services::legal_content::{self, LegalDocumentView};
use crate::state::AppState;

/// Localized page chrome.
struct Labels {
    index_title: &'static str,
    contents: &'static str,
    version: &'static str,
    last_updated: &'static str,
    other_language: &'static str,
    not_found_title: &'static str,
    not_found_body: &'static str,
    empty_index: &'static str,
}

const ES: Labels = Labels {
    index_title: "Información legal",
    contents: "Índice",
    version: "Versión",
    last_updated: "Última actualización",
    other_language: "English",
    not_found_title: "Página no encontrada",
    not_found_body: "El documento legal solicitado no existe o aún no está publicado.",
    empty_index: "Todavía no hay documentos publicados.",
};

const EN: Labels = Labels {
    index_title: "Legal information",
    contents: "Contents",
    version: "Version",
    last_updated: "Last updated",
    other_language: "Español",
    not_found_title: "Page not found",
    not_found_body: "The requested legal document does not exist or is not published yet.",
    empty_index: "No documents have been published yet.",
};

fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::Es => &ES,
        Locale::En => &EN,
    }
}

fn other_locale(locale: Locale) -> Locale {
    match locale {
        Locale::Es => Locale::En,
        Locale::En => Locale::Es,
    }
}

/// Build the legal pages router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/legal", get(index_es))
        .route("/en/legal", get(index_en))
        .route("/legal/:slug", get(page_es))
        .route("/en/legal/:slug", get(page_en))
}

async fn index_es(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state, Locale::Es))
}

async fn index_en(State(state): State<AppState>) -> Html<String> {
    Html(render_index(&state, Locale::En))
}

async fn page_es(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    page(&state, Locale::Es, &slug)
}

async fn page_en(State(state): State<AppState>, Path(slug): Path<String>) -> Response {
    page(&state, Locale::En, &slug)
}

fn page(state: &AppState, locale: Locale, slug: &str) -> Response {
    let document = LegalDocumentType::from_slug(locale, slug)
        .and_then(|t| legal_content::current(state, t, locale, Utc::now()).ok());
    match document {
        Some(doc) => Html(render_document(state, &LegalDocumentView::new(doc))).into_response(),
        None => {
            tracing::debug!(locale = locale.as_str(), slug, "legal page not found");
            (StatusCode::NOT_FOUND, Html(render_not_found(locale))).into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn layout(locale: Locale, title: &str, head_extra: &str, main: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="{lang}">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
{head_extra}</head>
<body>
<main class="legal">
{main}
</main>
</body>
</html>
"#,
        lang = locale.as_str(),
        title = html_escape(title),
    )
}

fn render_toc(entries: &[TocEntry], out: &mut String) {
    out.push_str("<ol>");
    for entry in entries {
        out.push_str(&format!(
            r##"<li><a href="#{}">{}</a>"##,
            html_escape(&entry.id),
            html_escape(&entry.title)
        ));
        if !entry.children.is_empty() {
            render_toc(&entry.children, out);
        }
        out.push_str("</li>");
    }
    out.push_str("</ol>");
}

fn render_body(body: &str, out: &mut String) {
    for block in parse_blocks(body) {
        match block {
            Block::Heading(h) => {
                // The page title is the only h1.
                let level = (h.level + 1).min(6);
                out.push_str(&format!(
                    r#"<h{level} id="{}">{}</h{level}>"#,
                    html_escape(&h.anchor),
                    html_escape(&h.title)
                ));
            }
            Block::Paragraph(text) => {
                out.push_str(&format!("<p>{}</p>", html_escape(&text)));
            }
            Block::List(items) => {
                out.push_str("<ul>");
                for item in items {
                    out.push_str(&format!("<li>{}</li>", html_escape(&item)));
                }
                out.push_str("</ul>");
            }
            Block::Code(code) => {
                out.push_str(&format!("<pre><code>{}</code></pre>", html_escape(&code)));
            }
        }
        out.push('\n');
    }
}

fn render_document(state: &AppState, view: &LegalDocumentView) -> String {
    let doc = &view.document;
    let labels = labels(doc.locale);
    let alternate = other_locale(doc.locale);
    let alternate_path = doc.document_type.page_path(alternate);

    let head = format!(
        "<meta name=\"description\" content=\"{}\">\n<link rel=\"canonical\" href=\"{}\">\n<link rel=\"alternate\" hreflang=\"{}\" href=\"{}\">\n",
        html_escape(&view.summary),
        html_escape(&view.page_path),
        alternate.as_str(),
        html_escape(&alternate_path),
    );

    let mut main = String::new();
    main.push_str("<article>\n<header>\n");
    main.push_str(&format!("<h1>{}</h1>\n", html_escape(&doc.title)));
    main.push_str(&format!(
        "<p class=\"meta\">{} {} · {}: <time datetime=\"{}\">{}</time></p>\n",
        labels.version,
        html_escape(&view.version_label),
        labels.last_updated,
        doc.published_at.to_rfc3339(),
        doc.published_at.format("%Y-%m-%d"),
    ));
    main.push_str(&format!(
        "<a class=\"language\" hreflang=\"{}\" href=\"{}\">{}</a>\n",
        alternate.as_str(),
        html_escape(&alternate_path),
        labels.other_language,
    ));
    main.push_str("</header>\n");

    if !view.table_of_contents.is_empty() {
        main.push_str(&format!(
            "<nav class=\"toc\" aria-label=\"{0}\">\n<h2>{0}</h2>\n",
            labels.contents
        ));
        render_toc(&view.table_of_contents, &mut main);
        main.push_str("\n</nav>\n");
    }

    main.push_str("<section class=\"legal-body\">\n");
    render_body(&doc.body, &mut main);
    main.push_str("</section>\n</article>");

    let title = format!("{} | {}", doc.title, state.config.restaurant_id);
    layout(doc.locale, &title, &head, &main)
}

fn render_index(state: &AppState, locale: Locale) -> String {
    let labels = labels(locale);
    let documents = legal_content::list_current(state, locale, Utc::now());

    let mut main = format!("<h1>{}</h1>\n", labels.index_title);
    if documents.is_empty() {
        main.push_str(&format!("<p>{}</p>", labels.empty_index));
    } else {
        main.push_str("<ul>");
        for doc in &documents {
            main.push_str(&format!(
                r#"<li><a href="{}">{}</a></li>"#,
                html_escape(&doc.document_type.page_path(locale)),
                html_escape(&doc.title)
            ));
        }
        main.push_str("</ul>");
    }

    let title = format!("{} | {}", labels.index_title, state.config.restaurant_id);
    layout(locale, &title, "", &main)
}

fn render_not_found(locale: Locale) -> String {
    let labels = labels(locale);
    let main = format!(
        "<h1>{}</h1>\n<p>{}</p>\n<p><a href=\"{}\">{}</a></p>",
        labels.not_found_title,
        labels.not_found_body,
        locale.legal_prefix(),
        labels.index_title,
    );
    layout(locale, labels.not_found_title, "", &main)
}
