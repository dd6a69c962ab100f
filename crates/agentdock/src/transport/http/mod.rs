//! HTTP transport: one page, `GET /` for status and `POST /` for submissions.

mod page;
mod routes;
mod server;

pub use page::{PageView, escape_html, render_page};
pub use routes::{SubmitForm, routes};
pub use server::{bind, serve, serve_listener};
