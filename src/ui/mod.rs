//! Web page front-end: a text box, the latest reply, and the running transcript.

pub mod page;
pub mod routes;

pub use page::{render_page, PageView};
pub use routes::{create_router, submit_question, AppState, ChatState, ServerState, Submission};
