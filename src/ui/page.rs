//! HTML rendering. Everything here is a pure function of its inputs.

use crate::transcript::Transcript;

const TEMPLATE: &str = include_str!("page.html");

/// What a single page render shows.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    pub title: &'a str,
    pub header: &'a str,
    /// Current contents of the input box.
    pub input: &'a str,
    pub error: Option<&'a str>,
    pub warning: Option<&'a str>,
    /// Chunks of the reply to the question just asked.
    pub response: Option<&'a [String]>,
    pub transcript: &'a Transcript,
}

impl<'a> PageView<'a> {
    /// A page with no submission in flight.
    pub fn idle(title: &'a str, header: &'a str, transcript: &'a Transcript) -> Self {
        Self {
            title,
            header,
            input: "",
            error: None,
            warning: None,
            response: None,
            transcript,
        }
    }
}

pub fn render_page(view: &PageView<'_>) -> String {
    let title = escape_html(view.title);
    let header = escape_html(view.header);
    let input = escape_html(view.input);
    let notices = render_notices(view.error, view.warning);
    let response = view.response.map(render_response).unwrap_or_default();
    let history = render_history(view.transcript);

    fill_template(TEMPLATE, |key| match key {
        "TITLE" => Some(title.as_str()),
        "HEADER" => Some(header.as_str()),
        "INPUT" => Some(input.as_str()),
        "NOTICES" => Some(notices.as_str()),
        "RESPONSE" => Some(response.as_str()),
        "HISTORY" => Some(history.as_str()),
        _ => None,
    })
}

fn render_notices(error: Option<&str>, warning: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(error) = error {
        out.push_str(&format!(
            "<div class=\"error\" role=\"alert\">{}</div>\n",
            escape_html(error)
        ));
    }
    if let Some(warning) = warning {
        out.push_str(&format!(
            "<div class=\"warning\" role=\"status\">{}</div>\n",
            escape_html(warning)
        ));
    }
    out
}

fn render_response(chunks: &[String]) -> String {
    let mut out = String::from("<h3>The Response is</h3>\n");
    for chunk in chunks {
        out.push_str(&format!("<p class=\"chunk\">{}</p>\n", escape_html(chunk)));
    }
    out
}

fn render_history(transcript: &Transcript) -> String {
    transcript
        .lines()
        .iter()
        .map(|line| format!("<p class=\"entry\">{}</p>\n", escape_html(line)))
        .collect()
}

/// Substitute `{{KEY}}` placeholders in a single pass, so substituted text is
/// never scanned for further placeholders. Unknown keys are left as-is.
fn fill_template<'v, F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<&'v str>,
{
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];
        match after.find("}}") {
            Some(close) => {
                let key = &after[..close];
                match lookup(key) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[close + 2..];
            }
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

pub fn escape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '&' => result.push_str("&amp;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#39;"),
            _ => result.push(c),
        }
    }
    result
}
