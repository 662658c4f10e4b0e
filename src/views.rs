//! Server-rendered pages of the configuration wizard.

use crate::models::PlexSearch;
use crate::validate::FieldError;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
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

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>Gaps - {}</title>\n</head>\n<body>\n<h1>{}</h1>\n{}\n</body>\n</html>\n",
        escape(title),
        escape(title),
        body
    )
}

/// The token is never echoed back; a blank submission keeps the stored one.
fn connection_fields(search: &PlexSearch) -> String {
    let token_hint = if search.plex_token.is_empty() {
        ""
    } else {
        " placeholder=\"saved, leave blank to keep\""
    };
    format!(
        concat!(
            "<label>Movie DB API key <input name=\"movieDbApiKey\" value=\"{}\"></label>\n",
            "<label>Plex address <input name=\"address\" value=\"{}\"></label>\n",
            "<label>Plex port <input name=\"port\" value=\"{}\"></label>\n",
            "<label>Plex token <input name=\"plexToken\" type=\"password\" value=\"\"{}></label>\n"
        ),
        escape(&search.movie_db_api_key),
        escape(&search.address),
        search.port,
        token_hint,
    )
}

pub fn plex_libraries(search: &PlexSearch) -> String {
    let mut rows = String::new();
    for library in &search.libraries {
        rows.push_str(&format!(
            "<li data-key=\"{}\" data-server=\"{}\">{}</li>\n",
            library.key,
            escape(&library.machine_identifier),
            escape(&library.title)
        ));
    }
    if rows.is_empty() {
        rows.push_str("<li>No libraries found yet</li>\n");
    }

    let body = format!(
        "<form method=\"post\" action=\"/plexLibraries\">\n{}<button type=\"submit\">Find libraries</button>\n</form>\n<h2>Libraries</h2>\n<ul id=\"libraries\">\n{}</ul>\n<form method=\"post\" action=\"/plexMovieList\">\n{}{}<button type=\"submit\">Search</button>\n</form>",
        connection_fields(search),
        rows,
        connection_fields(search),
        library_checkboxes(search),
    );
    page("Plex Libraries", &body)
}

fn library_checkboxes(search: &PlexSearch) -> String {
    search
        .libraries
        .iter()
        .map(|library| {
            format!(
                "<label><input type=\"checkbox\" name=\"selectedLibraries\" value=\"{}\"{}> {}</label>\n",
                library.key,
                if library.selected { " checked" } else { "" },
                escape(&library.title)
            )
        })
        .collect()
}

pub fn plex_movie_list(search: &PlexSearch) -> String {
    let selected: Vec<String> = search
        .libraries
        .iter()
        .filter(|l| l.selected)
        .map(|l| format!("<li data-key=\"{}\">{}</li>", l.key, escape(&l.title)))
        .collect();
    let body = if selected.is_empty() {
        "<p>No libraries selected.</p>".to_string()
    } else {
        format!(
            "<p>Searching {} {} on {}</p>\n<ul id=\"selected\">\n{}\n</ul>",
            selected.len(),
            if selected.len() == 1 { "library" } else { "libraries" },
            escape(&search.base_url()),
            selected.join("\n")
        )
    };
    page("Plex Movie List", &body)
}

pub fn error(errors: &[FieldError]) -> String {
    let items: Vec<String> = errors
        .iter()
        .map(|e| format!("<li data-field=\"{}\">{}</li>", e.field, escape(&e.message)))
        .collect();
    page(
        "Error",
        &format!(
            "<ul class=\"errors\">\n{}\n</ul>\n<a href=\"/plexLibraries\">Back</a>",
            items.join("\n")
        ),
    )
}
