//! Form bodies of the wizard pages and their validation rules.

use serde::Deserialize;
use std::fmt;

use crate::models::PlexSearch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlexSearchForm {
    #[serde(default)]
    pub movie_db_api_key: String,
    #[serde(default)]
    pub plex_token: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieListForm {
    #[serde(default)]
    pub movie_db_api_key: String,
    #[serde(default)]
    pub plex_token: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub selected_libraries: Vec<String>,
}

/// Validated connection parameters, ready to be copied into a [`PlexSearch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub movie_db_api_key: String,
    pub plex_token: String,
    pub address: String,
    pub port: u16,
}

impl Connection {
    pub fn apply(&self, search: &mut PlexSearch) {
        search.update_connection(
            &self.movie_db_api_key,
            &self.plex_token,
            &self.address,
            self.port,
        );
    }
}

fn validate_connection(
    movie_db_api_key: &str,
    plex_token: &str,
    address: &str,
    port: &str,
    errors: &mut Vec<FieldError>,
) -> Option<Connection> {
    let start = errors.len();
    if address.trim().is_empty() {
        errors.push(FieldError::new("address", "Plex address is required"));
    }
    if plex_token.trim().is_empty() {
        errors.push(FieldError::new("plexToken", "Plex token is required"));
    }
    let port = match port.trim().parse::<u16>() {
        Ok(p) if p > 0 => Some(p),
        _ => {
            errors.push(FieldError::new(
                "port",
                format!("'{}' is not a port between 1 and 65535", port.trim()),
            ));
            None
        }
    };
    if errors.len() > start {
        return None;
    }
    Some(Connection {
        movie_db_api_key: movie_db_api_key.trim().to_string(),
        plex_token: plex_token.trim().to_string(),
        address: address.trim().to_string(),
        port: port?,
    })
}

pub fn validate_search(form: &PlexSearchForm) -> Result<Connection, Vec<FieldError>> {
    let mut errors = Vec::new();
    match validate_connection(
        &form.movie_db_api_key,
        &form.plex_token,
        &form.address,
        &form.port,
        &mut errors,
    ) {
        Some(connection) => Ok(connection),
        None => Err(errors),
    }
}

/// Search rules plus at least one selected library, each with a numeric key.
pub fn validate_library_selection(
    form: &MovieListForm,
) -> Result<(Connection, Vec<u32>), Vec<FieldError>> {
    let mut errors = Vec::new();
    let connection = validate_connection(
        &form.movie_db_api_key,
        &form.plex_token,
        &form.address,
        &form.port,
        &mut errors,
    );

    let mut keys = Vec::with_capacity(form.selected_libraries.len());
    if form.selected_libraries.is_empty() {
        errors.push(FieldError::new(
            "selectedLibraries",
            "Select at least one library",
        ));
    }
    for raw in &form.selected_libraries {
        match raw.trim().parse::<u32>() {
            Ok(key) => keys.push(key),
            Err(_) => errors.push(FieldError::new(
                "selectedLibraries",
                format!("'{}' is not a library key", raw),
            )),
        }
    }

    match connection {
        Some(connection) if errors.is_empty() => Ok((connection, keys)),
        _ => Err(errors),
    }
}
