use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub imdb_id: Option<String>,
    #[serde(default)]
    pub tvdb_id: Option<i64>,
    #[serde(default)]
    pub poster_url: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
}

/// Entry of the RSS feed export. A projection of a recommended [`Movie`].
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Rss {
    pub imdb_id: Option<String>,
    pub year: i32,
    pub tvdb_id: Option<i64>,
    pub title: String,
    pub poster_url: Option<String>,
}

impl From<&Movie> for Rss {
    fn from(movie: &Movie) -> Self {
        Self {
            imdb_id: movie.imdb_id.clone(),
            year: movie.year,
            tvdb_id: movie.tvdb_id,
            title: movie.name.clone(),
            poster_url: movie.poster_url.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlexLibrary {
    pub key: u32,
    pub title: String,
    pub machine_identifier: String,
    #[serde(default)]
    pub selected: bool,
}

/// Search configuration built up by the wizard pages of one session.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlexSearch {
    pub movie_db_api_key: String,
    pub plex_token: String,
    pub address: String,
    pub port: u16,
    pub libraries: Vec<PlexLibrary>,
}

impl Default for PlexSearch {
    fn default() -> Self {
        Self {
            movie_db_api_key: String::new(),
            plex_token: String::new(),
            address: String::new(),
            port: 32400,
            libraries: Vec::new(),
        }
    }
}

impl PlexSearch {
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.starts_with("http://") || address.starts_with("https://") {
            format!("{}:{}", address, self.port)
        } else {
            format!("http://{}:{}", address, self.port)
        }
    }

    /// Copies the connection parameters of a submitted form. Libraries are left alone.
    pub fn update_connection(&mut self, movie_db_api_key: &str, plex_token: &str, address: &str, port: u16) {
        self.movie_db_api_key = movie_db_api_key.trim().to_string();
        self.plex_token = plex_token.trim().to_string();
        self.address = address.trim().to_string();
        self.port = port;
    }

    pub fn append_libraries(&mut self, libraries: Vec<PlexLibrary>) {
        self.libraries.extend(libraries);
    }

    pub fn update_library_selections(&mut self, selected_keys: &[u32]) {
        for library in &mut self.libraries {
            library.selected = selected_keys.contains(&library.key);
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlexServer {
    pub friendly_name: String,
    pub machine_identifier: String,
    pub plex_token: String,
    pub address: String,
    pub port: u16,
    #[serde(default)]
    pub libraries: Vec<PlexLibrary>,
}

/// Contents of `gaps.properties`.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GapsProperties {
    #[serde(default)]
    pub movie_db_api_key: String,
    #[serde(default)]
    pub plex_servers: Vec<PlexServer>,
}

impl GapsProperties {
    /// Replaces the server with the same machine identifier, or adds it.
    pub fn upsert_server(&mut self, server: PlexServer) {
        match self
            .plex_servers
            .iter_mut()
            .find(|s| s.machine_identifier == server.machine_identifier)
        {
            Some(existing) => *existing = server,
            None => self.plex_servers.push(server),
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    pub code: u32,
    pub reason: &'static str,
}

impl Payload {
    pub const NUKE_SUCCESSFUL: Payload = Payload {
        code: 20,
        reason: "Nuke successful. All files deleted.",
    };
    pub const NUKE_UNSUCCESSFUL: Payload = Payload {
        code: 21,
        reason: "Nuke unsuccessful. Files may still exist.",
    };
}
