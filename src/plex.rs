use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{PlexLibrary, PlexSearch, PlexServer};

#[async_trait]
pub trait PlexApi: Send + Sync {
    /// Server identity along with its movie libraries.
    async fn query_server(&self, search: &PlexSearch) -> Result<PlexServer>;
}

#[derive(Debug, Clone)]
pub struct PlexClient {
    client: Client,
}

impl PlexClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let user_agent = format!("gaps/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build Plex HTTP client")?;
        Ok(Self { client })
    }

    async fn get_xml(&self, search: &PlexSearch, path: &str) -> Result<String> {
        let url = format!(
            "{}{}?X-Plex-Token={}",
            search.base_url(),
            path,
            urlencoding::encode(&search.plex_token)
        );
        let res = self
            .client
            .get(&url)
            .header("Accept", "application/xml")
            .send()
            .await
            .with_context(|| format!("Plex request to {} failed", path))?;
        let status = res.status();
        let body = res
            .text()
            .await
            .with_context(|| format!("Failed to read Plex response for {}", path))?;
        if !status.is_success() {
            return Err(anyhow!("Plex returned {} for {}", status, path));
        }
        Ok(body)
    }
}

#[async_trait]
impl PlexApi for PlexClient {
    async fn query_server(&self, search: &PlexSearch) -> Result<PlexServer> {
        let identity = self.get_xml(search, "/").await?;
        let (friendly_name, machine_identifier) = parse_identity(&identity)?;
        info!(
            "Connected to Plex server '{}' ({})",
            friendly_name, machine_identifier
        );

        let sections = self.get_xml(search, "/library/sections").await?;
        let libraries = parse_movie_libraries(&sections, &machine_identifier)?;
        info!("Found {} movie libraries", libraries.len());
        for library in &libraries {
            debug!("Movie library {} | key {}", library.title, library.key);
        }

        Ok(PlexServer {
            friendly_name,
            machine_identifier,
            plex_token: search.plex_token.clone(),
            address: search.address.clone(),
            port: search.port,
            libraries,
        })
    }
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Reads `friendlyName` and `machineIdentifier` from the root `MediaContainer`.
pub fn parse_identity(xml: &str) -> Result<(String, String)> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"MediaContainer" {
                    let machine_identifier = attribute(e, b"machineIdentifier")?
                        .filter(|id| !id.is_empty())
                        .ok_or_else(|| anyhow!("Plex response has no machineIdentifier"))?;
                    let friendly_name =
                        attribute(e, b"friendlyName")?.unwrap_or_else(|| machine_identifier.clone());
                    return Ok((friendly_name, machine_identifier));
                }
            }
            Ok(Event::Eof) => return Err(anyhow!("Plex response has no MediaContainer")),
            Err(e) => return Err(anyhow!("Error parsing XML: {:?}", e)),
            _ => {}
        }
        buf.clear();
    }
}

/// Collects `Directory` sections of type `movie`.
pub fn parse_movie_libraries(xml: &str, machine_identifier: &str) -> Result<Vec<PlexLibrary>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut libraries = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"Directory"
                    && attribute(e, b"type")?.as_deref() == Some("movie")
                {
                    let key = attribute(e, b"key")?
                        .ok_or_else(|| anyhow!("Library section without key"))?;
                    let key: u32 = key
                        .parse()
                        .with_context(|| format!("Library key '{}' is not numeric", key))?;
                    let title = attribute(e, b"title")?.unwrap_or_default();
                    libraries.push(PlexLibrary {
                        key,
                        title,
                        machine_identifier: machine_identifier.to_string(),
                        selected: false,
                    });
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("Error parsing XML: {:?}", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(libraries)
}
