//! Query a Plex server and print its movie libraries, one per line.
//! Uses PLEX_ADDRESS, PLEX_PORT and PLEX_TOKEN from the environment (.env supported).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use gaps::models::PlexSearch;
use gaps::plex::{PlexApi, PlexClient};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present for local runs.
    dotenv().ok();

    let address = env::var("PLEX_ADDRESS").context("Missing PLEX_ADDRESS in environment")?;
    let plex_token = env::var("PLEX_TOKEN").context("Missing PLEX_TOKEN in environment")?;
    let port = match env::var("PLEX_PORT") {
        Ok(raw) => raw.parse::<u16>().context("PLEX_PORT is not a port number")?,
        Err(_) => 32400,
    };

    let search = PlexSearch {
        address,
        plex_token,
        port,
        ..PlexSearch::default()
    };
    let client = PlexClient::new(Duration::from_secs(30))?;
    let server = client
        .query_server(&search)
        .await
        .context("Failed to query Plex")?;

    println!("{} ({})", server.friendly_name, server.machine_identifier);
    for library in server.libraries {
        println!("{}\t{}", library.key, library.title);
    }

    Ok(())
}
