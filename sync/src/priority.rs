//! Externally supplied DAO ordering.
//!
//! Operators publish a plain-text file (one DAO address per line) that
//! pins selected DAOs to the top of the catalog. The file is re-fetched
//! every discovery pass; a missing or broken file simply yields no
//! ordering override — it must never fail a cycle.

use tally_types::Address;

/// Parse the priority file body: one address per line, blanks ignored.
pub fn parse_priority_list(body: &str) -> Vec<Address> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(Address::new)
        .collect()
}

/// Fetch and parse the priority list. Any failure is logged and treated
/// as an empty list.
pub async fn fetch_priority_list(client: &reqwest::Client, url: &str) -> Vec<Address> {
    let response = match client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::warn!(url, error = %e, "failed to fetch dao priority list");
            return Vec::new();
        }
    };
    if !response.status().is_success() {
        tracing::warn!(url, status = response.status().as_u16(), "dao priority list unavailable");
        return Vec::new();
    }
    match response.text().await {
        Ok(body) => parse_priority_list(&body),
        Err(e) => {
            tracing::warn!(url, error = %e, "failed to read dao priority list");
            Vec::new()
        }
    }
}
