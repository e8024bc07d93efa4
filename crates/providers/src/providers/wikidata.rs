//! Wikidata: author biographical enrichment via SPARQL (spec §4.5) — the
//! only provider that fills `gender`/`nationality`/`birth_place` and their
//! `_qid` companions, and the only one whose output is a person rather than
//! a book.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};
use crate::model::ProviderAuthorRecord;
use crate::rate_limit::ProviderRateLimiter;
use crate::traits::{AuthorProvider, MetadataProvider};

const NAME: &str = "wikidata";

/// P136 ("genre") is aggregated with `GROUP_CONCAT` so a single row still
/// covers a multi-genre author; everything else stays a plain `OPTIONAL`
/// binding under `LIMIT 1`.
const SPARQL_QUERY: &str = r#"
SELECT ?person ?personLabel ?genderLabel ?countryLabel ?birthPlaceLabel ?birth ?death ?bio
       (GROUP_CONCAT(DISTINCT ?genreLabel; separator="|") AS ?genres) WHERE {
  ?person rdfs:label "{{NAME}}"@en.
  ?person wdt:P31 wd:Q5.
  OPTIONAL { ?person wdt:P21 ?gender. }
  OPTIONAL { ?person wdt:P27 ?country. }
  OPTIONAL { ?person wdt:P19 ?birthPlace. }
  OPTIONAL { ?person wdt:P569 ?birth. }
  OPTIONAL { ?person wdt:P570 ?death. }
  OPTIONAL { ?person wdt:P136 ?genre. ?genre rdfs:label ?genreLabel. FILTER(LANG(?genreLabel) = "en") }
  SERVICE wikibase:label { bd:serviceParam wikibase:language "en". }
}
GROUP BY ?person ?personLabel ?genderLabel ?countryLabel ?birthPlaceLabel ?birth ?death ?bio
LIMIT 1
"#;

pub struct WikidataProvider {
    client: Client,
    rate_limiter: Arc<ProviderRateLimiter>,
    timeout: Duration,
}

impl WikidataProvider {
    pub fn new(client: Client, rate_limiter: Arc<ProviderRateLimiter>, timeout: Duration) -> Self {
        Self { client, rate_limiter, timeout }
    }
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<std::collections::HashMap<String, SparqlBinding>>,
}

#[derive(Debug, Deserialize)]
struct SparqlBinding {
    value: String,
}

#[async_trait]
impl AuthorProvider for WikidataProvider {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn fetch_author(&self, name: &str) -> ProviderResult<Option<ProviderAuthorRecord>> {
        self.rate_limiter.acquire().await;
        let query = SPARQL_QUERY.replace("{{NAME}}", &name.replace('"', "\\\""));

        let response: SparqlResponse = self
            .client
            .get("https://query.wikidata.org/sparql")
            .query(&[("query", query.as_str()), ("format", "json")])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?
            .error_for_status()
            .map_err(|source| ProviderError::from_reqwest(NAME, source))?
            .json()
            .await
            .map_err(|source| ProviderError::Http { provider: NAME, source })?;

        let Some(binding) = response.results.bindings.into_iter().next() else {
            return Ok(None);
        };

        let get = |key: &str| binding.get(key).map(|b| b.value.clone());
        let person_uri = get("person");
        let wikidata_id = person_uri
            .as_deref()
            .and_then(|uri| uri.rsplit('/').next())
            .map(str::to_string);
        let genre_tags = get("genres")
            .map(|genres| genres.split('|').filter(|g| !g.is_empty()).map(str::to_lowercase).collect())
            .unwrap_or_default();

        Ok(Some(ProviderAuthorRecord {
            source: NAME.to_string(),
            author_key: name.to_string(),
            name: Some(name.to_string()),
            gender: get("genderLabel"),
            gender_qid: None,
            nationality: get("countryLabel"),
            nationality_qid: None,
            birth_year: get("birth").and_then(|v| v.get(0..4).and_then(|y| y.parse().ok())),
            death_year: get("death").and_then(|v| v.get(0..4).and_then(|y| y.parse().ok())),
            birth_place: get("birthPlaceLabel"),
            birth_country: get("countryLabel"),
            bio: get("bio"),
            photo_url: None,
            wikidata_id,
            genre_tags,
        }))
    }
}

/// Wikidata contributes no edition-level metadata of its own; this exists
/// only so one `WikidataProvider` instance can sit in the `MetadataProvider`
/// registry (spec's 5-tier cascade) as well as being used as an
/// `AuthorProvider`. All methods fall back to the trait's no-op defaults.
#[async_trait]
impl MetadataProvider for WikidataProvider {
    fn name(&self) -> &'static str {
        NAME
    }
}
