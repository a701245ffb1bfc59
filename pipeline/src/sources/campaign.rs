//! Events-campaign API client.
//!
//! Pulls every page of a campaign's events and converts each one into a
//! compound-keyed record. This source degrades instead of aborting: any
//! request or decode failure yields an empty result set with an error
//! log, and the rest of the run continues without campaign events.

use chrono::DateTime;
use serde::Deserialize;
use tracing::{error, info};

use crate::feature::{Feature, FeatureMap, Properties, PropertyValue, CAMPAIGN_SOURCE_TAG};
use crate::key;
use crate::metrics_defs;

/// Fallback event date for records whose `start_date` is missing or
/// unparseable.
const DEFAULT_EVENT_DATE: &str = "1/20/2018";

#[derive(Deserialize)]
struct EventsPage {
    #[serde(rename = "_embedded", default)]
    embedded: EmbeddedEvents,
    #[serde(default)]
    total_pages: u32,
}

#[derive(Deserialize, Default)]
struct EmbeddedEvents {
    #[serde(rename = "osdi:events", default)]
    events: Vec<CampaignEvent>,
}

#[derive(Deserialize)]
pub(crate) struct CampaignEvent {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start_date: Option<String>,
    #[serde(default)]
    browser_url: Option<String>,
    #[serde(default)]
    location: Option<EventLocation>,
    #[serde(rename = "_embedded", default)]
    embedded: Option<EmbeddedOrganizer>,
}

#[derive(Deserialize, Default)]
pub(crate) struct EventLocation {
    #[serde(default)]
    locality: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    postal_code: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddedOrganizer {
    #[serde(rename = "osdi:organizer", default)]
    organizer: Option<Organizer>,
}

#[derive(Deserialize, Default)]
pub(crate) struct Organizer {
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
}

#[derive(Deserialize)]
pub(crate) struct EmailAddress {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    primary: bool,
}

pub struct CampaignClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl CampaignClient {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        CampaignClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }

    /// Fetches every event of a campaign, page by page, keyed by
    /// `location::host`.
    pub async fn events(&self, campaign_id: &str) -> FeatureMap {
        let url = format!(
            "{}/api/v2/event_campaigns/{}/events",
            self.base_url.trim_end_matches('/'),
            campaign_id
        );

        let mut sheet = FeatureMap::new();
        let mut page: u32 = 1;
        loop {
            let response = match self
                .client
                .get(&url)
                .query(&[("page", page)])
                .header("OSDI-API-Token", &self.api_token)
                .send()
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    error!(%url, error = %err, "campaign events request failed");
                    return FeatureMap::new();
                }
            };

            if !response.status().is_success() {
                error!(%url, status = %response.status(), "campaign events request rejected");
                return FeatureMap::new();
            }

            let body = match response.json::<EventsPage>().await {
                Ok(body) => body,
                Err(err) => {
                    error!(%url, error = %err, "campaign events response malformed");
                    return FeatureMap::new();
                }
            };

            for event in body.embedded.events {
                let feature = convert_event(event);
                let key = key::compound_key(
                    feature.property_text("location").unwrap_or_default(),
                    feature.property_text("host").unwrap_or_default(),
                );
                sheet.insert(key, feature);
            }

            if body.total_pages > page {
                page += 1;
            } else {
                break;
            }
        }

        info!(events = sheet.len(), pages = page, "fetched campaign events");
        crate::counter!(metrics_defs::CAMPAIGN_EVENTS_READ).increment(sheet.len() as u64);
        sheet
    }
}

/// Location text for an event: US events map by postal code, everything
/// else by `"{city}, {country}"`.
fn event_location(location: Option<&EventLocation>) -> String {
    let Some(location) = location else {
        return String::new();
    };
    let country = location.country.as_deref().unwrap_or("US");
    if country != "US" {
        return format!(
            "{}, {}",
            location.locality.as_deref().unwrap_or_default(),
            country
        );
    }
    location.postal_code.clone().unwrap_or_default()
}

fn organizer_name(organizer: Option<&Organizer>) -> String {
    let Some(organizer) = organizer else {
        return String::new();
    };
    [
        organizer.given_name.as_deref().unwrap_or_default(),
        organizer.family_name.as_deref().unwrap_or_default(),
    ]
    .join(" ")
    .trim()
    .to_string()
}

/// Primary address when one is marked, else the first listed.
fn organizer_email(organizer: Option<&Organizer>) -> String {
    let Some(organizer) = organizer else {
        return String::new();
    };
    let mut fallback = "";
    for email in &organizer.email_addresses {
        let address = email.address.as_deref().unwrap_or_default();
        if email.primary {
            return address.to_string();
        }
        if fallback.is_empty() {
            fallback = address;
        }
    }
    fallback.to_string()
}

/// `M/D/YYYY` without zero padding, matching the spreadsheet sources.
fn event_date(start_date: Option<&str>) -> String {
    start_date
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|date| {
            use chrono::Datelike;
            format!("{}/{}/{}", date.month(), date.day(), date.year())
        })
        .unwrap_or_else(|| DEFAULT_EVENT_DATE.to_string())
}

pub(crate) fn convert_event(event: CampaignEvent) -> Feature {
    let organizer = event
        .embedded
        .as_ref()
        .and_then(|embedded| embedded.organizer.as_ref());
    let host = organizer_name(organizer);

    let mut properties = Properties::new();
    let mut set = |name: &str, value: PropertyValue| {
        properties.insert(name.to_string(), value);
    };
    set("source", CAMPAIGN_SOURCE_TAG.into());
    set("affiliate", false.into());
    set(
        "name",
        event
            .name
            .clone()
            .or(event.title.clone())
            .unwrap_or_default()
            .into(),
    );
    set("eventDate", event_date(event.start_date.as_deref()).into());
    set("eventLink", event.browser_url.clone().unwrap_or_default().into());
    set("location", event_location(event.location.as_ref()).into());
    set("contactEmail", organizer_email(organizer).into());
    set("host", host.clone().into());
    set("contactName", host.into());
    set("facebook", "".into());
    set("instagram", "".into());
    set("twitter", "".into());

    Feature::new(properties)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_event(name: &str, postal_code: &str, organizer: &str) -> serde_json::Value {
        let (given, family) = organizer.split_once(' ').unwrap_or((organizer, ""));
        serde_json::json!({
            "name": name,
            "start_date": "2018-06-30T10:00:00Z",
            "browser_url": format!("https://example.org/{name}"),
            "location": {"country": "US", "locality": "New York", "postal_code": postal_code},
            "_embedded": {
                "osdi:organizer": {
                    "given_name": given,
                    "family_name": family,
                    "email_addresses": [
                        {"address": "second@example.org", "primary": false},
                        {"address": "first@example.org", "primary": true}
                    ]
                }
            }
        })
    }

    #[tokio::test]
    async fn test_events_paginated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v2/event_campaigns/camp-1/events"))
            .and(query_param("page", "1"))
            .and(header("OSDI-API-Token", "token-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_embedded": {"osdi:events": [sample_event("Rally", "10025", "Larry Person")]},
                "total_pages": 2
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v2/event_campaigns/camp-1/events"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "_embedded": {"osdi:events": [sample_event("March", "50312", "Mark Langgin")]},
                "total_pages": 2
            })))
            .mount(&server)
            .await;

        let client = CampaignClient::new(server.uri(), "token-1");
        let sheet = client.events("camp-1").await;

        assert_eq!(sheet.len(), 2);
        let rally = &sheet["10025::Larry Person"];
        assert_eq!(rally.property_text("name"), Some("Rally"));
        assert_eq!(rally.property_text("eventDate"), Some("6/30/2018"));
        assert_eq!(rally.property_text("contactEmail"), Some("first@example.org"));
        assert_eq!(rally.property_text("source"), Some("actionnetwork"));
        assert!(sheet.contains_key("50312::Mark Langgin"));
    }

    #[tokio::test]
    async fn test_events_non_2xx_degrades_to_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = CampaignClient::new(server.uri(), "token-1");
        assert!(client.events("camp-1").await.is_empty());
    }

    #[test]
    fn test_event_location_non_us() {
        let location = EventLocation {
            locality: Some("Auckland".to_string()),
            country: Some("New Zealand".to_string()),
            postal_code: Some("1010".to_string()),
        };
        assert_eq!(event_location(Some(&location)), "Auckland, New Zealand");
        assert_eq!(event_location(None), "");
    }

    #[test]
    fn test_event_location_us_uses_postal_code() {
        let location = EventLocation {
            locality: Some("New York".to_string()),
            country: None,
            postal_code: Some("10025".to_string()),
        };
        assert_eq!(event_location(Some(&location)), "10025");
    }

    #[test]
    fn test_organizer_email_falls_back_to_first() {
        let organizer = Organizer {
            given_name: None,
            family_name: None,
            email_addresses: vec![
                EmailAddress {
                    address: Some("a@example.org".to_string()),
                    primary: false,
                },
                EmailAddress {
                    address: Some("b@example.org".to_string()),
                    primary: false,
                },
            ],
        };
        assert_eq!(organizer_email(Some(&organizer)), "a@example.org");
        assert_eq!(organizer_email(None), "");
    }

    #[test]
    fn test_event_date_fallback() {
        assert_eq!(event_date(Some("2018-06-30T10:00:00Z")), "6/30/2018");
        assert_eq!(event_date(Some("not a date")), DEFAULT_EVENT_DATE);
        assert_eq!(event_date(None), DEFAULT_EVENT_DATE);
    }

    #[test]
    fn test_convert_event_name_falls_back_to_title() {
        let event: CampaignEvent = serde_json::from_value(serde_json::json!({
            "title": "Afterparty",
            "location": {"postal_code": "10025"}
        }))
        .unwrap();
        let feature = convert_event(event);
        assert_eq!(feature.property_text("name"), Some("Afterparty"));
        assert_eq!(feature.property_text("location"), Some("10025"));
        assert_eq!(feature.property_text("host"), Some(""));
    }
}
