//! Type definitions for the transport network
//! Public data structures exchanged with the network layout file and the
//! passenger event feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::errors::{AppError, AppResult, ErrorCode};

/// Identifier shared by stations, lines and routes
pub type Id = String;

/// A station in the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    #[serde(rename = "station_id")]
    pub id: Id,
    pub name: String,
}

/// One direction of travel on a line, as an ordered list of stops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "route_id")]
    pub id: Id,
    pub direction: String,
    pub line_id: Id,
    pub start_station_id: Id,
    pub end_station_id: Id,
    #[serde(rename = "route_stops")]
    pub stops: Vec<Id>,
}

/// A line groups the routes that run under the same name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    #[serde(rename = "line_id")]
    pub id: Id,
    pub name: String,
    pub routes: Vec<Route>,
}

/// Travel time between two adjacent stations, in minutes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelTime {
    pub start_station_id: Id,
    pub end_station_id: Id,
    pub travel_time: u32,
}

/// The network layout document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLayout {
    pub stations: Vec<Station>,
    pub lines: Vec<Line>,
    #[serde(default)]
    pub travel_times: Vec<TravelTime>,
}

/// Direction of a passenger event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassengerEventKind {
    In,
    Out,
}

impl PassengerEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "in",
            Self::Out => "out",
        }
    }
}

/// A passenger entering or leaving a station
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassengerEvent {
    pub station_id: Id,
    #[serde(rename = "passenger_event")]
    pub kind: PassengerEventKind,
    #[serde(rename = "datetime")]
    pub timestamp: DateTime<Utc>,
}

impl PassengerEvent {
    pub fn new(station_id: impl Into<Id>, kind: PassengerEventKind) -> Self {
        Self {
            station_id: station_id.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// Decode the JSON body of a MESSAGE frame from the event feed
    pub fn from_json(body: &str) -> AppResult<Self> {
        serde_json::from_str(body).map_err(|e| {
            AppError::with_source(
                ErrorCode::NetworkInvalidEvent,
                format!("Invalid passenger event: {}", body),
                e,
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passenger_event_from_feed_json() {
        let body = r#"{"datetime":"2020-11-01T07:18:50.234000Z","passenger_event":"in","station_id":"station_211"}"#;
        let event = PassengerEvent::from_json(body).unwrap();
        assert_eq!(event.station_id, "station_211");
        assert_eq!(event.kind, PassengerEventKind::In);
        assert_eq!(event.timestamp.to_rfc3339(), "2020-11-01T07:18:50.234+00:00");
    }

    #[test]
    fn test_passenger_event_rejects_unknown_kind() {
        let body = r#"{"datetime":"2020-11-01T07:18:50Z","passenger_event":"sideways","station_id":"s"}"#;
        let err = PassengerEvent::from_json(body).unwrap_err();
        assert_eq!(err.code, ErrorCode::NetworkInvalidEvent);
    }

    #[test]
    fn test_layout_field_names() {
        let json = serde_json::json!({
            "stations": [{"station_id": "s0", "name": "Station 0"}],
            "lines": [{
                "line_id": "l0",
                "name": "Line 0",
                "routes": [{
                    "route_id": "r0",
                    "direction": "inbound",
                    "line_id": "l0",
                    "start_station_id": "s0",
                    "end_station_id": "s0",
                    "route_stops": ["s0"]
                }]
            }],
            "travel_times": []
        });
        let layout: NetworkLayout = serde_json::from_value(json).unwrap();
        assert_eq!(layout.stations[0].id, "s0");
        assert_eq!(layout.lines[0].routes[0].stops, vec!["s0".to_string()]);
    }
}
