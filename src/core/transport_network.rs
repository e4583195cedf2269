//! Transport Network Graph
//!
//! Stations are graph nodes. Every pair of consecutive stops on a route adds
//! a directed edge tagged with that route, so a station only knows the routes
//! that *leave* it. Travel times live on the edges.
//!
//! Nodes are stored in a `Vec` and referenced by index; lines own their
//! routes, and edges point back at routes by (line index, route index).

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::{Id, Line, NetworkLayout, PassengerEvent, PassengerEventKind, Station};

type NodeIndex = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RouteRef {
    line: usize,
    route: usize,
}

#[derive(Debug, Clone)]
struct GraphEdge {
    route: RouteRef,
    next: NodeIndex,
    travel_time: u32,
}

#[derive(Debug, Clone)]
struct GraphNode {
    id: Id,
    name: String,
    passenger_count: i64,
    edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone)]
struct RouteInternal {
    id: Id,
    stops: Vec<NodeIndex>,
}

#[derive(Debug, Clone)]
struct LineInternal {
    routes: Vec<RouteInternal>,
    route_index: HashMap<Id, usize>,
}

/// Live view of the network: topology, travel times and passenger counts
#[derive(Debug, Clone, Default)]
pub struct TransportNetwork {
    nodes: Vec<GraphNode>,
    station_index: HashMap<Id, NodeIndex>,
    lines: Vec<LineInternal>,
    line_index: HashMap<Id, usize>,
}

impl TransportNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the network from the raw layout JSON
    pub fn from_json(src: serde_json::Value) -> AppResult<Self> {
        let layout: NetworkLayout = serde_json::from_value(src).map_err(|e| {
            AppError::with_source(
                ErrorCode::NetworkInvalidLayout,
                "Layout JSON does not match the expected schema",
                e,
            )
        })?;
        Self::from_layout(layout)
    }

    /// Build the network from a decoded layout.
    ///
    /// Stations are added first, then lines, then travel times.
    pub fn from_layout(layout: NetworkLayout) -> AppResult<Self> {
        let mut network = Self::new();

        for station in &layout.stations {
            if !network.add_station(station) {
                return Err(AppError::invalid_layout(format!(
                    "Can't add station: {}",
                    station.id
                )));
            }
        }

        for line in &layout.lines {
            if !network.add_line(line) {
                return Err(AppError::invalid_layout(format!("Can't add line: {}", line.id)));
            }
        }

        for travel_time in &layout.travel_times {
            if !network.set_travel_time(
                &travel_time.start_station_id,
                &travel_time.end_station_id,
                travel_time.travel_time,
            ) {
                return Err(AppError::invalid_layout(format!(
                    "Can't set travel time between {} and {}",
                    travel_time.start_station_id, travel_time.end_station_id
                )));
            }
        }

        info!(
            "🗺️ Network loaded: {} stations, {} lines",
            network.nodes.len(),
            network.lines.len()
        );
        Ok(network)
    }

    /// Add a station. Returns false if the id is already taken.
    pub fn add_station(&mut self, station: &Station) -> bool {
        if self.station_index.contains_key(&station.id) {
            warn!("Duplicate station: {}", station.id);
            return false;
        }

        self.station_index.insert(station.id.clone(), self.nodes.len());
        self.nodes.push(GraphNode {
            id: station.id.clone(),
            name: station.name.clone(),
            passenger_count: 0,
            edges: Vec::new(),
        });
        true
    }

    /// Add a line with all of its routes.
    ///
    /// Every route must have a unique id within the line, at least one stop,
    /// and only stops that are already known stations. If anything is wrong
    /// the network is left untouched and false is returned.
    pub fn add_line(&mut self, line: &Line) -> bool {
        if self.line_index.contains_key(&line.id) {
            warn!("Duplicate line: {}", line.id);
            return false;
        }

        let line_pos = self.lines.len();
        let mut routes = Vec::with_capacity(line.routes.len());
        let mut route_index = HashMap::with_capacity(line.routes.len());

        for route in &line.routes {
            if route_index.contains_key(&route.id) {
                warn!("Duplicate route {} on line {}", route.id, line.id);
                return false;
            }
            if route.stops.is_empty() {
                warn!("Route {} on line {} has no stops", route.id, line.id);
                return false;
            }

            let mut stops = Vec::with_capacity(route.stops.len());
            for stop in &route.stops {
                match self.station_index.get(stop) {
                    Some(&node) => stops.push(node),
                    None => {
                        warn!("Route {} references unknown station {}", route.id, stop);
                        return false;
                    }
                }
            }

            route_index.insert(route.id.clone(), routes.len());
            routes.push(RouteInternal {
                id: route.id.clone(),
                stops,
            });
        }

        // Everything validated; wire up the edges.
        for (route_pos, route) in routes.iter().enumerate() {
            let route_ref = RouteRef {
                line: line_pos,
                route: route_pos,
            };
            for pair in route.stops.windows(2) {
                self.nodes[pair[0]].edges.push(GraphEdge {
                    route: route_ref,
                    next: pair[1],
                    travel_time: 0,
                });
            }
        }

        self.line_index.insert(line.id.clone(), line_pos);
        self.lines.push(LineInternal {
            routes,
            route_index,
        });
        true
    }

    /// Apply a passenger event. Returns false for an unknown station.
    pub fn record_passenger_event(&mut self, event: &PassengerEvent) -> bool {
        let Some(&node) = self.station_index.get(&event.station_id) else {
            debug!("Passenger event for unknown station {}", event.station_id);
            return false;
        };

        let station = &mut self.nodes[node];
        match event.kind {
            PassengerEventKind::In => station.passenger_count += 1,
            PassengerEventKind::Out => station.passenger_count -= 1,
        }
        true
    }

    /// Current passenger count at a station. Can be negative if the feed was
    /// joined while passengers were already inside.
    pub fn passenger_count(&self, station_id: &str) -> AppResult<i64> {
        self.station_index
            .get(station_id)
            .map(|&node| self.nodes[node].passenger_count)
            .ok_or_else(|| AppError::unknown_station(station_id))
    }

    /// Ids of the routes stopping at a station, including routes that
    /// terminate there. Empty for an unknown station.
    pub fn routes_serving_station(&self, station_id: &str) -> Vec<Id> {
        let Some(&node) = self.station_index.get(station_id) else {
            return Vec::new();
        };

        let mut seen: HashSet<RouteRef> = HashSet::new();
        let mut serving = Vec::new();

        for edge in &self.nodes[node].edges {
            if seen.insert(edge.route) {
                serving.push(self.route(edge.route).id.clone());
            }
        }

        // The terminal stop of a route has no outgoing edge for it.
        for (line_pos, line) in self.lines.iter().enumerate() {
            for (route_pos, route) in line.routes.iter().enumerate() {
                let route_ref = RouteRef {
                    line: line_pos,
                    route: route_pos,
                };
                if route.stops.last() == Some(&node) && seen.insert(route_ref) {
                    serving.push(route.id.clone());
                }
            }
        }

        serving
    }

    /// Set the travel time between two adjacent stations, in both
    /// directions and on every route linking them. Returns false if either
    /// station is unknown or they are not adjacent.
    pub fn set_travel_time(&mut self, station_a: &str, station_b: &str, travel_time: u32) -> bool {
        let (Some(&a), Some(&b)) = (
            self.station_index.get(station_a),
            self.station_index.get(station_b),
        ) else {
            return false;
        };

        let mut found = false;
        for (from, to) in [(a, b), (b, a)] {
            for edge in self.nodes[from].edges.iter_mut().filter(|e| e.next == to) {
                edge.travel_time = travel_time;
                found = true;
            }
        }
        found
    }

    /// Travel time between two adjacent stations, 0 if they are not adjacent
    pub fn travel_time(&self, station_a: &str, station_b: &str) -> u32 {
        let (Some(&a), Some(&b)) = (
            self.station_index.get(station_a),
            self.station_index.get(station_b),
        ) else {
            return 0;
        };

        self.edge_between(a, b)
            .or_else(|| self.edge_between(b, a))
            .map(|edge| edge.travel_time)
            .unwrap_or(0)
    }

    /// Cumulative travel time from `station_a` to `station_b` along one
    /// route. 0 if either station is not on the route, or `station_b`
    /// comes before `station_a`.
    pub fn travel_time_on_route(
        &self,
        line_id: &str,
        route_id: &str,
        station_a: &str,
        station_b: &str,
    ) -> u32 {
        let (Some(&a), Some(&b)) = (
            self.station_index.get(station_a),
            self.station_index.get(station_b),
        ) else {
            return 0;
        };
        let Some(&line_pos) = self.line_index.get(line_id) else {
            return 0;
        };
        let Some(&route_pos) = self.lines[line_pos].route_index.get(route_id) else {
            return 0;
        };
        let route_ref = RouteRef {
            line: line_pos,
            route: route_pos,
        };

        let mut found_a = false;
        let mut travel_time = 0;
        for &stop in &self.route(route_ref).stops {
            if stop == a {
                found_a = true;
            }
            if stop == b {
                return if found_a { travel_time } else { 0 };
            }
            if found_a {
                match self.nodes[stop].edges.iter().find(|e| e.route == route_ref) {
                    Some(edge) => travel_time += edge.travel_time,
                    None => return 0,
                }
            }
        }
        0
    }

    /// Passenger count of every station, ordered by station id
    pub fn passenger_counts(&self) -> Vec<(Id, String, i64)> {
        let mut counts: Vec<_> = self
            .nodes
            .iter()
            .map(|n| (n.id.clone(), n.name.clone(), n.passenger_count))
            .collect();
        counts.sort_by(|x, y| x.0.cmp(&y.0));
        counts
    }

    pub fn station_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    fn route(&self, route: RouteRef) -> &RouteInternal {
        &self.lines[route.line].routes[route.route]
    }

    fn edge_between(&self, from: NodeIndex, to: NodeIndex) -> Option<&GraphEdge> {
        self.nodes[from].edges.iter().find(|e| e.next == to)
    }
}
