/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header::{ACCEPT, AUTHORIZATION}};
use serde::{Serialize,Deserialize};
use serde_json::json;
use tracing::debug;
use fleet_common::datetime::EpochMillis;

use crate::{errors::{transport_error, Result}, sample::RoutePoint};

pub const DEFAULT_HISTORY_HOURS: u32 = 12;

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub enum TimeRange {
    /// the last n hours
    Last(u32),
    Between { min: EpochMillis, max: EpochMillis },
}

/// aggregation interval of the server side route history
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
pub enum Interval {
    Minutes(u32),
    NoInterval,
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct HistoryRequest {
    pub id_chart: Option<String>,
    pub id_machines: Vec<String>,
    pub range: TimeRange,
    pub interval: Interval,
}

impl HistoryRequest {
    /// the initial fetch of a view: last 12 hours with 1 minute interval
    pub fn recent (id_machines: Vec<String>)->Self {
        HistoryRequest { id_chart: None, id_machines, range: TimeRange::Last(DEFAULT_HISTORY_HOURS), interval: Interval::Minutes(1) }
    }

    pub fn with_hours (mut self, hours: u32)->Self {
        self.range = TimeRange::Last(hours);
        self
    }

    pub fn with_chart (mut self, id_chart: impl ToString)->Self {
        self.id_chart = Some(id_chart.to_string());
        self
    }

    /// the query parameters of the route history request
    pub fn query_params (&self)->Vec<(&'static str,String)> {
        let mut params = Vec::new();
        if let Some(id_chart) = &self.id_chart {
            params.push( ("idChart", id_chart.clone()));
        }
        if !self.id_machines.is_empty() {
            params.push( ("idMachines", self.id_machines.join(",")));
        }
        match &self.range {
            TimeRange::Last(hours) => params.push( ("hours", hours.to_string())),
            TimeRange::Between{min,max} => {
                params.push( ("min", min.to_string()));
                params.push( ("max", max.to_string()));
            }
        }
        match self.interval {
            Interval::Minutes(n) => params.push( ("interval", n.to_string())),
            Interval::NoInterval => params.push( ("noInterval", "true".to_string())),
        }
        params
    }
}

/// where historical positions and routes come from. Implementations have to be cancel safe since
/// results of outdated requests are dropped
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// the binary position/course collection for the requested machines
    async fn fetch_positions (&self, request: &HistoryRequest)->Result<Bytes>;

    /// already decoded route tuples
    async fn fetch_route_history (&self, request: &HistoryRequest)->Result<Vec<RoutePoint>>;
}

/// [`HistorySource`] for the fleet REST api
#[derive(Debug,Clone)]
pub struct HttpHistorySource {
    client: Client,
    base_url: String,
    access_token: Option<String>,
}

impl HttpHistorySource {
    pub fn new (base_url: impl ToString, access_token: Option<String>)->Self {
        let base_url = base_url.to_string().trim_end_matches('/').to_string();
        HttpHistorySource { client: Client::new(), base_url, access_token }
    }

    fn positions_url (&self)->String { format!("{}/fleet/lastpositions", self.base_url) }
    fn route_url (&self)->String { format!("{}/sensorstate/chart/maphistory", self.base_url) }

    fn authorized (&self, rb: reqwest::RequestBuilder)->reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => rb.header( AUTHORIZATION, format!("Bearer {token}")),
            None => rb
        }
    }
}

#[async_trait]
impl HistorySource for HttpHistorySource {
    async fn fetch_positions (&self, request: &HistoryRequest)->Result<Bytes> {
        let url = self.positions_url();
        debug!("fetching positions from {url} for {:?}", request.id_machines);

        let rb = self.client.post( &url)
            .header( ACCEPT, "application/octet-stream")
            .json( &json!({ "idAssets": request.id_machines }));
        let response = self.authorized(rb).send().await?;

        if response.status().is_success() {
            Ok( response.bytes().await? )
        } else {
            Err( transport_error( format!("positions request failed with status {}", response.status())))
        }
    }

    async fn fetch_route_history (&self, request: &HistoryRequest)->Result<Vec<RoutePoint>> {
        let url = self.route_url();
        let params = request.query_params();
        debug!("fetching route history from {url} with {params:?}");

        let rb = self.client.get( &url).query( &params);
        let response = self.authorized(rb).send().await?;

        if response.status().is_success() {
            Ok( response.json::<Vec<RoutePoint>>().await? )
        } else {
            Err( transport_error( format!("route history request failed with status {}", response.status())))
        }
    }
}
