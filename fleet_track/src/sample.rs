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

use std::{fmt, sync::Arc};
use serde::{Serialize,Deserialize,Serializer,Deserializer,ser::SerializeTuple};
use fleet_common::datetime::EpochMillis;

/// the (idMachine,idSensor) identity we reconcile samples by
#[derive(Debug,Clone,PartialEq,Eq,Hash,PartialOrd,Ord,Serialize,Deserialize)]
#[serde(rename_all="camelCase")]
pub struct TrajectoryKey {
    pub id_machine: Arc<String>,
    pub id_sensor: Arc<String>,
}

impl TrajectoryKey {
    pub fn new (id_machine: impl ToString, id_sensor: impl ToString)->Self {
        TrajectoryKey { id_machine: Arc::new(id_machine.to_string()), id_sensor: Arc::new(id_sensor.to_string()) }
    }

    pub fn id_machine (&self)->&str { self.id_machine.as_str() }
    pub fn id_sensor (&self)->&str { self.id_sensor.as_str() }
}

impl fmt::Display for TrajectoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "({},{})", self.id_machine, self.id_sensor)
    }
}

/// what a sensor reports. Position and heading samples for the same machine are never compared
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum SensorKind {
    Position,
    Heading,
}

/// the raw sample payload as it comes from the feed. Position sensors do not agree on a coordinate
/// representation so we accept all variants we have seen and leave it to the normalizer to make sense of it
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Scalar(f64),
    Coordinates(Vec<Option<f64>>),
    LatLon { lat: f64, lon: f64 },
    LatitudeLongitude { latitude: f64, longitude: f64 },
    Other(serde_json::Value),
}

impl SampleValue {
    pub fn pair (c0: f64, c1: f64)->Self { SampleValue::Coordinates( vec![Some(c0), Some(c1)]) }

    pub fn as_scalar (&self)->Option<f64> {
        if let SampleValue::Scalar(v) = self { Some(*v) } else { None }
    }
}

/// a single timestamped value for one (machine,sensor) pair. Immutable once created
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
#[serde(rename_all="camelCase")]
pub struct Sample {
    pub id_machine: String,
    pub id_sensor: String,
    pub value: SampleValue,
    pub date: EpochMillis,
}

impl Sample {
    pub fn new (id_machine: impl ToString, id_sensor: impl ToString, value: SampleValue, date: EpochMillis)->Self {
        Sample { id_machine: id_machine.to_string(), id_sensor: id_sensor.to_string(), value, date }
    }

    pub fn position (id_machine: impl ToString, id_sensor: impl ToString, lat: f64, lon: f64, date: EpochMillis)->Self {
        Sample::new( id_machine, id_sensor, SampleValue::pair(lat,lon), date)
    }

    pub fn heading (id_machine: impl ToString, id_sensor: impl ToString, degrees: f64, date: EpochMillis)->Self {
        Sample::new( id_machine, id_sensor, SampleValue::Scalar(degrees), date)
    }

    pub fn key (&self)->TrajectoryKey { TrajectoryKey::new( &self.id_machine, &self.id_sensor) }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "Sample( {}/{}: {:?} @ {})", self.id_machine, self.id_sensor, self.value, self.date)
    }
}

/// the map configuration unit: one machine with its position sensor and an optional heading sensor
#[derive(Debug,Clone,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub struct WatchedAsset {
    pub id_machine: String,
    pub position_sensor: String,
    #[serde(default)]
    pub heading_sensor: Option<String>,
}

impl WatchedAsset {
    pub fn new (id_machine: impl ToString, position_sensor: impl ToString, heading_sensor: Option<&str>)->Self {
        WatchedAsset {
            id_machine: id_machine.to_string(),
            position_sensor: position_sensor.to_string(),
            heading_sensor: heading_sensor.map(|s| s.to_string())
        }
    }

    pub fn keys (&self)->Vec<(TrajectoryKey,SensorKind)> {
        let mut keys = vec![ (TrajectoryKey::new( &self.id_machine, &self.position_sensor), SensorKind::Position) ];
        if let Some(hs) = &self.heading_sensor {
            keys.push( (TrajectoryKey::new( &self.id_machine, hs), SensorKind::Heading));
        }
        keys
    }
}

/// compact route entry that serializes as `[idMachine, timestampSeconds, lat, lon]`
#[derive(Debug,Clone,PartialEq)]
pub struct RoutePoint {
    pub id_machine: Arc<String>,
    pub timestamp_secs: f64,
    pub lat: f64,
    pub lon: f64,
}

impl RoutePoint {
    pub fn new (id_machine: impl ToString, timestamp_secs: f64, lat: f64, lon: f64)->Self {
        RoutePoint { id_machine: Arc::new(id_machine.to_string()), timestamp_secs, lat, lon }
    }

    pub fn date (&self)->EpochMillis { EpochMillis::from_secs_f64( self.timestamp_secs) }

    pub fn lat_lon (&self)->[f64;2] { [self.lat, self.lon] }
}

impl Serialize for RoutePoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error> where S: Serializer {
        let mut tup = serializer.serialize_tuple(4)?;
        tup.serialize_element( self.id_machine.as_str())?;
        tup.serialize_element( &self.timestamp_secs)?;
        tup.serialize_element( &self.lat)?;
        tup.serialize_element( &self.lon)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for RoutePoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        let (id_machine, timestamp_secs, lat, lon): (String,f64,f64,f64) = Deserialize::deserialize(deserializer)?;
        Ok( RoutePoint::new( id_machine, timestamp_secs, lat, lon) )
    }
}
