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

use std::{fmt, str::FromStr, time::Duration};
use chrono::{DateTime,TimeZone,Utc};
use serde::{Serialize,Deserialize,Deserializer,de::{self,Visitor}};
use parse_duration::parse;

use crate::errors::{FleetCommonError, Result as CommonResult};

/// epoch milliseconds. This is our canonical time representation for samples and playback cursors
#[derive(Serialize,Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,Default)]
pub struct EpochMillis(i64);

impl EpochMillis {
    pub const fn new(millis:i64)->Self { EpochMillis(millis) }

    /// saturates at the i64 limits. Use [`checked_from_secs`](Self::checked_from_secs) for untrusted input
    pub const fn from_secs(secs: i64)->Self { EpochMillis(secs.saturating_mul(1000)) }

    pub const fn checked_from_secs(secs: i64)->Option<Self> {
        match secs.checked_mul(1000) {
            Some(millis) => Some(EpochMillis(millis)),
            None => None
        }
    }

    /// fractional seconds as used by route tuples. Sub-millisecond fractions are rounded
    pub fn from_secs_f64(secs: f64)->Self { EpochMillis( (secs * 1000.0).round() as i64) }

    pub fn millis(&self)->i64 { self.0 }

    pub fn as_secs_f64(&self)->f64 { self.0 as f64 / 1000.0 }

    pub fn to_datetime(&self)->Option<DateTime<Utc>> { DateTime::<Utc>::from_timestamp_millis(self.0) }
}

impl fmt::Display for EpochMillis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => write!(f, "EpochMillis({})", self.0)
        }
    }
}

impl<Tz> From<DateTime<Tz>> for EpochMillis where Tz: TimeZone {
    fn from (date: DateTime<Tz>)->Self { EpochMillis(date.timestamp_millis()) }
}

/// parses either an integer epoch millis value or an RFC3339 date
impl FromStr for EpochMillis {
    type Err = FleetCommonError;

    fn from_str (s: &str)->CommonResult<Self> {
        let s = s.trim();
        if let Ok(millis) = s.parse::<i64>() {
            return Ok( EpochMillis(millis))
        }
        DateTime::parse_from_rfc3339(s)
            .map( EpochMillis::from)
            .map_err( |e| FleetCommonError::InvalidDate( format!("'{s}': {e}")))
    }
}

/// we accept both epoch millis numbers and RFC3339 strings since live feeds use the latter
impl<'de> Deserialize<'de> for EpochMillis {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error> where D: Deserializer<'de> {
        struct EpochMillisVisitor;

        impl<'de> Visitor<'de> for EpochMillisVisitor {
            type Value = EpochMillis;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("epoch millis number or RFC3339 date string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<EpochMillis,E> { Ok(EpochMillis(v)) }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<EpochMillis,E> {
                i64::try_from(v).map(EpochMillis).map_err(|_| E::custom("epoch millis out of range"))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<EpochMillis,E> {
                if v.is_finite() { Ok(EpochMillis(v.round() as i64)) } else { Err(E::custom("non-finite epoch millis")) }
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<EpochMillis,E> {
                s.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(EpochMillisVisitor)
    }
}

#[inline] pub fn millis (n: u64)->Duration { Duration::from_millis(n) }
#[inline] pub fn secs (n: u64)->Duration { Duration::from_secs(n) }

//--- support for serde

pub fn deserialize_duration <'a,D>(deserializer: D) -> Result<Duration,D::Error>
    where D: Deserializer<'a>
{
    String::deserialize(deserializer).and_then( |string| {
        parse(string.as_str())
            .map_err( |e| serde::de::Error::custom(format!("{:?}",e)))
    })
}
