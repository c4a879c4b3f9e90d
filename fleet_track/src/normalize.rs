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

use serde::{Serialize,Deserialize};
use fleet_common::{rounded, angle::{is_latitude,is_longitude}};
use crate::{sample::SampleValue, errors::NormalizeError};

/// the component order of raw coordinate pairs
#[derive(Debug,Clone,Copy,PartialEq,Eq,Default,Serialize,Deserialize)]
pub enum CoordinateOrder {
    #[default]
    LatLon,
    LonLat,
    /// swap if the first component can't be a latitude but the second one can
    Auto,
}

/// pure function that turns a raw coordinate pair into a canonical `[lat,lon]`, optionally rounded to `decimals`
pub fn normalize (raw: &[f64], order: CoordinateOrder, decimals: Option<u32>)->Result<[f64;2],NormalizeError> {
    if raw.is_empty() { return Err(NormalizeError::Missing) }
    if raw.len() != 2 { return Err(NormalizeError::WrongArity(raw.len())) }

    let (c0,c1) = (raw[0], raw[1]);
    if !c0.is_finite() || !c1.is_finite() { return Err(NormalizeError::NonFinite) }

    let (lat,lon) = match order {
        CoordinateOrder::LatLon => (c0,c1),
        CoordinateOrder::LonLat => (c1,c0),
        CoordinateOrder::Auto => if !is_latitude(c0) && is_latitude(c1) { (c1,c0) } else { (c0,c1) }
    };

    if !is_latitude(lat) || !is_longitude(lon) {
        return Err(NormalizeError::OutOfRange(lat,lon))
    }

    Ok( match decimals {
        Some(n) => [rounded(lat,n), rounded(lon,n)],
        None => [lat,lon]
    })
}

/// normalize the position payload of a sample. Named fields (`lat`/`lon`, `latitude`/`longitude`) are
/// unambiguous and hence not subject to `order`
pub fn normalize_value (value: &SampleValue, order: CoordinateOrder, decimals: Option<u32>)->Result<[f64;2],NormalizeError> {
    match value {
        SampleValue::Coordinates(cs) => {
            let mut raw: Vec<f64> = Vec::with_capacity(cs.len());
            for c in cs {
                match c {
                    Some(v) => raw.push(*v),
                    None => return Err(NormalizeError::Missing)
                }
            }
            normalize( &raw, order, decimals)
        }
        SampleValue::LatLon{lat,lon} => normalize( &[*lat,*lon], CoordinateOrder::LatLon, decimals),
        SampleValue::LatitudeLongitude{latitude,longitude} => normalize( &[*latitude,*longitude], CoordinateOrder::LatLon, decimals),
        SampleValue::Scalar(_) => Err(NormalizeError::NotACoordinate),
        SampleValue::Other(v) => if v.is_null() { Err(NormalizeError::Missing) } else { Err(NormalizeError::NotACoordinate) }
    }
}

/// configured normalizer instance so that callers don't have to pass around order and precision
#[derive(Debug,Clone,Copy,Default)]
pub struct CoordinateNormalizer {
    pub order: CoordinateOrder,
    pub decimals: Option<u32>,
}

impl CoordinateNormalizer {
    pub fn new (order: CoordinateOrder, decimals: Option<u32>)->Self {
        CoordinateNormalizer { order, decimals }
    }

    pub fn normalize (&self, raw: &[f64])->Result<[f64;2],NormalizeError> {
        normalize( raw, self.order, self.decimals)
    }

    pub fn normalize_value (&self, value: &SampleValue)->Result<[f64;2],NormalizeError> {
        normalize_value( value, self.order, self.decimals)
    }
}
