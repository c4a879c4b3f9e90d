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
use num::Num;

pub mod collections;
pub mod datetime;
pub mod angle;
pub mod errors;

pub use errors::{FleetCommonError,Result};

/// f64 does not carry more significant decimal digits than this
pub const MAX_DECIMALS: u32 = 15;

/// round `x` to the given number of decimal places. More than [`MAX_DECIMALS`] returns `x` unchanged
#[inline]
pub fn rounded (x: f64, decimals: u32)->f64 {
    if decimals > MAX_DECIMALS { return x }
    let f = 10f64.powi( decimals as i32);
    (x * f).round() / f
}

/// a generic bounding box without semantics for the coordinate type
#[derive(Debug,Copy,Clone,Serialize,Deserialize,PartialEq)]
pub struct BoundingBox <T: Num> {
    pub west: T,
    pub south: T,
    pub east: T,
    pub north: T
}

impl <T: Num + Copy + PartialOrd> BoundingBox<T> {
    pub fn new(west: T, south: T, east: T, north: T)->Self {
        BoundingBox{ west, south, east, north}
    }

    /// inclusive containment test. Note that we do not handle boxes that cross the antimeridian
    pub fn contains (&self, x: T, y: T)->bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }
}
