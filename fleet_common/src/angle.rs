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

/// map degrees into [0..360). Note that tiny negative remainders would round up to 360.0 so we fold them back
#[inline]
pub fn normalize_360 (d: f64) -> f64 {
    let x = d % 360.0;
    let x = if x < 0.0 { 360.0 + x } else { x };
    if x >= 360.0 { 0.0 } else { x }
}

#[inline] pub fn is_latitude (d: f64)->bool { d.is_finite() && (-90.0..=90.0).contains(&d) }
#[inline] pub fn is_longitude (d: f64)->bool { d.is_finite() && (-180.0..=180.0).contains(&d) }
