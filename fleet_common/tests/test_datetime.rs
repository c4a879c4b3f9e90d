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
#![allow(unused)]

// run with "cargo test --test test_datetime -- --nocapture"

use std::time::Duration;
use serde::Deserialize;
use fleet_common::datetime::*;

#[test]
fn test_epoch_millis () {
    let t = EpochMillis::from_secs(1000);
    assert_eq!( 1_000_000, t.millis());
    assert_eq!( 1000.0, t.as_secs_f64());
    assert_eq!( EpochMillis::new(1500), EpochMillis::from_secs_f64(1.5));

    // out of range seconds saturate, the checked variant rejects them
    let big = i64::MAX / 10;
    assert_eq!( i64::MAX, EpochMillis::from_secs(big).millis());
    assert_eq!( None, EpochMillis::checked_from_secs(big));
    assert_eq!( Some(t), EpochMillis::checked_from_secs(1000));
    println!("{t}");
    assert_eq!( "1970-01-01T00:16:40.000Z", t.to_string());
}

#[test]
fn test_deserialize () {
    let ts: Vec<EpochMillis> = serde_json::from_str( r#"[1000001, 1000001.4, "1970-01-01T00:16:40.001Z"]"#).unwrap();
    println!("{ts:?}");
    assert!( ts.iter().all( |t| *t == EpochMillis::new(1_000_001)));

    assert!( serde_json::from_str::<EpochMillis>( r#""yesterday""#).is_err());
}

#[test]
fn test_parse () {
    assert_eq!( EpochMillis::new(1_000_001), "1000001".parse::<EpochMillis>().unwrap());
    assert_eq!( EpochMillis::new(1_000_001), "1970-01-01T00:16:40.001+00:00".parse::<EpochMillis>().unwrap());

    let res = "noon".parse::<EpochMillis>();
    println!("{res:?}");
    assert!( res.is_err());
}

#[derive(Deserialize)]
struct TickConfig {
    #[serde(deserialize_with="deserialize_duration")]
    tick: Duration,
}

#[test]
fn test_duration () {
    let cfg: TickConfig = serde_json::from_str( r#"{"tick": "500ms"}"#).unwrap();
    assert_eq!( millis(500), cfg.tick);

    let cfg: TickConfig = serde_json::from_str( r#"{"tick": "2m"}"#).unwrap();
    assert_eq!( secs(120), cfg.tick);
}
