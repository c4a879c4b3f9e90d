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

// run with "cargo test --test test_config -- --nocapture"

use fleet_common::datetime::{secs, EpochMillis};
use fleet_track::{
    config::{load_fleet_config, FleetTrackConfig},
    live_connector::{WsCmd, WsMsg},
    normalize::CoordinateOrder,
    sample::{SampleValue, WatchedAsset},
};

#[test]
fn test_load_config () {
    let config = load_fleet_config( "configs/fleet_track.ron").unwrap();
    println!("{config:#?}");

    assert_eq!( 2, config.watched.len());
    assert_eq!( WatchedAsset::new( "4712", "gps-2", None), config.watched[1]);
    assert_eq!( CoordinateOrder::Auto, config.coordinate_order);
    assert_eq!( -45.0, config.heading_offset);
    assert_eq!( secs(1), config.playback_tick);
    assert!( config.region.is_some());

    let normalizer = config.normalizer();
    assert_eq!( Ok([37.5, -122.25]), normalizer.normalize( &[-122.25, 37.5]));
}

#[test]
fn test_defaults () {
    let config: FleetTrackConfig = ron::from_str( r#"( base_url: "http://localhost/api", ws_url: "ws://localhost/ws" )"#).unwrap();
    assert_eq!( "sensorstate", config.topic_prefix);
    assert_eq!( 1000, config.route_capacity);
    assert_eq!( 12, config.initial_hours);
    assert_eq!( secs(5), config.reconnect_delay);
    assert!( config.validate().is_ok());
}

#[test]
fn test_validation () {
    let config = FleetTrackConfig { route_capacity: 0, ..FleetTrackConfig::default() };
    assert!( config.validate().is_err());

    let config = FleetTrackConfig { decimals: Some(400), ..FleetTrackConfig::default() };
    assert!( config.validate().is_err());

    let config = FleetTrackConfig { playback_tick: std::time::Duration::ZERO, ..FleetTrackConfig::default() };
    assert!( config.validate().is_err());

    let config = FleetTrackConfig { default_speed: 0.0, ..FleetTrackConfig::default() };
    let res = config.validate();
    println!("{res:?}");
    assert!( res.is_err());
}

#[test]
fn test_ws_frames () {
    let cmd = WsCmd::Join { topics: vec!["sensorstate_S1_A1".to_string()] };
    assert_eq!( r#"{"event":"join","data":{"topics":["sensorstate_S1_A1"]}}"#, serde_json::to_string(&cmd).unwrap());

    let msg: WsMsg = serde_json::from_str( r#"{"event":"data","data":{"topic":"sensorstate_S1_A1",
        "samples":[{"idMachine":"A1","idSensor":"S1","value":[11,21],"date":1000001}]}}"#).unwrap();
    println!("{msg:?}");
    match msg {
        WsMsg::Data{topic,samples} => {
            assert_eq!( "sensorstate_S1_A1", topic);
            assert_eq!( SampleValue::pair( 11.0, 21.0), samples[0].value);
            assert_eq!( EpochMillis::new(1_000_001), samples[0].date);
        }
        other => panic!("unexpected message {other:?}")
    }

    let msg: WsMsg = serde_json::from_str( r#"{"event":"data","data":{"topic":"sensorstate_P1_A1",
        "samples":[{"idMachine":"A1","idSensor":"P1","value":{"latitude":37.5,"longitude":-122.0},"date":"1970-01-01T00:16:40.001Z"}]}}"#).unwrap();
    if let WsMsg::Data{samples,..} = msg {
        assert_eq!( SampleValue::LatitudeLongitude{ latitude: 37.5, longitude: -122.0 }, samples[0].value);
    } else {
        panic!("expected data message")
    }
}
