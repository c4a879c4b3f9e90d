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

// run with "cargo test --test test_store -- --nocapture"

use fleet_common::datetime::EpochMillis;
use fleet_track::{
    decoder::{CollectionDecoder, DecodedCollection, PositionRecord, CourseRecord},
    errors::NormalizeError,
    normalize::CoordinateNormalizer,
    reconciler::Reconciled,
    sample::{RoutePoint, Sample, SampleValue},
    schema::SchemaRegistry,
    store::{TrajectoryStore, DEFAULT_ROUTE_CAPACITY},
};

fn new_store ()->TrajectoryStore {
    TrajectoryStore::new( CoordinateNormalizer::default(), DEFAULT_ROUTE_CAPACITY)
}

fn point (id_asset: &str, id_sensor: &str, lat: f64, lon: f64, timestamp_secs: i64)->PositionRecord {
    PositionRecord { id_asset: id_asset.into(), id_sensor: id_sensor.into(), lat, lon, timestamp_secs }
}

#[test]
fn test_decoded_then_live () {
    let decoder = CollectionDecoder::new( SchemaRegistry::positions());
    let historical = DecodedCollection { points: vec![ point( "A1", "S1", 10.0, 20.0, 1000) ], courses: vec![] };
    let buf = decoder.encode( &historical).unwrap();

    let mut store = new_store();
    let summary = store.load_decoded( &decoder.decode( &buf).unwrap());
    assert_eq!( 1, summary.n_accepted);
    assert_eq!( Some([10.0,20.0]), store.current_position("A1"));
    assert_eq!( 1, store.route().len()); // fallback to decoded points

    let live = Sample::position( "A1", "S1", 11.0, 21.0, EpochMillis::new( 1000*1000 + 1));
    assert_eq!( Ok(Reconciled::Replaced), store.apply_position( live));
    assert_eq!( Some([11.0,21.0]), store.current_position("A1"));

    // stale duplicate of the historical point
    let dup = historical.points[0].to_sample();
    assert_eq!( Ok(Reconciled::Stale), store.apply_position( dup));
    assert_eq!( Some([11.0,21.0]), store.current_position("A1"));

    let route = store.route();
    println!("route: {}", serde_json::to_string( &route).unwrap());
    assert_eq!( 1, route.len());
    assert_eq!( [11.0,21.0], route[0].lat_lon());
    assert_eq!( 1000.001, route[0].timestamp_secs);

    let stats = store.stats();
    println!("{stats:?}");
    assert_eq!( 1, stats.n_rejected_stale);
    assert_eq!( 0, stats.n_dropped_invalid);
}

#[test]
fn test_route_bound () {
    let mut store = new_store();
    for i in 0..1500 {
        let s = Sample::position( "A1", "S1", 10.0 + i as f64 * 0.001, 20.0, EpochMillis::from_secs( 1000 + i));
        store.apply_position( s).unwrap();
    }

    let route = store.route();
    assert_eq!( 1000, route.len());
    assert_eq!( 1500.0, route[0].timestamp_secs);
    assert_eq!( 2499.0, route[999].timestamp_secs);
    assert!( route.windows(2).all( |w| w[0].timestamp_secs < w[1].timestamp_secs));
}

#[test]
fn test_invalid_samples () {
    let mut store = new_store();
    store.apply_position( Sample::position( "A1", "S1", 10.0, 20.0, EpochMillis::new(1000))).unwrap();

    let short = Sample::new( "A1", "S1", SampleValue::Coordinates( vec![Some(11.0)]), EpochMillis::new(2000));
    assert_eq!( Err(NormalizeError::WrongArity(1)), store.apply_position( short));

    let out_of_range = Sample::position( "A1", "S1", 95.0, 20.0, EpochMillis::new(3000));
    assert!( store.apply_position( out_of_range).is_err());

    let not_a_heading = Sample::position( "A1", "H1", 1.0, 2.0, EpochMillis::new(3000));
    assert_eq!( Err(NormalizeError::NotACoordinate), store.apply_heading( not_a_heading));

    assert_eq!( Some([10.0,20.0]), store.current_position("A1"));
    assert_eq!( 1, store.route_len());
    assert_eq!( 3, store.stats().n_dropped_invalid);
}

#[test]
fn test_heading () {
    let mut store = new_store();
    store.apply_position( Sample::position( "A1", "S1", 10.0, 20.0, EpochMillis::new(5000))).unwrap();

    // headings are not compared against positions of the same machine
    assert_eq!( Ok(Reconciled::Initial), store.apply_heading( Sample::heading( "A1", "H1", 30.0, EpochMillis::new(1000))));
    assert_eq!( Some(30.0), store.current_heading( "A1", 0.0));
    assert_eq!( Some(345.0), store.current_heading( "A1", -45.0));

    assert_eq!( Ok(Reconciled::Stale), store.apply_heading( Sample::heading( "A1", "H1", 90.0, EpochMillis::new(1000))));
    assert_eq!( Ok(Reconciled::Replaced), store.apply_heading( Sample::heading( "A1", "H1", 350.0, EpochMillis::new(2000))));
    assert_eq!( Some(35.0), store.current_heading( "A1", 45.0));

    assert_eq!( None, store.current_heading( "A2", 0.0));
}

#[test]
fn test_decoded_courses () {
    let mut store = new_store();
    let collection = DecodedCollection {
        points: vec![ point( "A1", "S1", 10.0, 20.0, 1060), point( "A1", "S1", 9.0, 19.0, 1000), point( "A1", "S1", 99.0, 19.0, 1030) ],
        courses: vec![ CourseRecord { id_asset: "A1".into(), id_sensor: "H1".into(), course_degrees: 180.0, timestamp_secs: 1060 } ],
    };
    let summary = store.load_decoded( &collection);
    println!("{summary:?}");
    assert_eq!( 2, summary.n_accepted); // the newest point and the course
    assert_eq!( 1, summary.n_stale);
    assert_eq!( 1, summary.n_dropped);

    assert_eq!( Some([10.0,20.0]), store.current_position("A1"));
    assert_eq!( Some(180.0), store.current_heading( "A1", 0.0));

    // fallback route is time ordered and has no invalid points
    let route = store.route();
    assert_eq!( vec![1000.0, 1060.0], route.iter().map( |p| p.timestamp_secs).collect::<Vec<f64>>());
}

#[test]
fn test_route_history () {
    let mut store = new_store();
    let points: Vec<RoutePoint> = (0..1200).map( |i| RoutePoint::new( "A1", i as f64, 10.0, 20.0)).collect();
    store.load_route_history( points);

    let route = store.route();
    assert_eq!( 1000, route.len());
    assert_eq!( 200.0, route[0].timestamp_secs);

    // filtered routes are not extended by live positions
    store.set_live_route( false);
    store.apply_position( Sample::position( "A1", "S1", 11.0, 21.0, EpochMillis::from_secs(5000))).unwrap();
    assert_eq!( 1000, store.route_len());
    assert_eq!( Some([11.0,21.0]), store.current_position("A1"));

    store.set_live_route( true);
    store.apply_position( Sample::position( "A1", "S1", 12.0, 22.0, EpochMillis::from_secs(5001))).unwrap();
    assert_eq!( 5001.0, store.route().last().unwrap().timestamp_secs);

    let json = serde_json::to_string( &store.route()[0]).unwrap();
    assert_eq!( r#"["A1",201.0,10.0,20.0]"#, json);
}
