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

// run with "cargo test --test test_decoder -- --nocapture"

use std::sync::Arc;
use fleet_track::{
    decoder::*,
    errors::DecodeError,
    schema::{CollectionSchema, SchemaRegistry, ScalarKind, POSITIONS_COLLECTION},
};

fn collection ()->DecodedCollection {
    DecodedCollection {
        points: vec![
            PositionRecord { id_asset: "A1".into(), id_sensor: "S1".into(), lat: 10.0, lon: 20.0, timestamp_secs: 1000 },
            PositionRecord { id_asset: "A1".into(), id_sensor: "S1".into(), lat: 10.5, lon: 20.25, timestamp_secs: 1060 },
            PositionRecord { id_asset: "A2".into(), id_sensor: "S7".into(), lat: -33.8688, lon: 151.2093, timestamp_secs: 1_700_000_000 },
        ],
        courses: vec![
            CourseRecord { id_asset: "A1".into(), id_sensor: "H1".into(), course_degrees: 271.5, timestamp_secs: 1060 },
        ]
    }
}

fn unprefixed ()->CollectionSchema {
    CollectionSchema { length_prefixed: false, ..CollectionSchema::default() }
}

fn is_malformed (res: &Result<DecodedCollection,DecodeError>)->bool {
    matches!( res, Err(DecodeError::Malformed(_)))
}

#[test]
fn test_round_trip () {
    let decoder = CollectionDecoder::new( SchemaRegistry::positions());
    let input = collection();

    let buf = decoder.encode( &input).unwrap();
    println!("encoded {} into {} bytes", input, buf.len());

    let output = decoder.decode( &buf).unwrap();
    println!("{output:#?}");
    assert_eq!( input, output);

    // records convert into samples with millis timestamps
    let s = output.points[0].to_sample();
    assert_eq!( 1_000_000, s.date.millis());
    assert_eq!( 1000.0, output.points[0].to_route_point().timestamp_secs);
}

#[test]
fn test_empty () {
    let decoder = CollectionDecoder::new( SchemaRegistry::positions());

    assert!( is_malformed( &decoder.decode( &[])));

    // an empty collection is not an error
    let buf = decoder.encode( &DecodedCollection::default()).unwrap();
    assert_eq!( vec![0u8], buf);
    let res = decoder.decode( &buf).unwrap();
    assert!( res.is_empty());
}

#[test]
fn test_malformed () {
    let decoder = CollectionDecoder::new( SchemaRegistry::positions());
    let buf = decoder.encode( &collection()).unwrap();

    // length prefix does not match
    assert!( is_malformed( &decoder.decode( &buf[..buf.len()-1])));

    // truncated record without length prefix
    let decoder = CollectionDecoder::new( Arc::new( unprefixed()));
    let buf = decoder.encode( &collection()).unwrap();
    assert!( is_malformed( &decoder.decode( &buf[..buf.len()-3])));

    // groups
    assert!( is_malformed( &decoder.decode( &[0x0b, 0x0c])));

    // varint that never ends
    assert!( is_malformed( &decoder.decode( &[0x08, 0xff,0xff,0xff,0xff,0xff,0xff,0xff,0xff,0xff,0xff,0x01])));

    // point without ids: just a lat field (3:I64)
    let mut buf = vec![0x0a, 9, 0x19];
    buf.extend_from_slice( &10.0f64.to_le_bytes());
    let res = decoder.decode( &buf);
    println!("{res:?}");
    assert!( is_malformed( &res));

    // wrong wire type for a known field: lat as varint
    let buf = vec![0x0a, 0x08, 0x0a, 0x01, b'A', 0x12, 0x01, b'S', 0x18, 0x01];
    assert!( is_malformed( &decoder.decode( &buf)));
}

#[test]
fn test_unknown_fields () {
    let decoder = CollectionDecoder::new( Arc::new( unprefixed()));
    let mut buf = vec![ 0x48, 0x2a ]; // field 9 varint 42
    buf.extend( decoder.encode( &collection()).unwrap());
    buf.extend( [0x51, 1,2,3,4,5,6,7,8]); // field 10 fixed64

    assert_eq!( collection(), decoder.decode( &buf).unwrap());
}

#[test]
fn test_missing_numeric_defaults () {
    let decoder = CollectionDecoder::new( Arc::new( unprefixed()));
    // point with ids only
    let buf = vec![0x0a, 0x06, 0x0a, 0x01, b'A', 0x12, 0x01, b'S'];
    let res = decoder.decode( &buf).unwrap();
    assert_eq!( PositionRecord { id_asset: "A".into(), id_sensor: "S".into(), lat: 0.0, lon: 0.0, timestamp_secs: 0 }, res.points[0]);
}

const INT_ID_SCHEMA: &str = r#"
CollectionSchema(
    message: "test.IntIdCollection",
    length_prefixed: false,
    points: (
        field: 1,
        id_asset: (number: 1, kind: Int64),
        id_sensor: (number: 2, kind: String),
        lat: (number: 3, kind: Float),
        lon: (number: 4, kind: Float),
        timestamp: (number: 5, kind: SInt64),
    ),
    courses: (
        field: 2,
        id_asset: (number: 1, kind: Int64),
        id_sensor: (number: 2, kind: String),
        course: (number: 3, kind: Int32),
        timestamp: (number: 4, kind: UInt64),
    ),
)
"#;

#[test]
fn test_schema_variants () {
    let schema = CollectionSchema::from_ron_str( INT_ID_SCHEMA).unwrap();
    assert_eq!( ScalarKind::Float, schema.points.lat.kind);
    assert!( !schema.length_prefixed);

    let decoder = CollectionDecoder::new( SchemaRegistry::register( schema));
    let input = DecodedCollection {
        points: vec![ PositionRecord { id_asset: "4711".into(), id_sensor: "gps".into(), lat: 10.5, lon: -20.25, timestamp_secs: -5 } ],
        courses: vec![ CourseRecord { id_asset: "4711".into(), id_sensor: "hdg".into(), course_degrees: 90.0, timestamp_secs: 1000 } ],
    };
    let buf = decoder.encode( &input).unwrap();
    assert_eq!( input, decoder.decode( &buf).unwrap());

    // non-integer ids can't be encoded with this schema
    let bad = DecodedCollection { points: vec![ PositionRecord { id_asset: "X".into(), ..input.points[0].clone() } ], courses: vec![] };
    assert!( decoder.encode( &bad).is_err());
}

#[test]
fn test_schema_validation () {
    let dup = INT_ID_SCHEMA.replace( "id_sensor: (number: 2, kind: String),\n        lat: (number: 3", "id_sensor: (number: 3, kind: String),\n        lat: (number: 3");
    let res = CollectionSchema::from_ron_str( &dup);
    println!("{res:?}");
    assert!( res.is_err());

    let non_int_ts = INT_ID_SCHEMA.replace( "timestamp: (number: 5, kind: SInt64)", "timestamp: (number: 5, kind: Double)");
    assert!( CollectionSchema::from_ron_str( &non_int_ts).is_err());
}

#[test]
fn test_registry () {
    let s1 = SchemaRegistry::positions();
    let s2 = SchemaRegistry::positions();
    assert!( Arc::ptr_eq( &s1, &s2));
    assert_eq!( POSITIONS_COLLECTION, s1.message);

    let schema = SchemaRegistry::get_or_load( POSITIONS_COLLECTION, "configs/positions_schema.ron").unwrap();
    assert!( Arc::ptr_eq( &s1, &schema));

    let loaded = CollectionSchema::from_file( "configs/positions_schema.ron").unwrap();
    assert_eq!( *s1, loaded);
}

#[test]
fn test_timestamp_out_of_range () {
    let decoder = CollectionDecoder::new( SchemaRegistry::positions());

    let mut input = DecodedCollection::default();
    input.points.push( PositionRecord { id_asset: "A1".into(), id_sensor: "S1".into(), lat: 10.0, lon: 20.0, timestamp_secs: i64::MAX/10 });
    let buf = decoder.encode( &input).unwrap();
    let res = decoder.decode( &buf);
    println!("{res:?}");
    assert!( is_malformed( &res));

    let mut input = DecodedCollection::default();
    input.courses.push( CourseRecord { id_asset: "A1".into(), id_sensor: "H1".into(), course_degrees: 90.0, timestamp_secs: i64::MIN/10 });
    let buf = decoder.encode( &input).unwrap();
    assert!( is_malformed( &decoder.decode( &buf)));
}
