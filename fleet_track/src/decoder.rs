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

//! decoder for the binary position/course collection we get from the historical fetch.
//!
//! The payload uses protobuf wire encoding, optionally preceded by a varint length prefix:
//! ```text
//!   [len:varint] { points:1 { idAsset:1 idSensor:2 lat:3 lon:4 timestamp:5 }* courses:2 { .. }* }
//! ```
//! Field numbers and scalar kinds are not hardcoded but come from the [`CollectionSchema`].
//! We do not do any unit conversion here - timestamps stay in epoch seconds.

use std::{fmt, sync::Arc};
use serde::{Serialize,Deserialize};
use fleet_common::datetime::EpochMillis;

use crate::{
    errors::{DecodeError, malformed, op_failed, Result},
    sample::{Sample, RoutePoint},
    schema::{CollectionSchema, FieldSpec, ScalarKind},
};

const MAX_VARINT_LEN: usize = 10;

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct PositionRecord {
    pub id_asset: String,
    pub id_sensor: String,
    pub lat: f64,
    pub lon: f64,
    pub timestamp_secs: i64,
}

impl PositionRecord {
    pub fn to_sample (&self)->Sample {
        Sample::position( &self.id_asset, &self.id_sensor, self.lat, self.lon, EpochMillis::from_secs( self.timestamp_secs))
    }

    pub fn to_route_point (&self)->RoutePoint {
        RoutePoint::new( &self.id_asset, self.timestamp_secs as f64, self.lat, self.lon)
    }
}

#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct CourseRecord {
    pub id_asset: String,
    pub id_sensor: String,
    pub course_degrees: f64,
    pub timestamp_secs: i64,
}

impl CourseRecord {
    pub fn to_sample (&self)->Sample {
        Sample::heading( &self.id_asset, &self.id_sensor, self.course_degrees, EpochMillis::from_secs( self.timestamp_secs))
    }
}

#[derive(Debug,Clone,PartialEq,Default,Serialize,Deserialize)]
pub struct DecodedCollection {
    pub points: Vec<PositionRecord>,
    pub courses: Vec<CourseRecord>,
}

impl DecodedCollection {
    pub fn is_empty (&self)->bool { self.points.is_empty() && self.courses.is_empty() }
}

impl fmt::Display for DecodedCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!( f, "DecodedCollection( points: {}, courses: {})", self.points.len(), self.courses.len())
    }
}

/// the decoder only holds a reference to the shared schema so it is cheap to create and clone
#[derive(Debug,Clone)]
pub struct CollectionDecoder {
    schema: Arc<CollectionSchema>,
}

impl CollectionDecoder {
    pub fn new (schema: Arc<CollectionSchema>)->Self {
        CollectionDecoder { schema }
    }

    pub fn schema (&self)->&CollectionSchema { self.schema.as_ref() }

    pub fn decode (&self, buf: &[u8])->std::result::Result<DecodedCollection,DecodeError> {
        decode_collection( &self.schema, buf)
    }

    pub fn encode (&self, collection: &DecodedCollection)->Result<Vec<u8>> {
        encode_collection( &self.schema, collection)
    }
}

/* #region decoding **************************************************************************************/

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
#[repr(u8)]
enum WireType {
    Varint = 0,
    I64 = 1,
    Len = 2,
    I32 = 5,
}

impl WireType {
    fn from_u8 (v: u8)->std::result::Result<Self,DecodeError> {
        match v {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            5 => Ok(WireType::I32),
            3 | 4 => Err( malformed!("groups are not supported")),
            _ => Err( malformed!("invalid wire type {v}"))
        }
    }

    fn for_kind (kind: ScalarKind)->Self {
        match kind {
            ScalarKind::String => WireType::Len,
            ScalarKind::Double => WireType::I64,
            ScalarKind::Float => WireType::I32,
            ScalarKind::Int32 | ScalarKind::Int64 | ScalarKind::UInt64 | ScalarKind::SInt64 => WireType::Varint,
        }
    }
}

#[derive(Debug,Clone,Copy)]
enum WireValue<'a> {
    Varint(u64),
    I64(u64),
    I32(u32),
    Len(&'a [u8]),
}

struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new (buf: &'a [u8])->Self { WireReader { buf, pos: 0 } }

    fn is_done (&self)->bool { self.pos >= self.buf.len() }

    fn read_varint (&mut self)->std::result::Result<u64,DecodeError> {
        let mut v: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            let b = *self.buf.get( self.pos).ok_or_else( || malformed!("truncated varint at {}", self.pos))?;
            self.pos += 1;
            v |= ((b & 0x7f) as u64) << (7*i);
            if b & 0x80 == 0 { return Ok(v) }
        }
        Err( malformed!("varint exceeds {MAX_VARINT_LEN} bytes"))
    }

    fn read_bytes (&mut self, n: usize)->std::result::Result<&'a [u8],DecodeError> {
        let end = self.pos.checked_add(n).filter( |end| *end <= self.buf.len())
            .ok_or_else( || malformed!("field of length {n} at {} exceeds buffer", self.pos))?;
        let buf: &'a [u8] = self.buf;
        let bs = &buf[self.pos..end];
        self.pos = end;
        Ok(bs)
    }

    fn read_key (&mut self)->std::result::Result<(u32,WireType),DecodeError> {
        let key = self.read_varint()?;
        let field = (key >> 3) as u32;
        if field == 0 { return Err( malformed!("field number 0 at {}", self.pos)) }
        Ok( (field, WireType::from_u8( (key & 0x7) as u8)?) )
    }

    fn read_value (&mut self, wt: WireType)->std::result::Result<WireValue<'a>,DecodeError> {
        match wt {
            WireType::Varint => Ok( WireValue::Varint( self.read_varint()?)),
            WireType::I64 => {
                let bs = self.read_bytes(8)?;
                let mut a = [0u8;8];
                a.copy_from_slice(bs);
                Ok( WireValue::I64( u64::from_le_bytes(a)))
            }
            WireType::I32 => {
                let bs = self.read_bytes(4)?;
                let mut a = [0u8;4];
                a.copy_from_slice(bs);
                Ok( WireValue::I32( u32::from_le_bytes(a)))
            }
            WireType::Len => {
                let len = self.read_varint()?;
                let len = usize::try_from(len).map_err( |_| malformed!("length {len} out of range"))?;
                Ok( WireValue::Len( self.read_bytes(len)?))
            }
        }
    }

    /// next (field,value) pair or None if we are at the end of the buffer
    fn next_field (&mut self)->std::result::Result<Option<(u32,WireType,WireValue<'a>)>,DecodeError> {
        if self.is_done() { return Ok(None) }
        let (field,wt) = self.read_key()?;
        let v = self.read_value(wt)?;
        Ok( Some((field,wt,v)) )
    }
}

fn expect_wire_type (spec: &FieldSpec, wt: WireType)->std::result::Result<(),DecodeError> {
    let expected = WireType::for_kind( spec.kind);
    if wt == expected { Ok(()) } else { Err( malformed!("field {} has wire type {:?}, expected {:?}", spec.number, wt, expected)) }
}

fn int_value (kind: ScalarKind, v: WireValue)->std::result::Result<i64,DecodeError> {
    match (kind, v) {
        (ScalarKind::Int64, WireValue::Varint(u)) => Ok(u as i64),
        (ScalarKind::Int32, WireValue::Varint(u)) => Ok((u as i64) as i32 as i64),
        (ScalarKind::UInt64, WireValue::Varint(u)) => i64::try_from(u).map_err( |_| malformed!("uint64 value {u} out of range")),
        (ScalarKind::SInt64, WireValue::Varint(u)) => Ok( ((u >> 1) as i64) ^ -((u & 1) as i64)),
        _ => Err( malformed!("not an integer value: {v:?}"))
    }
}

fn float_value (kind: ScalarKind, v: WireValue)->std::result::Result<f64,DecodeError> {
    match (kind, v) {
        (ScalarKind::Double, WireValue::I64(u)) => Ok( f64::from_bits(u)),
        (ScalarKind::Float, WireValue::I32(u)) => Ok( f32::from_bits(u) as f64),
        (k, v) if k.is_integer() => int_value(k,v).map( |i| i as f64),
        _ => Err( malformed!("not a numeric value: {v:?}"))
    }
}

/// ids are strings in the default schema but some producers send integer ids, which we turn into strings
fn id_value (kind: ScalarKind, v: WireValue)->std::result::Result<String,DecodeError> {
    match v {
        WireValue::Len(bs) => std::str::from_utf8(bs)
            .map( |s| s.to_string())
            .map_err( |e| malformed!("invalid utf8 id: {e}")),
        v => int_value( kind, v).map( |i| i.to_string())
    }
}

/// timestamps have to be representable as epoch millis
fn check_timestamp (what: &str, timestamp_secs: i64)->std::result::Result<i64,DecodeError> {
    match EpochMillis::checked_from_secs( timestamp_secs) {
        Some(_) => Ok(timestamp_secs),
        None => Err( malformed!("{what} timestamp {timestamp_secs} out of range"))
    }
}

fn decode_point (schema: &CollectionSchema, buf: &[u8])->std::result::Result<PositionRecord,DecodeError> {
    let ps = &schema.points;
    let mut id_asset: Option<String> = None;
    let mut id_sensor: Option<String> = None;
    let mut lat = 0.0; // absent numeric fields have the protobuf default
    let mut lon = 0.0;
    let mut timestamp_secs: i64 = 0;

    let mut r = WireReader::new(buf);
    while let Some((field,wt,v)) = r.next_field()? {
        if field == ps.id_asset.number { expect_wire_type( &ps.id_asset, wt)?; id_asset = Some( id_value( ps.id_asset.kind, v)?) }
        else if field == ps.id_sensor.number { expect_wire_type( &ps.id_sensor, wt)?; id_sensor = Some( id_value( ps.id_sensor.kind, v)?) }
        else if field == ps.lat.number { expect_wire_type( &ps.lat, wt)?; lat = float_value( ps.lat.kind, v)? }
        else if field == ps.lon.number { expect_wire_type( &ps.lon, wt)?; lon = float_value( ps.lon.kind, v)? }
        else if field == ps.timestamp.number { expect_wire_type( &ps.timestamp, wt)?; timestamp_secs = int_value( ps.timestamp.kind, v)? }
        // unknown fields are skipped
    }

    let id_asset = id_asset.ok_or_else( || malformed!("point without asset id"))?;
    let id_sensor = id_sensor.ok_or_else( || malformed!("point without sensor id"))?;
    let timestamp_secs = check_timestamp( "point", timestamp_secs)?;
    Ok( PositionRecord { id_asset, id_sensor, lat, lon, timestamp_secs } )
}

fn decode_course (schema: &CollectionSchema, buf: &[u8])->std::result::Result<CourseRecord,DecodeError> {
    let cs = &schema.courses;
    let mut id_asset: Option<String> = None;
    let mut id_sensor: Option<String> = None;
    let mut course_degrees = 0.0;
    let mut timestamp_secs: i64 = 0;

    let mut r = WireReader::new(buf);
    while let Some((field,wt,v)) = r.next_field()? {
        if field == cs.id_asset.number { expect_wire_type( &cs.id_asset, wt)?; id_asset = Some( id_value( cs.id_asset.kind, v)?) }
        else if field == cs.id_sensor.number { expect_wire_type( &cs.id_sensor, wt)?; id_sensor = Some( id_value( cs.id_sensor.kind, v)?) }
        else if field == cs.course.number { expect_wire_type( &cs.course, wt)?; course_degrees = float_value( cs.course.kind, v)? }
        else if field == cs.timestamp.number { expect_wire_type( &cs.timestamp, wt)?; timestamp_secs = int_value( cs.timestamp.kind, v)? }
    }

    let id_asset = id_asset.ok_or_else( || malformed!("course without asset id"))?;
    let id_sensor = id_sensor.ok_or_else( || malformed!("course without sensor id"))?;
    let timestamp_secs = check_timestamp( "course", timestamp_secs)?;
    Ok( CourseRecord { id_asset, id_sensor, course_degrees, timestamp_secs } )
}

/// decode a (possibly length prefixed) collection. An empty buffer is malformed, a collection without
/// points and courses is not
pub fn decode_collection (schema: &CollectionSchema, buf: &[u8])->std::result::Result<DecodedCollection,DecodeError> {
    if buf.is_empty() { return Err( malformed!("empty buffer")) }

    let body = if schema.length_prefixed {
        let mut r = WireReader::new(buf);
        let len = r.read_varint()?;
        let rest = buf.len() - r.pos;
        if len != rest as u64 {
            return Err( malformed!("length prefix {len} does not match payload size {rest}"))
        }
        &buf[r.pos..]
    } else {
        buf
    };

    let mut collection = DecodedCollection::default();
    let mut r = WireReader::new(body);
    while let Some((field,wt,v)) = r.next_field()? {
        if field == schema.points.field {
            match v {
                WireValue::Len(bs) => collection.points.push( decode_point( schema, bs)?),
                _ => return Err( malformed!("points field has wire type {wt:?}"))
            }
        } else if field == schema.courses.field {
            match v {
                WireValue::Len(bs) => collection.courses.push( decode_course( schema, bs)?),
                _ => return Err( malformed!("courses field has wire type {wt:?}"))
            }
        }
    }

    Ok(collection)
}

/* #endregion decoding */

/* #region encoding **************************************************************************************/

fn put_varint (buf: &mut Vec<u8>, mut v: u64) {
    while v >= 0x80 {
        buf.push( (v as u8) | 0x80);
        v >>= 7;
    }
    buf.push( v as u8);
}

fn put_key (buf: &mut Vec<u8>, field: u32, wt: WireType) {
    put_varint( buf, ((field as u64) << 3) | (wt as u64));
}

fn put_len_delimited (buf: &mut Vec<u8>, field: u32, bs: &[u8]) {
    put_key( buf, field, WireType::Len);
    put_varint( buf, bs.len() as u64);
    buf.extend_from_slice( bs);
}

fn put_int (buf: &mut Vec<u8>, spec: &FieldSpec, v: i64)->Result<()> {
    let u = match spec.kind {
        ScalarKind::Int64 => v as u64,
        ScalarKind::Int32 => {
            let i = i32::try_from(v).map_err( |_| op_failed( format!("{v} does not fit into int32")))?;
            i as i64 as u64
        }
        ScalarKind::UInt64 => u64::try_from(v).map_err( |_| op_failed( format!("negative uint64 value {v}")))?,
        ScalarKind::SInt64 => ((v << 1) ^ (v >> 63)) as u64,
        k => return Err( op_failed( format!("{k:?} is not an integer kind")))
    };
    put_key( buf, spec.number, WireType::Varint);
    put_varint( buf, u);
    Ok(())
}

fn put_float (buf: &mut Vec<u8>, spec: &FieldSpec, v: f64)->Result<()> {
    match spec.kind {
        ScalarKind::Double => {
            put_key( buf, spec.number, WireType::I64);
            buf.extend_from_slice( &v.to_bits().to_le_bytes());
            Ok(())
        }
        ScalarKind::Float => {
            put_key( buf, spec.number, WireType::I32);
            buf.extend_from_slice( &(v as f32).to_bits().to_le_bytes());
            Ok(())
        }
        k if k.is_integer() => put_int( buf, spec, v.round() as i64),
        k => Err( op_failed( format!("{k:?} is not a numeric kind")))
    }
}

fn put_id (buf: &mut Vec<u8>, spec: &FieldSpec, id: &str)->Result<()> {
    match spec.kind {
        ScalarKind::String => { put_len_delimited( buf, spec.number, id.as_bytes()); Ok(()) }
        k if k.is_integer() => {
            let v: i64 = id.parse().map_err( |_| op_failed( format!("id '{id}' is not an integer")))?;
            put_int( buf, spec, v)
        }
        k => Err( op_failed( format!("{k:?} is not a valid id kind")))
    }
}

/// encode a collection according to `schema`. This is the inverse of [`decode_collection`] and is
/// mostly used to create fixtures and simulated feeds
pub fn encode_collection (schema: &CollectionSchema, collection: &DecodedCollection)->Result<Vec<u8>> {
    let mut body: Vec<u8> = Vec::with_capacity( 48 * (collection.points.len() + collection.courses.len()));
    let mut rec: Vec<u8> = Vec::with_capacity(64);

    let ps = &schema.points;
    for p in &collection.points {
        rec.clear();
        put_id( &mut rec, &ps.id_asset, &p.id_asset)?;
        put_id( &mut rec, &ps.id_sensor, &p.id_sensor)?;
        put_float( &mut rec, &ps.lat, p.lat)?;
        put_float( &mut rec, &ps.lon, p.lon)?;
        put_int( &mut rec, &ps.timestamp, p.timestamp_secs)?;
        put_len_delimited( &mut body, ps.field, &rec);
    }

    let cs = &schema.courses;
    for c in &collection.courses {
        rec.clear();
        put_id( &mut rec, &cs.id_asset, &c.id_asset)?;
        put_id( &mut rec, &cs.id_sensor, &c.id_sensor)?;
        put_float( &mut rec, &cs.course, c.course_degrees)?;
        put_int( &mut rec, &cs.timestamp, c.timestamp_secs)?;
        put_len_delimited( &mut body, cs.field, &rec);
    }

    if schema.length_prefixed {
        let mut buf = Vec::with_capacity( body.len() + MAX_VARINT_LEN);
        put_varint( &mut buf, body.len() as u64);
        buf.extend_from_slice( &body);
        Ok(buf)
    } else {
        Ok(body)
    }
}

/* #endregion encoding */
