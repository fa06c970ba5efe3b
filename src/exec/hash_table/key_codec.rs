// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Row key codec for set-operation hash sets.
//!
//! A key is the concatenation of every key column in declared order. Each column writes a
//! one-byte null flag (`1` null, `0` present) and, when present, its value: fixed-width
//! values as little-endian bytes, variable-width values as a little-endian `u32` length
//! followed by the raw bytes.
//!
//! Serialization is two-pass: `max_one_row_size` bounds a row so the caller can size one
//! scratch buffer for the whole chunk, then `serialize_columns` packs rows column by column
//! at a fixed stride and records each row's length in `slice_sizes`.

use arrow::array::{
    Array, ArrayBuilder, ArrayRef, AsArray, BinaryBuilder, BooleanArray, BooleanBuilder,
    NullBuilder, PrimitiveBuilder, StringBuilder, make_builder,
};
use arrow::buffer::NullBuffer;
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Date32Type, Decimal128Type, Float32Type, Float64Type,
    Int8Type, Int16Type, Int32Type, Int64Type, TimeUnit, TimestampMicrosecondType,
    TimestampMillisecondType, TimestampNanosecondType, TimestampSecondType,
};

use crate::common::status::Status;

use super::hash::{canonical_f32_bits, canonical_f64_bits};

const NULL_FLAG_SIZE: usize = 1;
const VARLEN_LENGTH_SIZE: usize = std::mem::size_of::<u32>();
const FLAG_NOT_NULL: u8 = 0;
const FLAG_NULL: u8 = 1;

pub(crate) fn fixed_width_size(data_type: &DataType) -> Option<usize> {
    let width = match data_type {
        DataType::Null => 0,
        DataType::Boolean | DataType::Int8 => 1,
        DataType::Int16 => 2,
        DataType::Int32 | DataType::Float32 | DataType::Date32 => 4,
        DataType::Int64 | DataType::Float64 | DataType::Timestamp(_, _) => 8,
        DataType::Decimal128(_, _) => 16,
        _ => return None,
    };
    Some(width)
}

pub(crate) fn is_varlen_key_type(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Utf8 | DataType::Binary)
}

pub(crate) fn check_key_types(key_types: &[DataType]) -> Result<(), Status> {
    for (idx, data_type) in key_types.iter().enumerate() {
        if fixed_width_size(data_type).is_none() && !is_varlen_key_type(data_type) {
            return Err(Status::not_supported(format!(
                "set operation key column {} has unsupported type {:?}",
                idx, data_type
            )));
        }
    }
    Ok(())
}

pub(crate) enum FixedValues<'a> {
    I8(&'a [i8]),
    I16(&'a [i16]),
    I32(&'a [i32]),
    I64(&'a [i64]),
    F32(&'a [f32]),
    F64(&'a [f64]),
    I128(&'a [i128]),
}

/// Typed, downcast view over one evaluated key column.
pub(crate) enum KeyColumnView<'a> {
    /// An untyped NULL column; every row encodes as null whatever the declared key type.
    AllNull,
    Boolean(&'a BooleanArray),
    Fixed {
        values: FixedValues<'a>,
        nulls: Option<&'a NullBuffer>,
    },
    Varlen {
        offsets: &'a [i32],
        data: &'a [u8],
        nulls: Option<&'a NullBuffer>,
    },
}

fn downcast_err(data_type: &DataType) -> Status {
    Status::internal_error(format!("failed to downcast key column of type {:?}", data_type))
}

fn primitive_values<'a, T: ArrowPrimitiveType>(
    array: &'a ArrayRef,
) -> Result<(&'a [T::Native], Option<&'a NullBuffer>), Status> {
    let arr = array
        .as_primitive_opt::<T>()
        .ok_or_else(|| downcast_err(array.data_type()))?;
    let values: &'a [T::Native] = arr.values();
    Ok((values, arr.nulls()))
}

fn fixed_view<'a, T: ArrowPrimitiveType>(
    array: &'a ArrayRef,
    wrap: fn(&'a [T::Native]) -> FixedValues<'a>,
) -> Result<KeyColumnView<'a>, Status> {
    let (values, nulls) = primitive_values::<T>(array)?;
    Ok(KeyColumnView::Fixed {
        values: wrap(values),
        nulls,
    })
}

/// Downcast each evaluated column, checking it against the declared key schema.
pub(crate) fn build_key_column_views<'a>(
    arrays: &'a [ArrayRef],
    key_types: &[DataType],
) -> Result<Vec<KeyColumnView<'a>>, Status> {
    if arrays.len() != key_types.len() {
        return Err(Status::internal_error(format!(
            "set operation key arity mismatch: expected {} columns, got {}",
            key_types.len(),
            arrays.len()
        )));
    }
    let num_rows = arrays.first().map(|a| a.len()).unwrap_or(0);
    let mut views = Vec::with_capacity(arrays.len());
    for (idx, (array, key_type)) in arrays.iter().zip(key_types.iter()).enumerate() {
        if array.len() != num_rows {
            return Err(Status::internal_error(format!(
                "set operation key column {} row count mismatch: expected {}, got {}",
                idx,
                num_rows,
                array.len()
            )));
        }
        if matches!(array.data_type(), DataType::Null) {
            views.push(KeyColumnView::AllNull);
            continue;
        }
        if array.data_type() != key_type {
            return Err(Status::internal_error(format!(
                "set operation key column {} type mismatch: expected {:?}, got {:?}",
                idx,
                key_type,
                array.data_type()
            )));
        }
        let view = match key_type {
            DataType::Null => KeyColumnView::AllNull,
            DataType::Boolean => KeyColumnView::Boolean(
                array
                    .as_boolean_opt()
                    .ok_or_else(|| downcast_err(key_type))?,
            ),
            DataType::Int8 => fixed_view::<Int8Type>(array, FixedValues::I8)?,
            DataType::Int16 => fixed_view::<Int16Type>(array, FixedValues::I16)?,
            DataType::Int32 => fixed_view::<Int32Type>(array, FixedValues::I32)?,
            DataType::Date32 => fixed_view::<Date32Type>(array, FixedValues::I32)?,
            DataType::Int64 => fixed_view::<Int64Type>(array, FixedValues::I64)?,
            DataType::Float32 => fixed_view::<Float32Type>(array, FixedValues::F32)?,
            DataType::Float64 => fixed_view::<Float64Type>(array, FixedValues::F64)?,
            DataType::Timestamp(TimeUnit::Second, _) => {
                fixed_view::<TimestampSecondType>(array, FixedValues::I64)?
            }
            DataType::Timestamp(TimeUnit::Millisecond, _) => {
                fixed_view::<TimestampMillisecondType>(array, FixedValues::I64)?
            }
            DataType::Timestamp(TimeUnit::Microsecond, _) => {
                fixed_view::<TimestampMicrosecondType>(array, FixedValues::I64)?
            }
            DataType::Timestamp(TimeUnit::Nanosecond, _) => {
                fixed_view::<TimestampNanosecondType>(array, FixedValues::I64)?
            }
            DataType::Decimal128(_, _) => fixed_view::<Decimal128Type>(array, FixedValues::I128)?,
            DataType::Utf8 => {
                let arr = array
                    .as_string_opt::<i32>()
                    .ok_or_else(|| downcast_err(key_type))?;
                KeyColumnView::Varlen {
                    offsets: arr.value_offsets(),
                    data: arr.value_data(),
                    nulls: arr.nulls(),
                }
            }
            DataType::Binary => {
                let arr = array
                    .as_binary_opt::<i32>()
                    .ok_or_else(|| downcast_err(key_type))?;
                KeyColumnView::Varlen {
                    offsets: arr.value_offsets(),
                    data: arr.value_data(),
                    nulls: arr.nulls(),
                }
            }
            other => {
                return Err(Status::not_supported(format!(
                    "set operation key column {} has unsupported type {:?}",
                    idx, other
                )));
            }
        };
        views.push(view);
    }
    Ok(views)
}

fn is_null_at(nulls: Option<&NullBuffer>, row: usize) -> bool {
    nulls.map(|n| n.is_null(row)).unwrap_or(false)
}

impl KeyColumnView<'_> {
    fn max_one_element_serialize_size(&self) -> usize {
        match self {
            KeyColumnView::AllNull => NULL_FLAG_SIZE,
            KeyColumnView::Boolean(_) => NULL_FLAG_SIZE + 1,
            KeyColumnView::Fixed { values, .. } => {
                let width = match values {
                    FixedValues::I8(_) => 1,
                    FixedValues::I16(_) => 2,
                    FixedValues::I32(_) | FixedValues::F32(_) => 4,
                    FixedValues::I64(_) | FixedValues::F64(_) => 8,
                    FixedValues::I128(_) => 16,
                };
                NULL_FLAG_SIZE + width
            }
            KeyColumnView::Varlen { offsets, .. } => {
                let max_len = offsets
                    .windows(2)
                    .map(|w| (w[1] - w[0]).max(0) as usize)
                    .max()
                    .unwrap_or(0);
                NULL_FLAG_SIZE + VARLEN_LENGTH_SIZE + max_len
            }
        }
    }

    /// Append row `row` at `buf[pos..]`, returning the number of bytes written.
    fn serialize_row(&self, row: usize, buf: &mut [u8], pos: usize) -> Result<usize, Status> {
        match self {
            KeyColumnView::AllNull => {
                buf[pos] = FLAG_NULL;
                Ok(NULL_FLAG_SIZE)
            }
            KeyColumnView::Boolean(arr) => {
                if arr.is_null(row) {
                    buf[pos] = FLAG_NULL;
                    return Ok(NULL_FLAG_SIZE);
                }
                buf[pos] = FLAG_NOT_NULL;
                buf[pos + 1] = u8::from(arr.value(row));
                Ok(NULL_FLAG_SIZE + 1)
            }
            KeyColumnView::Fixed { values, nulls } => {
                if is_null_at(*nulls, row) {
                    buf[pos] = FLAG_NULL;
                    return Ok(NULL_FLAG_SIZE);
                }
                buf[pos] = FLAG_NOT_NULL;
                let dst = pos + NULL_FLAG_SIZE;
                let width = match values {
                    FixedValues::I8(v) => put(buf, dst, &v[row].to_le_bytes()),
                    FixedValues::I16(v) => put(buf, dst, &v[row].to_le_bytes()),
                    FixedValues::I32(v) => put(buf, dst, &v[row].to_le_bytes()),
                    FixedValues::I64(v) => put(buf, dst, &v[row].to_le_bytes()),
                    FixedValues::F32(v) => {
                        put(buf, dst, &canonical_f32_bits(v[row]).to_le_bytes())
                    }
                    FixedValues::F64(v) => {
                        put(buf, dst, &canonical_f64_bits(v[row]).to_le_bytes())
                    }
                    FixedValues::I128(v) => put(buf, dst, &v[row].to_le_bytes()),
                };
                Ok(NULL_FLAG_SIZE + width)
            }
            KeyColumnView::Varlen {
                offsets,
                data,
                nulls,
            } => {
                if is_null_at(*nulls, row) {
                    buf[pos] = FLAG_NULL;
                    return Ok(NULL_FLAG_SIZE);
                }
                let start = offsets[row] as usize;
                let end = offsets[row + 1] as usize;
                let value = &data[start..end];
                let len = u32::try_from(value.len()).map_err(|_| {
                    Status::not_supported(format!(
                        "set operation key value too long: {} bytes",
                        value.len()
                    ))
                })?;
                buf[pos] = FLAG_NOT_NULL;
                let mut dst = pos + NULL_FLAG_SIZE;
                dst += put(buf, dst, &len.to_le_bytes());
                put(buf, dst, value);
                Ok(NULL_FLAG_SIZE + VARLEN_LENGTH_SIZE + value.len())
            }
        }
    }
}

fn put(buf: &mut [u8], pos: usize, bytes: &[u8]) -> usize {
    buf[pos..pos + bytes.len()].copy_from_slice(bytes);
    bytes.len()
}

/// Upper bound of one serialized row for the given chunk.
pub(crate) fn max_one_row_size(views: &[KeyColumnView<'_>]) -> usize {
    views
        .iter()
        .map(KeyColumnView::max_one_element_serialize_size)
        .sum()
}

/// Upper bound of the whole chunk, used to size a single scratch allocation.
pub(crate) fn max_serialize_size(
    views: &[KeyColumnView<'_>],
    num_rows: usize,
) -> Result<usize, Status> {
    max_one_row_size(views)
        .checked_mul(num_rows)
        .ok_or_else(|| {
            Status::mem_alloc_failed(format!(
                "set operation serialize buffer overflow: rows={}",
                num_rows
            ))
        })
}

/// Pack `num_rows` rows into `buffer`, row `i` starting at `i * stride`.
///
/// `stride` must be at least `max_one_row_size(views)` and `buffer` must hold
/// `stride * num_rows` bytes. `slice_sizes` is resized to `num_rows` and receives each row's length.
pub(crate) fn serialize_columns(
    views: &[KeyColumnView<'_>],
    num_rows: usize,
    buffer: &mut [u8],
    stride: usize,
    slice_sizes: &mut Vec<u32>,
) -> Result<(), Status> {
    let needed = stride.checked_mul(num_rows).unwrap_or(usize::MAX);
    if buffer.len() < needed {
        return Err(Status::internal_error(format!(
            "set operation serialize buffer too small: buffer={} stride={} rows={}",
            buffer.len(),
            stride,
            num_rows
        )));
    }
    slice_sizes.clear();
    slice_sizes.resize(num_rows, 0);
    for view in views {
        for (row, size) in slice_sizes.iter_mut().enumerate() {
            let pos = row * stride + *size as usize;
            let written = view.serialize_row(row, buffer, pos)?;
            *size += written as u32;
        }
    }
    Ok(())
}

fn take<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], Status> {
    if cursor.len() < n {
        return Err(Status::internal_error(format!(
            "serialized set operation key truncated: need {} bytes, {} left",
            n,
            cursor.len()
        )));
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

fn take_array<const N: usize>(cursor: &mut &[u8]) -> Result<[u8; N], Status> {
    let bytes = take(cursor, N)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

/// Read the null flag; `true` means a value follows.
fn take_present(cursor: &mut &[u8]) -> Result<bool, Status> {
    match take(cursor, NULL_FLAG_SIZE)?[0] {
        FLAG_NOT_NULL => Ok(true),
        FLAG_NULL => Ok(false),
        other => Err(Status::internal_error(format!(
            "invalid null flag {} in serialized set operation key",
            other
        ))),
    }
}

fn builder_as<'a, B: ArrayBuilder>(
    builder: &'a mut dyn ArrayBuilder,
    data_type: &DataType,
) -> Result<&'a mut B, Status> {
    builder.as_any_mut().downcast_mut::<B>().ok_or_else(|| {
        Status::internal_error(format!(
            "output column builder does not match key type {:?}",
            data_type
        ))
    })
}

fn append_primitive<T, const N: usize>(
    builder: &mut dyn ArrayBuilder,
    data_type: &DataType,
    cursor: &mut &[u8],
    decode: fn([u8; N]) -> T::Native,
) -> Result<(), Status>
where
    T: ArrowPrimitiveType,
{
    let present = take_present(cursor)?;
    let value = if present {
        Some(decode(take_array::<N>(cursor)?))
    } else {
        None
    };
    builder_as::<PrimitiveBuilder<T>>(builder, data_type)?.append_option(value);
    Ok(())
}

fn take_varlen<'a>(cursor: &mut &'a [u8]) -> Result<Option<&'a [u8]>, Status> {
    if !take_present(cursor)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(take_array::<VARLEN_LENGTH_SIZE>(cursor)?) as usize;
    Ok(Some(take(cursor, len)?))
}

fn append_one(
    data_type: &DataType,
    builder: &mut dyn ArrayBuilder,
    cursor: &mut &[u8],
) -> Result<(), Status> {
    match data_type {
        DataType::Null => {
            if take_present(cursor)? {
                return Err(Status::internal_error(
                    "non-null value serialized for NULL key column",
                ));
            }
            builder_as::<NullBuilder>(builder, data_type)?.append_null();
            Ok(())
        }
        DataType::Boolean => {
            let value = if take_present(cursor)? {
                Some(take_array::<1>(cursor)?[0] != 0)
            } else {
                None
            };
            builder_as::<BooleanBuilder>(builder, data_type)?.append_option(value);
            Ok(())
        }
        DataType::Int8 => append_primitive::<Int8Type, 1>(builder, data_type, cursor, i8::from_le_bytes),
        DataType::Int16 => {
            append_primitive::<Int16Type, 2>(builder, data_type, cursor, i16::from_le_bytes)
        }
        DataType::Int32 => {
            append_primitive::<Int32Type, 4>(builder, data_type, cursor, i32::from_le_bytes)
        }
        DataType::Date32 => {
            append_primitive::<Date32Type, 4>(builder, data_type, cursor, i32::from_le_bytes)
        }
        DataType::Int64 => {
            append_primitive::<Int64Type, 8>(builder, data_type, cursor, i64::from_le_bytes)
        }
        DataType::Float32 => append_primitive::<Float32Type, 4>(builder, data_type, cursor, |b| {
            f32::from_bits(u32::from_le_bytes(b))
        }),
        DataType::Float64 => append_primitive::<Float64Type, 8>(builder, data_type, cursor, |b| {
            f64::from_bits(u64::from_le_bytes(b))
        }),
        DataType::Timestamp(TimeUnit::Second, _) => append_primitive::<TimestampSecondType, 8>(
            builder,
            data_type,
            cursor,
            i64::from_le_bytes,
        ),
        DataType::Timestamp(TimeUnit::Millisecond, _) => {
            append_primitive::<TimestampMillisecondType, 8>(
                builder,
                data_type,
                cursor,
                i64::from_le_bytes,
            )
        }
        DataType::Timestamp(TimeUnit::Microsecond, _) => {
            append_primitive::<TimestampMicrosecondType, 8>(
                builder,
                data_type,
                cursor,
                i64::from_le_bytes,
            )
        }
        DataType::Timestamp(TimeUnit::Nanosecond, _) => {
            append_primitive::<TimestampNanosecondType, 8>(
                builder,
                data_type,
                cursor,
                i64::from_le_bytes,
            )
        }
        DataType::Decimal128(_, _) => append_primitive::<Decimal128Type, 16>(
            builder,
            data_type,
            cursor,
            i128::from_le_bytes,
        ),
        DataType::Utf8 => {
            let value = match take_varlen(cursor)? {
                Some(bytes) => Some(std::str::from_utf8(bytes).map_err(|e| {
                    Status::internal_error(format!("serialized utf8 key is invalid: {}", e))
                })?),
                None => None,
            };
            builder_as::<StringBuilder>(builder, data_type)?.append_option(value);
            Ok(())
        }
        DataType::Binary => {
            let value = take_varlen(cursor)?;
            builder_as::<BinaryBuilder>(builder, data_type)?.append_option(value);
            Ok(())
        }
        other => Err(Status::not_supported(format!(
            "set operation key type {:?} cannot be deserialized",
            other
        ))),
    }
}

/// Builders matching `key_types`, in declared order.
pub(crate) fn new_key_builders(
    key_types: &[DataType],
    capacity: usize,
) -> Vec<Box<dyn ArrayBuilder>> {
    key_types
        .iter()
        .map(|t| make_builder(t, capacity))
        .collect()
}

/// Inverse of `serialize_columns`: append `row_count` keys to `builders`, one value or null each.
pub(crate) fn deserialize_and_append(
    keys: &[&[u8]],
    key_types: &[DataType],
    builders: &mut [Box<dyn ArrayBuilder>],
    row_count: usize,
) -> Result<(), Status> {
    if keys.len() != row_count {
        return Err(Status::internal_error(format!(
            "set operation decode row count mismatch: keys={} row_count={}",
            keys.len(),
            row_count
        )));
    }
    if builders.len() != key_types.len() {
        return Err(Status::internal_error(format!(
            "set operation decode column count mismatch: builders={} key_types={}",
            builders.len(),
            key_types.len()
        )));
    }
    let mut cursors: Vec<&[u8]> = keys.to_vec();
    for (data_type, builder) in key_types.iter().zip(builders.iter_mut()) {
        for cursor in cursors.iter_mut() {
            append_one(data_type, builder.as_mut(), cursor)?;
        }
    }
    if let Some(left) = cursors.iter().find(|c| !c.is_empty()) {
        return Err(Status::internal_error(format!(
            "serialized set operation key has {} trailing bytes",
            left.len()
        )));
    }
    Ok(())
}

/// Decode keys into freshly built arrays, one per key type.
pub(crate) fn deserialize_to_arrays(
    keys: &[&[u8]],
    key_types: &[DataType],
) -> Result<Vec<ArrayRef>, Status> {
    let mut builders = new_key_builders(key_types, keys.len());
    deserialize_and_append(keys, key_types, &mut builders, keys.len())?;
    Ok(builders.iter_mut().map(|b| b.finish()).collect())
}
