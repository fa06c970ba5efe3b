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
use arrow::array::{Array, ArrayRef};
use arrow::compute::{CastOptions, can_cast_types, cast_with_options};
use arrow::datatypes::DataType;

/// Cast `array` to `target_type`; values that do not fit become NULL instead of failing.
pub(super) fn cast_to(array: &ArrayRef, target_type: &DataType) -> Result<ArrayRef, String> {
    if array.data_type() == target_type {
        return Ok(array.clone());
    }
    if !can_cast_types(array.data_type(), target_type) {
        return Err(format!(
            "unsupported cast from {:?} to {:?}",
            array.data_type(),
            target_type
        ));
    }
    let options = CastOptions {
        safe: true,
        ..Default::default()
    };
    cast_with_options(array, target_type, &options).map_err(|e| {
        format!(
            "cast from {:?} to {:?} failed: {}",
            array.data_type(),
            target_type,
            e
        )
    })
}
