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

/// Seed used by StarRocks for serialized-slice hash sets.
pub(crate) const CRC_HASH_SEED: u32 = 0x811C_9DC5;

fn phmap_mix_8(a: u64) -> u64 {
    let k: u64 = 0xde5fb9d2630458e9;
    let prod = (a as u128) * (k as u128);
    let l = prod as u64;
    let h = (prod >> 64) as u64;
    h.wrapping_add(l)
}

/// CRC32C over the whole slice, then mixed to 64 bits so the high bits used by the
/// table's control bytes are well distributed.
pub(crate) fn crc_hash_64(data: &[u8], seed: u32) -> u64 {
    let crc = crc32c::crc32c_append(seed, data);
    let len_salt = (data.len() as u64).rotate_left(32);
    phmap_mix_8(((crc as u64) | ((seed as u64) << 32)) ^ len_salt)
}

pub(crate) fn slice_hash(data: &[u8]) -> u64 {
    crc_hash_64(data, CRC_HASH_SEED)
}

/// All NaNs share one bit pattern and `-0.0` maps to `+0.0`, matching SQL equality.
pub(crate) fn canonical_f64_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

pub(crate) fn canonical_f32_bits(value: f32) -> u32 {
    if value.is_nan() {
        f32::NAN.to_bits()
    } else if value == 0.0 {
        0.0f32.to_bits()
    } else {
        value.to_bits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_hash_is_deterministic_and_length_sensitive() {
        assert_eq!(slice_hash(b"abc"), slice_hash(b"abc"));
        assert_ne!(slice_hash(b"abc"), slice_hash(b"abd"));
        assert_ne!(slice_hash(b""), slice_hash(b"\0"));
    }

    #[test]
    fn canonical_float_bits_merge_equal_values() {
        assert_eq!(canonical_f64_bits(-0.0), canonical_f64_bits(0.0));
        assert_eq!(
            canonical_f64_bits(f64::from_bits(0x7ff8_0000_0000_0001)),
            canonical_f64_bits(f64::NAN)
        );
        assert_eq!(canonical_f32_bits(-0.0), canonical_f32_bits(0.0));
        assert_ne!(canonical_f32_bits(1.0), canonical_f32_bits(-1.0));
    }
}
