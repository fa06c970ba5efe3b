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
//! Key expressions evaluated against a chunk, one column per expression.

mod cast;
mod literal;

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, BooleanArray, new_null_array};
use arrow::datatypes::DataType;

use crate::common::ids::SlotId;
use crate::exec::chunk::Chunk;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ExprId(pub usize);

#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Null,
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Utf8(String),
    Binary(Vec<u8>),
    Date32(i32),
}

#[derive(Clone, Debug)]
pub enum ExprNode {
    Literal(LiteralValue),
    SlotId(SlotId),
    Cast(ExprId),
    IsNull(ExprId),
}

#[derive(Clone, Debug, Default)]
pub struct ExprArena {
    nodes: Vec<ExprNode>,
    types: Vec<DataType>,
}

impl ExprArena {
    pub fn push(&mut self, node: ExprNode) -> ExprId {
        self.push_typed(node, DataType::Null)
    }

    pub fn push_typed(&mut self, node: ExprNode, data_type: DataType) -> ExprId {
        let id = ExprId(self.nodes.len());
        self.nodes.push(node);
        self.types.push(data_type);
        id
    }

    pub fn node(&self, id: ExprId) -> Option<&ExprNode> {
        self.nodes.get(id.0)
    }

    pub fn data_type(&self, id: ExprId) -> Option<&DataType> {
        self.types.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn eval(&self, id: ExprId, chunk: &Chunk) -> Result<ArrayRef, String> {
        let node = self
            .nodes
            .get(id.0)
            .ok_or_else(|| format!("invalid ExprId {}", id.0))?;
        let declared = self.data_type(id).cloned().unwrap_or(DataType::Null);
        match node {
            ExprNode::Literal(v) => {
                if matches!(v, LiteralValue::Null) && !matches!(declared, DataType::Null) {
                    // A typed NULL keeps the declared type so it can feed a typed key column.
                    return Ok(new_null_array(&declared, chunk.len()));
                }
                let out = literal::eval(v, chunk.len())?;
                if !matches!(declared, DataType::Null) && out.data_type() != &declared {
                    return cast::cast_to(&out, &declared);
                }
                Ok(out)
            }
            ExprNode::SlotId(slot_id) => {
                let column = chunk.column_by_slot_id(*slot_id)?;
                if !matches!(declared, DataType::Null) && column.data_type() != &declared {
                    return Err(format!(
                        "slot {} has type {:?}, expression declares {:?}",
                        slot_id,
                        column.data_type(),
                        declared
                    ));
                }
                Ok(column)
            }
            ExprNode::Cast(child) => {
                let input = self.eval(*child, chunk)?;
                if matches!(declared, DataType::Null) {
                    return Err(format!("cast expression {} has no target type", id.0));
                }
                cast::cast_to(&input, &declared)
            }
            ExprNode::IsNull(child) => {
                let input = self.eval(*child, chunk)?;
                let values = (0..input.len())
                    .map(|row| Some(input.is_null(row)))
                    .collect::<BooleanArray>();
                Ok(Arc::new(values))
            }
        }
    }
}
