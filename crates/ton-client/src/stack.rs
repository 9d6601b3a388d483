//! Get-method stack values and a sequential reader
//!
//! Endpoints decode TVM stacks into [`StackValue`]s. Hashmap cells are
//! handed over already decoded as [`StackValue::Dict`] keyed by their
//! unsigned integer key, with each entry's fields laid out as a tuple.

use std::collections::{BTreeMap, VecDeque};

use hipo_core::{Address, NodeError};

/// A decoded TVM stack entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackValue {
    Null,
    Int(i128),
    Address(Address),
    Cell(Vec<u8>),
    Tuple(Vec<StackValue>),
    Dict(BTreeMap<u64, StackValue>),
}

impl StackValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Address(_) => "address",
            Self::Cell(_) => "cell",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
        }
    }
}

/// Reads a get-method result front to back, like a TVM tuple reader
#[derive(Debug, Clone)]
pub struct StackReader {
    method: String,
    items: VecDeque<StackValue>,
}

type Result<T> = std::result::Result<T, NodeError>;

impl StackReader {
    pub fn new(method: impl Into<String>, items: Vec<StackValue>) -> Self {
        Self {
            method: method.into(),
            items: items.into(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    fn next(&mut self, expected: &str) -> Result<StackValue> {
        self.items.pop_front().ok_or_else(|| {
            NodeError::ParseError(format!(
                "{}: stack exhausted, expected {}",
                self.method, expected
            ))
        })
    }

    fn mismatch(&self, expected: &str, got: &StackValue) -> NodeError {
        NodeError::ParseError(format!(
            "{}: expected {}, got {}",
            self.method,
            expected,
            got.kind()
        ))
    }

    pub fn read_int(&mut self) -> Result<i128> {
        match self.next("int")? {
            StackValue::Int(v) => Ok(v),
            other => Err(self.mismatch("int", &other)),
        }
    }

    /// Read a non-negative integer (coins, counters)
    pub fn read_u128(&mut self) -> Result<u128> {
        let v = self.read_int()?;
        u128::try_from(v)
            .map_err(|_| NodeError::ParseError(format!("{}: negative amount {}", self.method, v)))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let v = self.read_int()?;
        u64::try_from(v)
            .map_err(|_| NodeError::ParseError(format!("{}: {} out of u64 range", self.method, v)))
    }

    /// TVM booleans are integers: 0 is false, anything else (usually -1) is true
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_int()? != 0)
    }

    pub fn read_address(&mut self) -> Result<Address> {
        match self.next("address")? {
            StackValue::Address(a) => Ok(a),
            other => Err(self.mismatch("address", &other)),
        }
    }

    pub fn read_address_opt(&mut self) -> Result<Option<Address>> {
        match self.next("address")? {
            StackValue::Address(a) => Ok(Some(a)),
            StackValue::Null => Ok(None),
            other => Err(self.mismatch("address or null", &other)),
        }
    }

    /// Read an optional dictionary; a null entry is an empty dictionary
    pub fn read_dict_opt(&mut self) -> Result<BTreeMap<u64, StackValue>> {
        match self.next("dict")? {
            StackValue::Dict(d) => Ok(d),
            StackValue::Null => Ok(BTreeMap::new()),
            other => Err(self.mismatch("dict or null", &other)),
        }
    }

    pub fn read_tuple(&mut self) -> Result<StackReader> {
        match self.next("tuple")? {
            StackValue::Tuple(items) => Ok(StackReader::new(self.method.clone(), items)),
            other => Err(self.mismatch("tuple", &other)),
        }
    }

    /// Skip an entry whose content is not mirrored (code cells, governance refs)
    pub fn skip(&mut self) -> Result<()> {
        self.next("any").map(|_| ())
    }
}
