// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use libdd_profiling_reporter_protobuf::profiles;
use std::hash::BuildHasherDefault;

pub type FxIndexSet<K> = indexmap::IndexSet<K, BuildHasherDefault<rustc_hash::FxHasher>>;

/// Offset of a string in the profile's string table.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct StringIndex(usize);

impl StringIndex {
    pub fn to_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn to_u32(self) -> u32 {
        self.0 as u32
    }
}

/// Append-on-miss string dedup. The empty string always sits at index 0.
pub struct StringTable {
    strings: FxIndexSet<String>,
}

impl Default for StringTable {
    fn default() -> Self {
        Self::new()
    }
}

impl StringTable {
    pub fn new() -> Self {
        let mut strings = FxIndexSet::default();
        strings.insert(String::new());
        Self { strings }
    }

    pub fn intern(&mut self, s: &str) -> StringIndex {
        match self.strings.get_index_of(s) {
            Some(offset) => StringIndex(offset),
            None => StringIndex(self.strings.insert_full(s.to_owned()).0),
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.strings.into_iter().collect()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
struct FunctionKey {
    name: StringIndex,
    filename: StringIndex,
}

/// Append-on-miss function dedup keyed by (name, file name).
#[derive(Default)]
pub struct FunctionTable {
    functions: FxIndexSet<FunctionKey>,
}

impl FunctionTable {
    /// Returns the 1-based reference used by `Line::function_index`.
    pub fn dedup(&mut self, strings: &mut StringTable, name: &str, filename: &str) -> u64 {
        let key = FunctionKey {
            name: strings.intern(name),
            filename: strings.intern(filename),
        };
        let (offset, _) = self.functions.insert_full(key);
        offset as u64 + 1
    }

    pub fn into_pprof(self) -> Vec<profiles::Function> {
        self.functions
            .into_iter()
            .enumerate()
            .map(|(offset, key)| profiles::Function {
                id: offset as u64 + 1,
                name: key.name.to_i64(),
                filename: key.filename.to_i64(),
                ..Default::default()
            })
            .collect()
    }
}
