// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Identifiers handed over by the trace collector.

use std::fmt;

macro_rules! hash128 {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
        pub struct $name {
            hi: u64,
            lo: u64,
        }

        impl $name {
            pub const fn new(hi: u64, lo: u64) -> Self {
                Self { hi, lo }
            }

            pub const fn hi(&self) -> u64 {
                self.hi
            }

            pub const fn lo(&self) -> u64 {
                self.lo
            }
        }

        /// Renders as 32 lowercase hex digits, high half first.
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:016x}{:016x}", self.hi, self.lo)
            }
        }

        impl From<u128> for $name {
            fn from(value: u128) -> Self {
                Self::new((value >> 64) as u64, value as u64)
            }
        }
    };
}

hash128!(
    /// Content hash of a call stack.
    TraceHash
);

hash128!(
    /// Content hash identifying an executable or module.
    FileId
);

/// Either a virtual address or an interpreter line number, depending on
/// the frame type.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct AddressOrLineno(pub u64);

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SourceLineno(pub u64);

/// One instruction location. Always re-derivable from its parts.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct FrameId {
    pub file_id: FileId,
    pub address_or_line: AddressOrLineno,
}

impl FrameId {
    pub const fn new(file_id: FileId, address_or_line: AddressOrLineno) -> Self {
        Self {
            file_id,
            address_or_line,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FrameType {
    Native,
    Kernel,
    /// Artificial marker for an aborted unwind.
    Abort,
    Python,
    Php,
    PhpJit,
    Perl,
    Ruby,
    HotSpot,
    V8,
    DotNet,
    Unknown(u8),
}

impl FrameType {
    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Native => "native",
            FrameType::Kernel => "kernel",
            FrameType::Abort => "abort-marker",
            FrameType::Python => "python",
            FrameType::Php => "php",
            FrameType::PhpJit => "phpjit",
            FrameType::Perl => "perl",
            FrameType::Ruby => "ruby",
            FrameType::HotSpot => "jvm",
            FrameType::V8 => "v8js",
            FrameType::DotNet => "dotnet",
            FrameType::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A captured call stack. `files`, `linenos` and `frame_types` are parallel
/// arrays, one entry per frame, leaf first.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Trace {
    pub hash: TraceHash,
    pub files: Vec<FileId>,
    pub linenos: Vec<AddressOrLineno>,
    pub frame_types: Vec<FrameType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rendering_is_zero_padded() {
        assert_eq!(
            FileId::new(0x1, 0xabc).to_string(),
            "00000000000000010000000000000abc"
        );
        assert_eq!(TraceHash::default().to_string(), "0".repeat(32));
    }

    #[test]
    fn from_u128_splits_halves() {
        let id = TraceHash::from(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210_u128);
        assert_eq!(id.hi(), 0x0123_4567_89ab_cdef);
        assert_eq!(id.lo(), 0xfedc_ba98_7654_3210);
    }

    #[test]
    fn frame_id_is_rederivable() {
        let file = FileId::new(7, 9);
        assert_eq!(
            FrameId::new(file, AddressOrLineno(0x10)),
            FrameId::new(file, AddressOrLineno(0x10))
        );
        assert_ne!(
            FrameId::new(file, AddressOrLineno(0x10)),
            FrameId::new(file, AddressOrLineno(0x11))
        );
    }

    #[test]
    fn frame_type_names() {
        assert_eq!(FrameType::HotSpot.to_string(), "jvm");
        assert_eq!(FrameType::Abort.name(), "abort-marker");
        assert_eq!(FrameType::Unknown(42).name(), "unknown");
    }
}
