//! Word: a value packed into 64 bits.
//!
//! Every bit pattern is read as an IEEE-754 double unless its top 16 bits
//! (the marker) are at or above [`NUMBER_LIMIT`]. No double produced by
//! arithmetic lands there except NaNs with unusual payloads, so every NaN
//! is canonicalised before it is packed.
//!
//! ```text
//! Number:   marker < 0xFFF9                 any double, NaN canonical
//! Boolean:  0xFFF9_0000_0000_0000           false
//!           0xFFF9_0000_0000_0001           true
//! Tagged:   0xFFFA_TPPP_PPPP_PPPP           T = 4-bit tag code
//!                                           P = 44-bit handle payload
//! ```
//!
//! The marker values are persisted by compiled code and must not change.
//! All bit twiddling of the engine lives here; the rest of the crate works
//! on [`Value`] and converts at this boundary.
use core::fmt;

use crate::{HandleTable, Tag, Value, ValueError};

/// Markers strictly below this are numbers.
pub const NUMBER_LIMIT: u16 = 0xFFF9;
/// Marker of the two boolean patterns.
pub const BOOLEAN_MARKER: u16 = 0xFFF9;
/// Markers at or above this are tagged references.
pub const TAGGED_BASE: u16 = 0xFFFA;

pub const MARKER_SHIFT: u32 = 48;
pub const FALSE_BITS: u64 = (BOOLEAN_MARKER as u64) << MARKER_SHIFT;
pub const TRUE_BITS: u64 = FALSE_BITS | 1;

/// The one NaN a packed number may hold (positive quiet NaN).
pub const CANONICAL_NAN: u64 = 0x7FF8_0000_0000_0000;

const TAGGED_BITS: u64 = (TAGGED_BASE as u64) << MARKER_SHIFT;
const TAG_SHIFT: u32 = 44;
const TAG_MASK: u64 = 0xF << TAG_SHIFT;
const PAYLOAD_MASK: u64 = (1 << TAG_SHIFT) - 1;

/// Payload of the `null` native handle.
pub const NULL_PAYLOAD: u64 = PAYLOAD_MASK;

/// Would packing `n` as-is produce a word that does not read as a number?
#[inline(always)]
pub fn is_impure_nan(n: f64) -> bool {
    (n.to_bits() >> MARKER_SHIFT) as u16 >= NUMBER_LIMIT
}

/// Map every NaN onto [`CANONICAL_NAN`]; other doubles pass unchanged.
#[inline]
pub fn canonicalize_nan(n: f64) -> f64 {
    if !n.is_nan() {
        return n;
    }
    if n.to_bits() != CANONICAL_NAN {
        log::trace!("canonicalizing NaN {:#018x}", n.to_bits());
    }
    f64::from_bits(CANONICAL_NAN)
}

#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Word(u64);

impl Word {
    pub const FALSE: Word = Word(FALSE_BITS);
    pub const TRUE: Word = Word(TRUE_BITS);
    pub const UNDEFINED: Word = Word::tagged(Tag::Undefined, 0);
    pub const NULL: Word = Word::tagged(Tag::NativeHandle, NULL_PAYLOAD);

    #[inline(always)]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Reinterpret raw bits, e.g. read back from compiled code. Decoding
    /// validates; the predicates below never fail.
    #[inline(always)]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[inline]
    pub fn from_number(n: f64) -> Self {
        Self(canonicalize_nan(n).to_bits())
    }

    #[inline(always)]
    pub const fn from_bool(b: bool) -> Self {
        if b { Self::TRUE } else { Self::FALSE }
    }

    #[inline(always)]
    const fn tagged(tag: Tag, payload: u64) -> Self {
        debug_assert!(payload <= PAYLOAD_MASK);
        Self(TAGGED_BITS | ((tag as u64) << TAG_SHIFT) | payload)
    }

    #[inline(always)]
    pub const fn marker(self) -> u16 {
        (self.0 >> MARKER_SHIFT) as u16
    }

    #[inline(always)]
    pub const fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }

    // ── Predicates ─────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_number(self) -> bool {
        self.marker() < NUMBER_LIMIT
    }

    #[inline(always)]
    pub const fn is_boolean(self) -> bool {
        self.0 == TRUE_BITS || self.0 == FALSE_BITS
    }

    #[inline(always)]
    pub const fn is_tagged(self) -> bool {
        self.marker() >= TAGGED_BASE
    }

    #[inline(always)]
    const fn tag_code(self) -> u8 {
        ((self.0 & TAG_MASK) >> TAG_SHIFT) as u8
    }

    #[inline(always)]
    const fn has_tag(self, tag: Tag) -> bool {
        self.is_tagged() && self.tag_code() == tag as u8
    }

    #[inline(always)]
    pub const fn is_undefined(self) -> bool {
        self.has_tag(Tag::Undefined)
    }

    #[inline(always)]
    pub const fn is_string(self) -> bool {
        self.has_tag(Tag::String) || self.has_tag(Tag::RopeString)
    }

    #[inline(always)]
    pub const fn is_native_handle(self) -> bool {
        self.has_tag(Tag::NativeHandle)
    }

    #[inline(always)]
    pub const fn is_null(self) -> bool {
        self.0 == Self::NULL.0
    }

    #[inline(always)]
    pub const fn is_object(self) -> bool {
        let code = self.tag_code();
        self.is_tagged() && code >= Tag::Object as u8 && code <= Tag::Function as u8
    }

    #[inline(always)]
    pub const fn is_function(self) -> bool {
        self.has_tag(Tag::Function)
    }

    /// Decode the kind. Fails only for corrupted words.
    pub fn tag(self) -> Result<Tag, ValueError> {
        if self.is_number() {
            return Ok(Tag::Number);
        }
        if self.is_boolean() {
            return Ok(Tag::Boolean);
        }
        if !self.is_tagged() {
            return Err(ValueError::MalformedWord(self.0));
        }
        match Tag::try_from(self.tag_code())? {
            tag if tag.is_reference() => Ok(tag),
            // numbers and booleans are never tagged
            _ => Err(ValueError::InvalidTag(self.tag_code())),
        }
    }

    // ── Packing ────────────────────────────────────────────────────

    /// Pack a value, rooting any reference payload in `handles`.
    pub fn pack(value: &Value, handles: &mut HandleTable) -> Result<Self, ValueError> {
        let word = match value {
            Value::Number(n) => Self::from_number(*n),
            Value::Boolean(b) => Self::from_bool(*b),
            Value::Undefined => Self::UNDEFINED,
            Value::Native(handle) if handle.is_null() => Self::NULL,
            other => {
                let index = handles.root(other.clone())?;
                Self::tagged(other.tag(), u64::from(index))
            }
        };
        Ok(word)
    }

    /// Decode a word packed against `handles`.
    pub fn unpack(self, handles: &HandleTable) -> Result<Value, ValueError> {
        let tag = self.tag()?;
        let value = match tag {
            Tag::Number => Value::Number(f64::from_bits(self.0)),
            Tag::Boolean => Value::Boolean(self.0 == TRUE_BITS),
            Tag::Undefined => Value::Undefined,
            Tag::NativeHandle if self.payload() == NULL_PAYLOAD => Value::NULL,
            _ => {
                let index = u32::try_from(self.payload())
                    .map_err(|_| ValueError::MalformedWord(self.0))?;
                let rooted = handles.get(index)?;
                if rooted.tag() != tag {
                    return Err(ValueError::TypeMismatch {
                        expected: tag,
                        found: rooted.tag(),
                    });
                }
                rooted.clone()
            }
        };
        Ok(value)
    }
}

impl From<f64> for Word {
    fn from(n: f64) -> Self {
        Self::from_number(n)
    }
}

impl From<bool> for Word {
    fn from(b: bool) -> Self {
        Self::from_bool(b)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Ok(Tag::Number) => {
                write!(f, "Number({:?})", f64::from_bits(self.0))
            }
            Ok(Tag::Boolean) => write!(f, "Boolean({})", self.0 == TRUE_BITS),
            Ok(_) if self.is_null() => f.write_str("Null"),
            Ok(tag) => write!(f, "Tagged({tag}, {})", self.payload()),
            Err(_) => write!(f, "Invalid(0x{:016x})", self.0),
        }
    }
}
