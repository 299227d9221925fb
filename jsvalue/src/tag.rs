use core::fmt;

use crate::ValueError;

/// Kind of a [`Value`](crate::Value).
///
/// Codes are stable: compiled code and packed words compare them
/// numerically, so a new kind always gets a fresh code and existing codes
/// never move. Object-like kinds sort last and `Function` sorts above
/// `Object`, which makes "is callable" a suffix of "is object".
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    Number = 0,
    Boolean = 1,
    String = 2,
    RopeString = 3,
    Undefined = 4,
    NativeHandle = 5,
    Object = 6,
    Function = 7,
}

impl Tag {
    /// Every tag, ordered by code.
    pub const ALL: [Tag; 8] = [
        Tag::Number,
        Tag::Boolean,
        Tag::String,
        Tag::RopeString,
        Tag::Undefined,
        Tag::NativeHandle,
        Tag::Object,
        Tag::Function,
    ];

    #[inline(always)]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Name of the payload field a generic reader accesses for this tag.
    pub const fn field_name(self) -> &'static str {
        match self {
            Tag::Number => "number",
            Tag::Boolean => "boolean",
            Tag::String => "string",
            Tag::RopeString => "rope",
            Tag::Undefined => "undefined",
            Tag::NativeHandle => "native",
            Tag::Object => "object",
            Tag::Function => "function",
        }
    }

    /// Whether values of this kind live behind a reference payload rather
    /// than directly in the number/boolean bit patterns.
    #[inline(always)]
    pub const fn is_reference(self) -> bool {
        self.code() >= Tag::String.code()
    }

    #[inline(always)]
    pub const fn is_object(self) -> bool {
        self.code() >= Tag::Object.code()
    }

    #[inline(always)]
    pub const fn is_function(self) -> bool {
        self.code() >= Tag::Function.code()
    }
}

impl TryFrom<u8> for Tag {
    type Error = ValueError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Tag::Number),
            1 => Ok(Tag::Boolean),
            2 => Ok(Tag::String),
            3 => Ok(Tag::RopeString),
            4 => Ok(Tag::Undefined),
            5 => Ok(Tag::NativeHandle),
            6 => Ok(Tag::Object),
            7 => Ok(Tag::Function),
            other => Err(ValueError::InvalidTag(other)),
        }
    }
}

impl From<Tag> for u8 {
    fn from(tag: Tag) -> Self {
        tag.code()
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_injective_and_round_trip() {
        for (i, tag) in Tag::ALL.iter().enumerate() {
            assert_eq!(tag.code() as usize, i, "codes are dense and ordered");
            assert_eq!(Tag::try_from(tag.code()), Ok(*tag));
        }
    }

    #[test]
    fn unknown_code_is_invalid_tag() {
        assert_eq!(Tag::try_from(8), Err(ValueError::InvalidTag(8)));
        assert_eq!(Tag::try_from(0xFF), Err(ValueError::InvalidTag(0xFF)));
    }

    #[test]
    fn function_sorts_above_object() {
        assert!(Tag::Function > Tag::Object);
        for tag in Tag::ALL {
            if tag.is_function() {
                assert!(tag.is_object(), "{tag} is callable but not object");
            }
        }
        assert!(!Tag::NativeHandle.is_object());
        assert!(!Tag::Undefined.is_object());
    }

    #[test]
    fn field_names_are_distinct() {
        let mut names: Vec<_> = Tag::ALL.iter().map(|t| t.field_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Tag::ALL.len());
    }
}
