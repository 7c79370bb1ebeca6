/// Errors that can occur when creating validated identifier types.
#[derive(Debug, thiserror::Error)]
pub enum UidError {
    /// The input was empty or contained only whitespace
    #[error("UID cannot be empty")]
    Empty,
    /// The input contained a character that is unsafe as a path component
    #[error("UID contains forbidden character {0:?}")]
    ForbiddenCharacter(char),
    /// The input was a relative path traversal component
    #[error("UID cannot be a path traversal component")]
    Traversal,
}

/// A DICOM unique identifier that is safe to use as a path component.
///
/// Study, series and SOP instance UIDs address files directly under the
/// storage root, so the wrapped string must never be able to escape it.
/// Construction trims surrounding whitespace and trailing NUL padding (UID
/// values in DICOM streams are padded to even length with `\0`), then
/// rejects empty results, path separators and dot-only components.
///
/// Validation is deliberately looser than the DICOM UID grammar
/// (digits and dots): real archives contain nonconforming UIDs, and the
/// storage layout only requires path safety.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uid(String);

impl Uid {
    /// Creates a new `Uid` from the given input.
    ///
    /// # Errors
    ///
    /// Returns `UidError` if the trimmed input is empty, contains a path
    /// separator or control character, or is `.`/`..`.
    pub fn new(input: impl AsRef<str>) -> Result<Self, UidError> {
        let trimmed = input
            .as_ref()
            .trim()
            .trim_end_matches('\0')
            .trim_end_matches(' ');
        if trimmed.is_empty() {
            return Err(UidError::Empty);
        }
        if trimmed.chars().all(|c| c == '.') {
            return Err(UidError::Traversal);
        }
        if let Some(bad) = trimmed
            .chars()
            .find(|c| *c == '/' || *c == '\\' || c.is_control())
        {
            return Err(UidError::ForbiddenCharacter(bad));
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Uid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Uid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Uid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Uid::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_standard_uids() {
        let uid = Uid::new("1.2.840.10008.5.1.4.1.1.4").unwrap();
        assert_eq!(uid.as_str(), "1.2.840.10008.5.1.4.1.1.4");
    }

    #[test]
    fn trims_padding() {
        let uid = Uid::new("1.2.3\0").unwrap();
        assert_eq!(uid.as_str(), "1.2.3");
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(Uid::new(""), Err(UidError::Empty)));
        assert!(matches!(Uid::new("   "), Err(UidError::Empty)));
    }

    #[test]
    fn rejects_traversal() {
        assert!(matches!(Uid::new(".."), Err(UidError::Traversal)));
        assert!(matches!(Uid::new("."), Err(UidError::Traversal)));
        assert!(matches!(
            Uid::new("a/../b"),
            Err(UidError::ForbiddenCharacter('/'))
        ));
        assert!(matches!(
            Uid::new("a\\b"),
            Err(UidError::ForbiddenCharacter('\\'))
        ));
    }

    #[test]
    fn accepts_nonconforming_but_safe_uids() {
        assert!(Uid::new("study-2024_A").is_ok());
    }
}
