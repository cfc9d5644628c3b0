//! One-line summaries
//!
//! Strings render as a quoted preview, enum wrappers as `Name (value)`.

use crate::access::OpaqueAccessor;
use crate::LensError;

/// Summary of a string with no elements
pub const EMPTY_SUMMARY: &str = "<empty>";

/// Summary of an unreadable string
pub const ERROR_SUMMARY: &str = "<error>";

const ENUM_VALUE: &str = "m_Value";
const ENUM_SUFFIX: &str = "::Enum";

/// Render a string summary from its count and content preview
pub fn render_text(count: usize, content: Result<Vec<u8>, LensError>) -> String {
    if count == 0 {
        return EMPTY_SUMMARY.to_string();
    }
    match content {
        Ok(bytes) => format!("\"{}\"", decode_preview(&bytes)),
        Err(err) => {
            tracing::debug!(error = %err, "string content unreadable");
            ERROR_SUMMARY.to_string()
        }
    }
}

/// Decode a byte preview as UTF-8
///
/// A trailing NUL is dropped. A multi-byte sequence cut off at the end of the
/// preview is dropped; any other invalid byte is replaced.
fn decode_preview(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(&[0]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_owned(),
        Err(err) if err.error_len().is_none() => {
            String::from_utf8_lossy(&bytes[..err.valid_up_to()]).into_owned()
        }
        Err(_) => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Summary of an enum wrapper: `Name (value)`, `? (value)` or `?`
///
/// The wrapper's first template argument `T` names the enum type `T::Enum`.
pub fn enum_summary<A: OpaqueAccessor>(accessor: &A, value: &A::Handle) -> String {
    let wrapper = accessor.value_type(value);
    let Some(argument) = accessor.template_argument(&wrapper, 0) else {
        tracing::debug!("enum wrapper without template argument");
        return "?".to_string();
    };
    let Ok(raw) = accessor.field(value, ENUM_VALUE) else {
        return "?".to_string();
    };
    let raw = accessor.unsigned_value(&raw, 0);

    let enum_name = format!("{}{}", accessor.type_name(&argument), ENUM_SUFFIX);
    let members = accessor
        .find_type(&enum_name)
        .map(|ty| accessor.enum_members(&ty))
        .unwrap_or_default();

    match members.iter().find(|(_, member)| *member == raw) {
        Some((name, member)) => format!("{name} ({member})"),
        None => format!("? ({raw})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AccessError;

    #[test]
    fn test_render_text_cases() {
        assert_eq!(render_text(0, Ok(Vec::new())), "<empty>");
        assert_eq!(render_text(5, Ok(b"hello".to_vec())), "\"hello\"");
        assert_eq!(
            render_text(3, Err(AccessError::host("gone").into())),
            "<error>"
        );
    }

    #[test]
    fn test_decode_preview_trailing_nul() {
        assert_eq!(decode_preview(b"abc\0"), "abc");
    }

    #[test]
    fn test_decode_preview_cut_multibyte() {
        // "é" is 0xC3 0xA9; the preview ends after the first byte
        assert_eq!(decode_preview(&[b'a', 0xC3]), "a");
        assert_eq!(decode_preview(&[b'a', 0xFF, b'b']), "a\u{FFFD}b");
    }
}
