// Brace matching over raw bundle text.
//
// Both scans count depth byte by byte. Braces are ASCII, so every offset
// returned here is a valid `str` slice boundary.

use super::ExtractError;

/// Given text starting with `{`, return the prefix ending at the matching `}`.
pub fn matching_braces(s: &str) -> Result<&str, ExtractError> {
    if !s.starts_with('{') {
        return Err(ExtractError::UnbalancedBraces {
            message: "object text does not start with '{'",
        });
    }

    let mut depth = 0_usize;
    for (i, b) in s.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&s[..=i]);
                }
            }
            _ => {}
        }
    }

    Err(ExtractError::UnbalancedBraces {
        message: "no closing brace for the configuration object",
    })
}

/// Offset of the `{` that opens the innermost object enclosing `start`.
///
/// A brace sitting exactly at `start` belongs to the object being
/// searched from, not to its parent.
pub fn enclosing_opening_brace(s: &str, start: usize) -> Result<usize, ExtractError> {
    let bytes = s.as_bytes();
    if start >= bytes.len() {
        return Err(ExtractError::UnbalancedBraces {
            message: "search starts past the end of the text",
        });
    }

    let mut depth = usize::from(bytes[start] == b'{');
    for pos in (0..=start).rev() {
        match bytes[pos] {
            b'}' => depth += 1,
            b'{' => {
                if depth == 0 {
                    return Ok(pos);
                }
                depth -= 1;
            }
            _ => {}
        }
    }

    Err(ExtractError::UnbalancedBraces {
        message: "no opening brace encloses the `oauth:` marker",
    })
}
