use std::io::{self, Read};

/// Decodes a string field, stopping at the first null byte if there is one.
pub(crate) fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Reads a string field of exactly `length` bytes, including any null
/// padding.
pub(crate) fn read_fixed_string<R: Read>(
    reader: &mut R,
    length: usize,
) -> io::Result<String> {
    let mut bytes = vec![0u8; length];
    reader.read_exact(&mut bytes)?;
    Ok(decode_string(&bytes))
}

/// Splits a null-terminated string off the front of `bytes`, returning it
/// along with whatever follows the terminator.
pub(crate) fn split_null_terminated(bytes: &[u8]) -> io::Result<(String, &[u8])> {
    match bytes.iter().position(|&b| b == 0) {
        Some(end) => Ok((
            String::from_utf8_lossy(&bytes[..end]).into_owned(),
            &bytes[end + 1..],
        )),
        None => invalid_data!("String is missing its null terminator"),
    }
}

/// Splits a multi-string (null-separated strings, ending with one or more
/// nulls) into its parts.  Empty strings at the end are dropped.
pub(crate) fn split_multi_string(bytes: &[u8]) -> Vec<String> {
    let mut strings: Vec<String> = bytes
        .split(|&b| b == 0)
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect();
    while strings.last().map_or(false, String::is_empty) {
        strings.pop();
    }
    strings
}

#[cfg(test)]
mod tests {
    use super::{
        decode_string, read_fixed_string, split_multi_string,
        split_null_terminated,
    };

    #[test]
    fn fixed_strings_stop_at_null() {
        assert_eq!(decode_string(b"Notes\0\0\0"), "Notes");
        assert_eq!(decode_string(b"Notes"), "Notes");
        assert_eq!(decode_string(b""), "");
        let mut input: &[u8] = b"Vendor\0rest";
        assert_eq!(read_fixed_string(&mut input, 7).unwrap(), "Vendor");
        assert_eq!(input, b"rest");
    }

    #[test]
    fn null_terminated_prefix() {
        let (name, rest) = split_null_terminated(b"Path\0\x01\x02").unwrap();
        assert_eq!(name, "Path");
        assert_eq!(rest, b"\x01\x02");
        let (name, rest) = split_null_terminated(b"\0").unwrap();
        assert_eq!(name, "");
        assert!(rest.is_empty());
        assert!(split_null_terminated(b"Path").is_err());
    }

    #[test]
    fn multi_strings() {
        assert_eq!(split_multi_string(b"a\0b\0\0"), vec!["a", "b"]);
        assert_eq!(split_multi_string(b"a\0\0b\0"), vec!["a", "", "b"]);
        assert_eq!(split_multi_string(b"HPC"), vec!["HPC"]);
        assert!(split_multi_string(b"\0\0").is_empty());
        assert!(split_multi_string(b"").is_empty());
    }
}
