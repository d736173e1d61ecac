//! Plain-text user lists: one identifier per line.

use std::io::BufRead;

use thiserror::Error;

pub const PLC_PREFIX: &str = "did:plc:";

#[derive(Debug, Error)]
pub enum UserListError {
    #[error("read user list: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: expected an identifier starting with did:plc:, got '{text}'")]
    BadDid { line: usize, text: String },
}

/// Reads identifiers from `reader`. Anything after the first space or tab
/// on a line is ignored (e.g. a handle kept as a note); blank lines are
/// skipped.
pub fn parse_user_list<R: BufRead>(reader: R) -> Result<Vec<String>, UserListError> {
    let mut dids = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let Some(token) = line.split([' ', '\t']).find(|t| !t.is_empty()) else {
            continue;
        };
        let token = token.trim_end_matches('\r');
        if token.is_empty() {
            continue;
        }
        if !token.starts_with(PLC_PREFIX) {
            return Err(UserListError::BadDid {
                line: idx + 1,
                text: line.trim().to_owned(),
            });
        }
        dids.push(token.to_owned());
    }
    Ok(dids)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_token_of_each_line() {
        let input = "did:plc:aaa alice.example\n\n  \ndid:plc:bbb\tbob\r\ndid:plc:ccc\n";
        let dids = parse_user_list(input.as_bytes()).unwrap();
        assert_eq!(dids, vec!["did:plc:aaa", "did:plc:bbb", "did:plc:ccc"]);
    }

    #[test]
    fn leading_whitespace_is_tolerated() {
        let dids = parse_user_list("   did:plc:aaa note".as_bytes()).unwrap();
        assert_eq!(dids, vec!["did:plc:aaa"]);
    }

    #[test]
    fn non_plc_line_reports_its_number() {
        let err = parse_user_list("did:plc:aaa\n@bob.example\n".as_bytes()).unwrap_err();
        match err {
            UserListError::BadDid { line, text } => {
                assert_eq!(line, 2);
                assert_eq!(text, "@bob.example");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_empty_list() {
        assert!(parse_user_list("".as_bytes()).unwrap().is_empty());
    }
}
