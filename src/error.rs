// Copyright 2019 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io;

/// Fatal failures while loading the library and layout files.
///
/// Infeasible reconstructions and inferred loops are not errors; the
/// binaries map those outcomes to their own exit codes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{file}:{line}: expected {expected}")]
    Parse {
        file: String,
        line: usize,
        expected: String,
    },

    #[error("schema violation: {0}")]
    Schema(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn parse(file: &str, line: usize, expected: &str) -> Error {
        Error::Parse {
            file: file.to_string(),
            line,
            expected: expected.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse() {
        let err = Error::parse("c17.def", 12, "DIEAREA coordinates");
        assert_eq!(format!("{}", err), "c17.def:12: expected DIEAREA coordinates");
    }

    #[test]
    fn display_schema() {
        let err = Error::Schema("component U9 references unknown macro FOO".to_string());
        assert_eq!(
            format!("{}", err),
            "schema violation: component U9 references unknown macro FOO"
        );
    }
}
