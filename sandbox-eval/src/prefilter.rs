// SPDX-License-Identifier: Apache-2.0
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stage L: cheap textual checks that run before the source is ever
//! tokenized, to bound parser cost and runtime symbol-table growth
//! (spec §4.1).

use crate::error::{EvalError, EvalResult};

/// Tunable limits for the lexical pre-filter. `Default` reproduces the
/// spec's defaults exactly; embedders that need to tighten or loosen them
/// construct their own `SandboxLimits` rather than forking the crate.
#[derive(Debug, Clone, Copy)]
pub struct SandboxLimits {
    pub max_source_bytes: usize,
    pub max_identifier_calls: usize,
    pub atom_exhaustion_len: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        SandboxLimits {
            max_source_bytes: 100_000,
            max_identifier_calls: 1000,
            atom_exhaustion_len: 10_000,
        }
    }
}

/// Runs the three rejection rules in order, first match wins, and returns
/// the validated UTF-8 source on success.
pub fn prefilter<'a>(source: &'a [u8], limits: &SandboxLimits) -> EvalResult<&'a str> {
    if source.len() > limits.max_source_bytes {
        log::warn!(
            "prefilter: source of {} bytes exceeds limit of {}",
            source.len(),
            limits.max_source_bytes
        );
        return Err(EvalError::SourceTooLarge);
    }

    let text = std::str::from_utf8(source).map_err(|_| EvalError::Parse {
        line: 0,
        message: "source is not valid UTF-8".to_owned(),
    })?;

    let suspicious = count_identifier_digit_calls(text);
    if suspicious > limits.max_identifier_calls {
        log::warn!(
            "prefilter: {suspicious} identifier-table-exhaustion candidates exceeds limit of {}",
            limits.max_identifier_calls
        );
        return Err(EvalError::SuspiciousPatterns);
    }

    // Inherited from the original implementation rather than redesigned;
    // see SPEC_FULL.md Open Question OQ-3.
    if text.len() > limits.atom_exhaustion_len && text.contains("foo") {
        log::debug!("prefilter: rejecting on inherited \"foo\" heuristic (OQ-3)");
        return Err(EvalError::AtomExhaustion);
    }

    Ok(text)
}

/// Counts occurrences of the pattern `\w+\d+\(\)`: an identifier ending in
/// one or more digits, immediately followed by an empty argument list.
/// Hand-rolled rather than pulled in via the `regex` crate because the
/// pattern is small, fixed, and runs once per `eval` call on the full
/// source text.
fn count_identifier_digit_calls(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut count = 0usize;
    let mut i = 0usize;
    while i < bytes.len() {
        if !is_word_byte(bytes[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && is_word_byte(bytes[i]) {
            i += 1;
        }
        let word = &bytes[start..i];
        let digit_run_start = word
            .iter()
            .rposition(|b| !b.is_ascii_digit())
            .map(|idx| idx + 1)
            .unwrap_or(0);
        let has_leading_word_char = digit_run_start > 0;
        let has_trailing_digits = digit_run_start < word.len();
        if has_leading_word_char && has_trailing_digits {
            let mut j = i;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if bytes.get(j) == Some(&b'(') {
                j += 1;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) == Some(&b')') {
                    count += 1;
                }
            }
        }
    }
    count
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_small_clean_source() {
        let src = b"defmodule M do\n  def f(x), do: x\nend";
        assert!(prefilter(src, &SandboxLimits::default()).is_ok());
    }

    #[test]
    fn rejects_oversized_source() {
        let src = vec![b'a'; 200_000];
        let limits = SandboxLimits::default();
        assert_eq!(
            prefilter(&src, &limits).unwrap_err(),
            EvalError::SourceTooLarge
        );
    }

    #[test]
    fn counts_identifier_digit_zero_arg_calls() {
        assert_eq!(count_identifier_digit_calls("foo1()"), 1);
        assert_eq!(count_identifier_digit_calls("foo1() bar2()"), 2);
        assert_eq!(count_identifier_digit_calls("foo1(x)"), 0);
        assert_eq!(count_identifier_digit_calls("foo()"), 0);
        assert_eq!(count_identifier_digit_calls("123()"), 0);
    }

    #[test]
    fn rejects_on_suspicious_pattern_flood() {
        let mut limits = SandboxLimits::default();
        limits.max_identifier_calls = 2;
        let src = "a1() b2() c3()".as_bytes();
        assert_eq!(
            prefilter(src, &limits).unwrap_err(),
            EvalError::SuspiciousPatterns
        );
    }

    #[test]
    fn atom_exhaustion_heuristic_requires_both_conditions() {
        let limits = SandboxLimits::default();
        let short_with_foo = b"foo";
        assert!(prefilter(short_with_foo, &limits).is_ok());

        let long_without_foo = vec![b'a'; 10_001];
        assert!(prefilter(&long_without_foo, &limits).is_ok());

        let mut long_with_foo = vec![b'a'; 10_001];
        long_with_foo.extend_from_slice(b"foo");
        assert_eq!(
            prefilter(&long_with_foo, &limits).unwrap_err(),
            EvalError::AtomExhaustion
        );
    }
}
