/// Configuration options for [`parse_with_options`](crate::parse_with_options).
///
/// # Default
///
/// All options default to `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserOptions {
    /// Whether to decode backslash escapes of string values while parsing.
    ///
    /// Decoding happens in place in the input buffer, which never grows.
    /// Decoded strings are flagged, so [`Value::decoded`] returns them as is
    /// instead of decoding a second time. Keys are never decoded.
    ///
    /// Note that a decoded string is no longer valid JSON string content;
    /// serializing such a tree writes the decoded bytes verbatim.
    ///
    /// # Default
    ///
    /// `false`
    ///
    /// [`Value::decoded`]: crate::Value::decoded
    pub decode_strings: bool,

    /// Whether to reject the `nb` binary extension.
    ///
    /// By default a value starting with `nb` is read as a native-endian
    /// 32-bit length followed by that many raw bytes.
    ///
    /// # Default
    ///
    /// `false`
    pub disallow_binary: bool,

    /// Whether to stop after the root value without looking at the rest of
    /// the input.
    ///
    /// By default only JSON whitespace may follow the root value.
    ///
    /// # Examples
    ///
    /// ```json
    /// {"a":1} anything at all
    /// ```
    ///
    /// # Default
    ///
    /// `false`
    pub allow_trailing_data: bool,
}
