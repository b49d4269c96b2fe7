//! Pandoc exit codes.
//!
//! Pandoc reports failure categories through fixed exit codes. The names below
//! are the ones Pandoc uses for its error constructors.

const EXIT_CODES: &[(i32, &str)] = &[
    (1, "PandocIOError"),
    (3, "PandocFailOnWarningError"),
    (4, "PandocAppError"),
    (5, "PandocTemplateError"),
    (6, "PandocOptionError"),
    (21, "PandocUnknownReaderError"),
    (22, "PandocUnknownWriterError"),
    (23, "PandocUnsupportedExtensionError"),
    (24, "PandocCiteprocError"),
    (25, "PandocBibliographyError"),
    (31, "PandocEpubSubdirectoryError"),
    (43, "PandocPDFError"),
    (44, "PandocXMLError"),
    (47, "PandocPDFProgramNotFoundError"),
    (61, "PandocHttpError"),
    (62, "PandocShouldNeverHappenError"),
    (63, "PandocSomeError"),
    (64, "PandocParseError"),
    (65, "PandocParsecError"),
    (66, "PandocMakePDFError"),
    (67, "PandocSyntaxMapError"),
    (83, "PandocFilterError"),
    (84, "PandocLuaError"),
    (89, "PandocNoScriptingEngine"),
    (91, "PandocMacroLoop"),
    (92, "PandocUTF8DecodingError"),
    (93, "PandocIpynbDecodingError"),
    (94, "PandocUnsupportedCharsetError"),
    (97, "PandocCouldNotFindDataFileError"),
    (98, "PandocCouldNotFindMetadataFileError"),
    (99, "PandocResourceNotFound"),
];

/// Name of a known exit code.
pub fn exit_code_name(code: i32) -> Option<&'static str> {
    EXIT_CODES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, name)| *name)
}

/// Human-readable cause for any non-zero exit code. Never empty.
pub fn describe_exit_code(code: i32) -> String {
    match exit_code_name(code) {
        Some(name) => name.to_string(),
        None if code < 0 => format!("Pandoc was terminated (exit code {})", code),
        None => format!("Unknown Pandoc error (exit code {})", code),
    }
}

/// Every code in the table, for callers that list them.
pub fn known_exit_codes() -> impl Iterator<Item = i32> {
    EXIT_CODES.iter().map(|(code, _)| *code)
}
