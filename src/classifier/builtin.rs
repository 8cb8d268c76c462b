//! Classifier definitions and extension mappings that ship with the tool.
//! Configuration layers are folded on top of these.

use std::collections::BTreeMap;
use std::time::Duration;

use super::code::CodeClassifier;
use super::markup::MarkupFilter;
use super::regex_rules::RuleDefinition;
use super::registry::{code_classifier, ClassifierDefinition, ClassifierLayer, EXCLUDED_CLASSIFIER_ID};
use super::span::Classification;
use super::ClassifierKind;
use crate::error::ConfigError;

/// C# comments, string literals (regular, verbatim, interpolated and raw) and
/// character literals in one alternation so the leftmost construct wins.
pub(crate) const CSHARP_LEXER: &str = concat!(
    r"(?P<DelimitedComment>/\*(?s:.*?)\*/)",
    r"|(?P<SingleLineComment>//[^\r\n]*)",
    r#"|(?P<NormalStringLiteral>\$*"""(?s:.*?)"""|(?:\$@|@\$?)"(?:[^"]|"")*"|\$?"(?:[^"\\\r\n]|\\.)*")"#,
    r"|(?P<Undefined>'(?:[^'\\\r\n]|\\.)+')",
);

const CSHARP_REGION: &str = r"(?m)^[ \t]*#(?:end)?region[ \t]+(?P<text>[^\r\n]+)";

const C_STYLE_LEXER: &str = concat!(
    r"(?P<DelimitedComment>/\*(?s:.*?)\*/)",
    r"|(?P<SingleLineComment>//[^\r\n]*)",
    r#"|(?P<NormalStringLiteral>"(?:[^"\\\r\n]|\\.)*")"#,
    r"|(?P<Undefined>'(?:[^'\\\r\n]|\\.){1,8}')",
);

const SCRIPT_LEXER: &str = concat!(
    r"(?P<DelimitedComment>/\*(?s:.*?)\*/)",
    r"|(?P<SingleLineComment>//[^\r\n]*)",
    r#"|(?P<NormalStringLiteral>"(?:[^"\\\r\n]|\\.)*"|'(?:[^'\\\r\n]|\\.)*')"#,
    r"|(?P<InterpolatedStringLiteral>`(?:[^`\\]|\\.)*`)",
);

const VISUAL_BASIC_LEXER: &str = concat!(
    r#"(?P<NormalStringLiteral>\$?"(?:[^"\r\n]|"")*"c?)"#,
    r"|(?P<SingleLineComment>(?:'|\b(?i:rem)\b)[^\r\n]*)",
);

const PYTHON_LEXER: &str = concat!(
    r"(?P<SingleLineComment>#[^\r\n]*)",
    r#"|(?P<VerbatimStringLiteral>[rR][bB]?(?:"""(?s:.*?)"""|'''(?s:.*?)'''|"[^"\r\n]*"|'[^'\r\n]*'))"#,
    r#"|(?P<InterpolatedStringLiteral>[fF][rR]?(?:"""(?s:.*?)"""|'''(?s:.*?)'''|"(?:[^"\\\r\n]|\\.)*"|'(?:[^'\\\r\n]|\\.)*'))"#,
    r#"|(?P<NormalStringLiteral>[bBuU]?(?:"""(?s:.*?)"""|'''(?s:.*?)'''|"(?:[^"\\\r\n]|\\.)*"|'(?:[^'\\\r\n]|\\.)*'))"#,
);

const SQL_LEXER: &str = concat!(
    r"(?P<SingleLineComment>--[^\r\n]*)",
    r"|(?P<DelimitedComment>/\*(?s:.*?)\*/)",
    r"|(?P<NormalStringLiteral>[nN]?'(?:[^']|'')*')",
);

const POWERSHELL_LEXER: &str = concat!(
    r"(?P<DelimitedComment><#(?s:.*?)#>)",
    r"|(?P<SingleLineComment>#[^\r\n]*)",
    r#"|(?P<VerbatimStringLiteral>@'(?s:.*?)'@|'(?:[^']|'')*')"#,
    r#"|(?P<InterpolatedStringLiteral>@"(?s:.*?)"@|"(?:[^"`]|`.)*")"#,
);

const HASH_COMMENT_LEXER: &str = concat!(
    r"(?P<SingleLineComment>(?:^|[ \t])#[^\r\n]*)",
    r#"|(?P<NormalStringLiteral>"(?:[^"\\\r\n]|\\.)*"|'[^'\r\n]*')"#,
);

const BATCH_COMMENT: &str = r"^[ \t]*@?(?:rem\b|::)[^\r\n]*";

fn c_sharp() -> ClassifierDefinition {
    ClassifierDefinition::new("CSharp", ClassifierKind::Code)
        .with_rules(vec![
            RuleDefinition::new(CSHARP_REGION, Classification::RegionDirective),
            RuleDefinition::new(CSHARP_LEXER, Classification::PlainText),
        ])
        .with_delimiters(Some("///"), Some("////"), Some("/**"))
        .with_prefixes(Some('@'), Some('$'))
}

fn c_style() -> ClassifierDefinition {
    ClassifierDefinition::new("CStyle", ClassifierKind::Code)
        .with_rules(vec![RuleDefinition::new(C_STYLE_LEXER, Classification::PlainText)])
        .with_delimiters(None, Some("////"), None)
}

fn visual_basic() -> ClassifierDefinition {
    ClassifierDefinition::new("VisualBasic", ClassifierKind::Code)
        .with_rules(vec![RuleDefinition::new(VISUAL_BASIC_LEXER, Classification::PlainText)])
        .with_delimiters(Some("'''"), Some("''''"), None)
        .with_prefixes(None, Some('$'))
}

fn script_with_html() -> ClassifierDefinition {
    ClassifierDefinition::new("ScriptWithHtml", ClassifierKind::ScriptWithHtml)
        .with_rules(vec![RuleDefinition::new(SCRIPT_LEXER, Classification::PlainText)])
        .with_delimiters(Some("///"), Some("////"), None)
}

fn regex_only(id: &str, rules: Vec<RuleDefinition>) -> ClassifierDefinition {
    ClassifierDefinition::new(id, ClassifierKind::Regex).with_rules(rules)
}

fn definitions() -> Vec<ClassifierDefinition> {
    vec![
        c_sharp(),
        c_style(),
        visual_basic(),
        script_with_html(),
        regex_only(
            "Python",
            vec![RuleDefinition::new(PYTHON_LEXER, Classification::PlainText)],
        ),
        regex_only(
            "Sql",
            vec![RuleDefinition::new(SQL_LEXER, Classification::PlainText)],
        ),
        regex_only(
            "PowerShell",
            vec![RuleDefinition::new(POWERSHELL_LEXER, Classification::PlainText)],
        ),
        regex_only(
            "HashComment",
            vec![RuleDefinition::new(HASH_COMMENT_LEXER, Classification::PlainText)
                .with_options("Multiline")],
        ),
        regex_only(
            "Batch",
            vec![RuleDefinition::new(BATCH_COMMENT, Classification::SingleLineComment)
                .with_options("IgnoreCase, Multiline")],
        ),
        ClassifierDefinition::new("Xml", ClassifierKind::Xml),
        ClassifierDefinition::new("Html", ClassifierKind::Html),
        ClassifierDefinition::new("Markdown", ClassifierKind::Markdown),
        ClassifierDefinition::new("ResourceFile", ClassifierKind::ResourceFile).with_mnemonic('&'),
        ClassifierDefinition::new("ReportingServices", ClassifierKind::ReportingServices),
        ClassifierDefinition::new("PlainText", ClassifierKind::PlainText),
    ]
}

const EXTENSIONS: &[(&str, &[&str])] = &[
    ("CSharp", &["cs", "csx"]),
    (
        "CStyle",
        &[
            "c", "h", "cpp", "cc", "cxx", "hpp", "hh", "hxx", "java", "go", "rs", "swift", "kt",
            "kts", "scala", "dart", "css", "scss", "less",
        ],
    ),
    ("VisualBasic", &["vb", "vbs", "bas"]),
    (
        "ScriptWithHtml",
        &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"],
    ),
    ("Python", &["py", "pyw"]),
    ("Sql", &["sql"]),
    ("PowerShell", &["ps1", "psm1", "psd1"]),
    (
        "HashComment",
        &["sh", "bash", "zsh", "yml", "yaml", "toml", "rb", "pl", "cmake"],
    ),
    ("Batch", &["bat", "cmd"]),
    (
        "Xml",
        &[
            "xml", "xaml", "xsd", "xslt", "config", "csproj", "vbproj", "fsproj", "props",
            "targets", "nuspec", "svg", "plist", "vsixmanifest",
        ],
    ),
    ("Html", &["html", "htm", "xhtml", "aspx", "ascx", "cshtml", "vue"]),
    ("Markdown", &["md", "markdown", "mdx"]),
    ("ResourceFile", &["resx", "resw"]),
    ("ReportingServices", &["rdl", "rdlc"]),
    ("PlainText", &["txt", "text"]),
    (
        EXCLUDED_CLASSIFIER_ID,
        &[
            "png", "jpg", "jpeg", "gif", "bmp", "ico", "webp", "pdf", "zip", "gz", "tar", "7z",
            "exe", "dll", "pdb", "so", "dylib", "a", "o", "obj", "lib", "bin", "class", "jar",
            "woff", "woff2", "ttf", "otf", "eot", "mp3", "mp4", "wav", "snk", "pfx", "lock",
        ],
    ),
];

pub fn builtin_layer() -> ClassifierLayer {
    let mut extensions = BTreeMap::new();
    for (id, list) in EXTENSIONS {
        for extension in *list {
            extensions.insert(extension.to_string(), id.to_string());
        }
    }
    ClassifierLayer {
        definitions: definitions(),
        extensions,
    }
}

/// The Visual Basic code classifier, also used inside report definitions.
pub(crate) fn visual_basic_classifier(
    filter: MarkupFilter,
    timeout: Duration,
) -> Result<CodeClassifier, ConfigError> {
    code_classifier(&visual_basic(), &filter, timeout)
}

#[cfg(test)]
pub(crate) fn script_code_classifier(
    filter: MarkupFilter,
    timeout: Duration,
) -> Result<CodeClassifier, ConfigError> {
    code_classifier(&script_with_html(), &filter, timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::registry::{ClassifierRegistry, RegistrySettings};

    fn classify<'a>(extension: &str, content: &'a str) -> Vec<(Classification, &'a str)> {
        let registry = ClassifierRegistry::builtin(RegistrySettings::default()).unwrap();
        registry
            .classify_extension(extension, content)
            .spans()
            .iter()
            .map(|s| (s.classification, s.text))
            .collect()
    }

    #[test]
    fn test_every_builtin_extension_resolves() {
        let layer = builtin_layer();
        let ids: Vec<_> = layer.definitions.iter().map(|d| d.id.as_str()).collect();
        for id in layer.extensions.values() {
            assert!(id == EXCLUDED_CLASSIFIER_ID || ids.contains(&id.as_str()), "{id}");
        }
        assert!(ClassifierRegistry::builtin(RegistrySettings::default()).is_ok());
    }

    #[test]
    fn test_csharp_region_and_char_literals() {
        let content = "#region Helper methods\nchar q = '\"'; // quote \"char\"\n#endregion\n";
        let found = classify("cs", content);
        assert_eq!(
            found,
            vec![
                (Classification::RegionDirective, "Helper methods"),
                (Classification::SingleLineComment, "// quote \"char\""),
            ]
        );
    }

    #[test]
    fn test_csharp_verbatim_string_with_doubled_quotes() {
        let found = classify("cs", r#"var p = @"C:\temp ""quoted"" dir";"#);
        assert_eq!(
            found,
            vec![(
                Classification::VerbatimStringLiteral,
                r#"@"C:\temp ""quoted"" dir""#
            )]
        );
    }

    #[test]
    fn test_visual_basic_comments_and_strings() {
        let found = classify("vb", "''' <summary>Does wrok</summary>\nDim s = \"It's\" ' note\nREM old style\n");
        assert_eq!(
            found,
            vec![
                (Classification::XmlCommentsInnerText, "Does wrok"),
                (Classification::NormalStringLiteral, "\"It's\""),
                (Classification::SingleLineComment, "' note"),
                (Classification::SingleLineComment, "REM old style"),
            ]
        );
    }

    #[test]
    fn test_python_string_kinds() {
        let found = classify("py", "# note\nx = f\"hi {name}\"\ny = r'\\d+'\nz = \"\"\"doc\"\"\"\n");
        assert_eq!(
            found,
            vec![
                (Classification::SingleLineComment, "# note"),
                (Classification::InterpolatedStringLiteral, "f\"hi {name}\""),
                (Classification::VerbatimStringLiteral, "r'\\d+'"),
                (Classification::NormalStringLiteral, "\"\"\"doc\"\"\""),
            ]
        );
    }

    #[test]
    fn test_batch_comments() {
        let found = classify("bat", "@echo off\nREM Build the thing\n:: another note\necho rem\n");
        assert_eq!(
            found,
            vec![
                (Classification::SingleLineComment, "REM Build the thing"),
                (Classification::SingleLineComment, ":: another note"),
            ]
        );
    }
}
