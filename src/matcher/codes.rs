use regex_syntax::ast;

/// POSIX `regcomp(3)` のエラー番号。既存のホスト側の宣言と互換にするため、
/// glibc の `REG_*` と同じ値を使います。
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegexErrorCode {
    BadPattern = 2,
    Collate = 3,
    CharClass = 4,
    Escape = 5,
    SubReg = 6,
    Bracket = 7,
    Paren = 8,
    Brace = 9,
    BadBrace = 10,
    Range = 11,
    Space = 12,
    BadRepeat = 13,
}

impl RegexErrorCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn description(self) -> &'static str {
        match self {
            RegexErrorCode::BadPattern => "Invalid regular expression",
            RegexErrorCode::Collate => "Invalid collation character",
            RegexErrorCode::CharClass => "Invalid character class name",
            RegexErrorCode::Escape => "Trailing backslash",
            RegexErrorCode::SubReg => "Invalid back reference",
            RegexErrorCode::Bracket => "Unmatched [, [^, [:, [., or [=",
            RegexErrorCode::Paren => "Unmatched ( or \\(",
            RegexErrorCode::Brace => "Unmatched \\{",
            RegexErrorCode::BadBrace => "Invalid content of \\{\\}",
            RegexErrorCode::Range => "Invalid range end",
            RegexErrorCode::Space => "Memory exhausted",
            RegexErrorCode::BadRepeat => "Invalid preceding regular expression",
        }
    }

    /// コンパイルに失敗したパターンを構文木レベルで解析し直して分類します。
    /// 構文木の段階では通る (変換段階で失敗した) パターンは `BadPattern` です。
    pub fn classify(pattern: &str) -> Self {
        match ast::parse::Parser::new().parse(pattern) {
            Ok(_) => RegexErrorCode::BadPattern,
            Err(e) => Self::from_ast_kind(e.kind()),
        }
    }

    fn from_ast_kind(kind: &ast::ErrorKind) -> Self {
        match kind {
            ast::ErrorKind::GroupUnclosed | ast::ErrorKind::GroupUnopened => RegexErrorCode::Paren,
            ast::ErrorKind::ClassUnclosed => RegexErrorCode::Bracket,
            ast::ErrorKind::ClassRangeInvalid | ast::ErrorKind::ClassRangeLiteral => {
                RegexErrorCode::Range
            }
            ast::ErrorKind::ClassEscapeInvalid | ast::ErrorKind::UnicodeClassInvalid => {
                RegexErrorCode::CharClass
            }
            ast::ErrorKind::EscapeUnrecognized | ast::ErrorKind::EscapeUnexpectedEof => {
                RegexErrorCode::Escape
            }
            ast::ErrorKind::RepetitionMissing => RegexErrorCode::BadRepeat,
            ast::ErrorKind::RepetitionCountUnclosed => RegexErrorCode::Brace,
            ast::ErrorKind::RepetitionCountInvalid
            | ast::ErrorKind::RepetitionCountDecimalEmpty
            | ast::ErrorKind::DecimalInvalid => RegexErrorCode::BadBrace,
            ast::ErrorKind::UnsupportedBackreference => RegexErrorCode::SubReg,
            ast::ErrorKind::NestLimitExceeded(_) | ast::ErrorKind::CaptureLimitExceeded => {
                RegexErrorCode::Space
            }
            _ => RegexErrorCode::BadPattern,
        }
    }
}
