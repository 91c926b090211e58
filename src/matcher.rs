//! このモジュールは、正規表現を一回だけ実行してサブマッチの位置を返すアダプタを提供します。
//!
//! 呼び出し元は結果を書き込む平坦な整数配列 (`MatchSlots`) を用意します。
//! 配列は一次元・昇順・0 始まりで、要素数は偶数 (または 0) でなければなりません。
//! 形の検証はパターンのコンパイルより前に行われ、違反していれば何も書き込まずに失敗します。
//!
//! パターンは呼び出しごとにコンパイルされ、呼び出しの終わりに破棄されます。
mod codes;
mod slots;
pub use codes::*;
pub use slots::*;

use regex::bytes::{Regex, RegexBuilder};
use regex_syntax::ast::{self, Ast, ClassSet, ClassSetItem, ClassSetUnion};
use std::ops::BitOr;
use thiserror::Error;

/// 配列形状の検証エラー。エンジンのエラーとは区別されます。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("output array has {0} dimensions, should be 1")]
    Dimensions(i32),
    #[error("odd number of elements ({0}) in output array")]
    OddLength(usize),
    #[error("output array left bound is {0}, should be 0")]
    NotZeroBased(i32),
    #[error("output array has descending range [{left}:{right}]")]
    Descending { left: i32, right: i32 },
    #[error("start offset {start} is outside the subject of length {len}")]
    StartOutOfRange { start: i32, len: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("{message}")]
    Compile {
        code: RegexErrorCode,
        message: String,
    },
}

impl MatchError {
    /// 検証エラーは -1、コンパイルエラーは POSIX の `REG_*` 番号。
    pub fn code(&self) -> i32 {
        match self {
            MatchError::Shape(_) => -1,
            MatchError::Compile { code, .. } => code.code(),
        }
    }
}

/// 正規表現のオプションのビットマップ。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegexOptions(u32);

impl RegexOptions {
    /// 大文字小文字を区別しない。
    pub const NOCASE: RegexOptions = RegexOptions(1);
    /// `^` / `$` が行の境界にも一致し、`.` と否定ブラケット `[^...]` が改行に一致しない。
    pub const NOLINE: RegexOptions = RegexOptions(2);

    pub fn from_bits(bits: i32) -> Self {
        RegexOptions(bits as u32 & (Self::NOCASE.0 | Self::NOLINE.0))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: RegexOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RegexOptions {
    type Output = RegexOptions;

    fn bitor(self, rhs: RegexOptions) -> RegexOptions {
        RegexOptions(self.0 | rhs.0)
    }
}

/// 配列の形を検証し、書き込めるグループ数 (要素数 / 2) を返します。
pub fn validate_slots<S: MatchSlots + ?Sized>(slots: &S) -> Result<usize, ShapeError> {
    let dimensions = slots.dimensions();
    if dimensions != 1 {
        return Err(ShapeError::Dimensions(dimensions));
    }
    let count = slots.element_count();
    if count == 0 {
        return Ok(0);
    }
    if count % 2 != 0 {
        return Err(ShapeError::OddLength(count));
    }
    let (left, right) = (slots.left(), slots.right());
    if left > right {
        return Err(ShapeError::Descending { left, right });
    }
    if left != 0 {
        return Err(ShapeError::NotZeroBased(left));
    }
    Ok(count / 2)
}

/// 拡張構文でパターンをコンパイルします。
///
/// バイト単位で照合するので、`.` や否定クラスは UTF-8 でないバイトにも一致します。
/// オプションがなければ POSIX の既定に合わせて `.` は改行にも一致します。
pub fn compile_pattern(pattern: &[u8], options: RegexOptions) -> Result<Regex, MatchError> {
    let text = std::str::from_utf8(pattern).map_err(|_| MatchError::Compile {
        code: RegexErrorCode::BadPattern,
        message: format!(
            "{}\npattern is not valid UTF-8",
            RegexErrorCode::BadPattern.description()
        ),
    })?;
    let noline = options.contains(RegexOptions::NOLINE);
    let line_pattern = if noline { exclude_newline(text) } else { None };
    RegexBuilder::new(line_pattern.as_deref().unwrap_or(text))
        .unicode(false)
        .case_insensitive(options.contains(RegexOptions::NOCASE))
        .multi_line(noline)
        .dot_matches_new_line(!noline)
        .build()
        .map_err(|err| {
            let code = match err {
                regex::Error::CompiledTooBig(_) => RegexErrorCode::Space,
                _ => RegexErrorCode::classify(text),
            };
            MatchError::Compile {
                code,
                message: format!("{}\n{}", code.description(), err),
            }
        })
}

/// 否定ブラケットに `\n` を足したパターンを作り直します。
///
/// 構文解析に失敗したら `None` を返し、元のパターンのままコンパイルさせます。
fn exclude_newline(text: &str) -> Option<String> {
    let mut parsed = ast::parse::Parser::new().parse(text).ok()?;
    add_newline_to_negated(&mut parsed);
    let mut out = String::with_capacity(text.len() + 4);
    ast::print::Printer::new().print(&parsed, &mut out).ok()?;
    Some(out)
}

fn add_newline_to_negated(node: &mut Ast) {
    match node {
        Ast::ClassBracketed(class) if class.negated => {
            let span = class.span;
            let newline = ClassSetItem::Literal(ast::Literal {
                span,
                kind: ast::LiteralKind::Special(ast::SpecialLiteralKind::LineFeed),
                c: '\n',
            });
            let kind =
                std::mem::replace(&mut class.kind, ClassSet::Item(ClassSetItem::Empty(span)));
            let mut kind = kind;
            let items = match &mut kind {
                ClassSet::Item(ClassSetItem::Union(union)) => {
                    let mut items = std::mem::take(&mut union.items);
                    items.push(newline);
                    items
                }
                ClassSet::Item(item) => {
                    vec![std::mem::replace(item, ClassSetItem::Empty(span)), newline]
                }
                ClassSet::BinaryOp(_) => vec![
                    ClassSetItem::Bracketed(Box::new(ast::ClassBracketed {
                        span,
                        negated: false,
                        kind,
                    })),
                    newline,
                ],
            };
            class.kind = ClassSet::Item(ClassSetItem::Union(ClassSetUnion { span, items }));
        }
        Ast::Repetition(rep) => add_newline_to_negated(&mut rep.ast),
        Ast::Group(group) => add_newline_to_negated(&mut group.ast),
        Ast::Alternation(alt) => alt.asts.iter_mut().for_each(add_newline_to_negated),
        Ast::Concat(concat) => concat.asts.iter_mut().for_each(add_newline_to_negated),
        _ => {}
    }
}

fn offset(local: usize, start: usize) -> i32 {
    i32::try_from(local + start).unwrap_or(i32::MAX)
}

/// `subject` の `start` バイト目以降に対してパターンを一回実行します。
///
/// 戻り値はパターンの `1 + キャプチャグループ数` で、一致しなかった場合は 0 です。
/// 一致した場合、`slots` の先頭から `min(要素数 / 2, 戻り値)` 組について
/// `(開始, 終了)` を書き込みます。位置は `subject` 全体の先頭からのバイトオフセットで、
/// 一致に参加しなかったグループは `(-1, -1)` です。
/// 一致しなかった場合と、エラーの場合は `slots` に何も書き込みません。
///
/// 選択は最左優先で、POSIX の最長一致とは異なります (`a|ab` を `ab` に当てると `(0, 1)`)。
pub fn regex_run<S: MatchSlots + ?Sized>(
    pattern: &[u8],
    subject: &[u8],
    options: RegexOptions,
    start: i32,
    slots: &mut S,
) -> Result<usize, MatchError> {
    let pairs = validate_slots(slots)?;
    let begin = usize::try_from(start)
        .ok()
        .filter(|&s| s <= subject.len())
        .ok_or(ShapeError::StartOutOfRange {
            start,
            len: subject.len(),
        })?;

    let re = compile_pattern(pattern, options)?;
    let match_count = re.captures_len();
    let Some(caps) = re.captures(&subject[begin..]) else {
        return Ok(0);
    };
    for group in 0..pairs.min(match_count) {
        let (s, e) = match caps.get(group) {
            Some(m) => (offset(m.start(), begin), offset(m.end(), begin)),
            None => (-1, -1),
        };
        slots.set(2 * group, s);
        slots.set(2 * group + 1, e);
    }
    Ok(match_count)
}

/// パターンのコンパイルエラーの説明文を返します。コンパイルできるパターンなら `None`。
pub fn regex_error_message(pattern: &[u8]) -> Option<String> {
    match compile_pattern(pattern, RegexOptions::default()) {
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    }
}
