//! 可変長の結果を扱う各コンポーネントの上限値。
//!
//! プロセス全体で共有されるシングルトンは `Limits::default()` を使い、
//! テストや Rust 側の呼び出し元は小さな値を渡してセッションを作ることができます。

/// スクラッチバッファを初めて確保するときのサイズ (バイト)。
pub const SCRATCH_START_SIZE: usize = 256;

/// 伸長・再試行ループが諦めるバッファサイズの上限 (バイト)。
/// これを超える結果は `ResultTooLong` として失敗します。
pub const SCRATCH_LONGEST_RESULT: usize = 8192;

/// `-f` / `-F` による引数ファイルの入れ子の最大深さ。
pub const ARGV_STACK_DEPTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub scratch_start_size: usize,
    pub scratch_longest_result: usize,
    pub argv_stack_depth: usize,
}

impl Limits {
    pub const DEFAULT: Limits = Limits {
        scratch_start_size: SCRATCH_START_SIZE,
        scratch_longest_result: SCRATCH_LONGEST_RESULT,
        argv_stack_depth: ARGV_STACK_DEPTH,
    };
}

impl Default for Limits {
    fn default() -> Self {
        Self::DEFAULT
    }
}
