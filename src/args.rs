//! このモジュールは、入れ子になった引数ファイルを一本の引数列に平坦化する機能を提供します。
//!
//! ホストの情報取得呼び出しは、`-f <file>` / `-F <file>` を展開済みの形で返します。
//! 各レベルはNULL終端の `char*` 配列で、`-f` の次の要素は文字列ではなく
//! 入れ子の配列へのポインタです。入れ子の配列の先頭要素はファイル名のラベルで、
//! 平坦化の結果には含めません。
//!
//! 平坦化は明示的なスタックによる深さ優先の走査で、すべての間接参照を
//! その内容で置き換えたときと同じ順序で引数を返します。
use std::ffi::CStr;
use std::marker::PhantomData;
use std::os::raw::c_char;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use crate::limits::Limits;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FlattenError {
    #[error("argument file nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },
}

impl FlattenError {
    pub fn code(&self) -> i32 {
        match self {
            FlattenError::NestingTooDeep { .. } => libc::E2BIG,
        }
    }
}

type ArgVector = *const *const c_char;

fn is_indirection(arg: &CStr) -> bool {
    matches!(arg.to_bytes(), b"-f" | b"-F")
}

/// 一回分の平坦化走査の状態。
pub struct ArgFlattener<'a> {
    /// 各深さで現在読んでいる要素へのカーソル。
    stack: Vec<ArgVector>,
    limit: usize,
    _marker: PhantomData<&'a CStr>,
}

// 生ポインタはホストが所有する引数配列を指しており、走査中は読み取りしか行いません。
// 共有の走査状態は Mutex 越しにしか触れないため、スレッド間で移動しても問題ありません。
unsafe impl Send for ArgFlattener<'_> {}

impl<'a> ArgFlattener<'a> {
    /// `root` から始まる走査を作ります。`root` が null なら最初から終端です。
    ///
    /// # Safety
    /// `root` は null か、NULL終端の `char*` 配列を指している必要があります。
    /// `-f` / `-F` の次の要素は同じ形の入れ子配列へのポインタ (または null) でなければならず、
    /// すべての配列と文字列は `'a` の間有効でなければなりません。
    pub unsafe fn new(root: *const *const c_char, limits: Limits) -> Self {
        let mut stack = Vec::new();
        if !root.is_null() {
            stack.push(root);
        }
        Self {
            stack,
            limit: limits.argv_stack_depth,
            _marker: PhantomData,
        }
    }

    /// 現在の入れ子の深さ (ルートを含む)。走査が終わっていれば 0。
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// 次の引数を返します。すべてのレベルを読み終えたら `Ok(None)`。
    ///
    /// 入れ子が上限を超えた場合は `NestingTooDeep` を返し、走査は終了状態になります。
    pub fn next_arg(&mut self) -> Result<Option<&'a CStr>, FlattenError> {
        loop {
            let Some(&cursor) = self.stack.last() else {
                return Ok(None);
            };
            let top = self.stack.len() - 1;
            let current = unsafe { *cursor };
            if current.is_null() {
                self.stack.pop();
                continue;
            }
            let arg = unsafe { CStr::from_ptr(current) };
            if !is_indirection(arg) {
                self.stack[top] = unsafe { cursor.add(1) };
                return Ok(Some(arg));
            }

            let after_flag = unsafe { cursor.add(1) };
            let nested = unsafe { *after_flag } as ArgVector;
            if nested.is_null() {
                // 入れ子の配列がない。親は終端から再開する
                self.stack[top] = after_flag;
                continue;
            }
            // 親は入れ子ポインタの次から再開する
            self.stack[top] = unsafe { after_flag.add(1) };
            if self.stack.len() >= self.limit {
                let limit = self.limit;
                self.stack.clear();
                return Err(FlattenError::NestingTooDeep { limit });
            }
            // ファイル名ラベルを読み飛ばす
            let label = unsafe { *nested };
            let start = if label.is_null() {
                nested
            } else {
                unsafe { nested.add(1) }
            };
            self.stack.push(start);
        }
    }
}

impl<'a> Iterator for ArgFlattener<'a> {
    type Item = Result<&'a CStr, FlattenError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_arg().transpose()
    }
}

impl std::iter::FusedIterator for ArgFlattener<'_> {}

/// 境界から駆動されるプロセス全体の走査状態。
/// 一回の走査が終わるまで、次の走査を始めてはいけません。
static TRAVERSAL: Mutex<Option<ArgFlattener<'static>>> = Mutex::new(None);

/// 共有の走査から次の引数を取り出します。
///
/// 走査が始まっていなければ `*vector` をルートとして新しい走査を始めます。
/// 終端に達するか入れ子の上限を超えると、走査状態をリセットし `*vector` を null にします。
/// その後の呼び出しでは、新しいルートを渡して走査をやり直す必要があります。
///
/// # Safety
/// `*vector` は `ArgFlattener::new` と同じ条件を満たし、走査が終わるまで有効でなければなりません。
pub unsafe fn argument_flatten_next(
    vector: &mut *const *const c_char,
) -> Result<Option<&'static CStr>, FlattenError> {
    let mut guard = TRAVERSAL.lock().unwrap_or_else(PoisonError::into_inner);
    let traversal =
        guard.get_or_insert_with(|| unsafe { ArgFlattener::new(*vector, Limits::DEFAULT) });
    let result = traversal.next_arg();
    if !matches!(result, Ok(Some(_))) {
        *guard = None;
        *vector = std::ptr::null();
    }
    result
}
