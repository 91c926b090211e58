use std::ffi::CStr;

use super::{Backing, Handle, with_sessions};
use crate::error::{SvlibError, SvlibResult};

/// `glob(3)` の結果を所有し、`Drop` で `globfree(3)` を呼ぶラッパー。
pub struct GlobResult {
    raw: libc::glob_t,
}

// `glob_t` はCライブラリが確保したパス配列への生ポインタを含むため、自動的には Send になりません。
// 配列は `GlobResult` だけが所有し、共有セッション表の Mutex 越しにしか触れないため、
// スレッド間で移動しても問題ありません。
unsafe impl Send for GlobResult {}

impl GlobResult {
    /// `GLOB_ERR | GLOB_MARK` でパターンを展開します。
    ///
    /// 一致がなければ `Ok(None)`。エラーは次のように対応付けます:
    /// `GLOB_NOSPACE` → `OutOfMemory`、`GLOB_ABORTED` → `AccessDenied`、その他 → `Unsupported`。
    pub fn run(pattern: &CStr) -> SvlibResult<Option<Self>> {
        // 失敗時も途中まで確保された領域があり得るので、先に所有者を作っておき Drop で解放する
        let mut result = GlobResult {
            raw: unsafe { std::mem::zeroed() },
        };
        let status = unsafe {
            libc::glob(
                pattern.as_ptr(),
                libc::GLOB_ERR | libc::GLOB_MARK,
                None,
                &mut result.raw,
            )
        };
        match status {
            0 => Ok(Some(result)),
            libc::GLOB_NOMATCH => Ok(None),
            libc::GLOB_NOSPACE => Err(SvlibError::OutOfMemory),
            libc::GLOB_ABORTED => Err(SvlibError::AccessDenied),
            _ => Err(SvlibError::Unsupported),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.gl_pathc as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&CStr> {
        if index >= self.len() || self.raw.gl_pathv.is_null() {
            return None;
        }
        unsafe {
            let entry = *self.raw.gl_pathv.add(self.raw.gl_offs as usize + index);
            if entry.is_null() {
                None
            } else {
                Some(CStr::from_ptr(entry))
            }
        }
    }
}

impl Drop for GlobResult {
    fn drop(&mut self) {
        unsafe {
            libc::globfree(&mut self.raw);
        }
    }
}

/// パターンに一致するパス名のコレクションを開始します。
///
/// 一致がなければハンドルなし・件数 0 の成功です。
/// ディレクトリには末尾に `/` が付きます。
pub fn glob_start(pattern: &CStr) -> SvlibResult<(Option<Handle>, u32)> {
    let Some(result) = GlobResult::run(pattern)? else {
        return Ok((None, 0));
    };
    let count = u32::try_from(result.len()).unwrap_or(u32::MAX);
    let handle = with_sessions(|t| t.create(Backing::Glob(result)))?;
    Ok((Some(handle), count))
}
