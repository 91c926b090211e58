//! 長さが事前にわからない文字列結果のための、伸長可能なスクラッチバッファ。
//!
//! バッファは最初に要求されたときに確保され、必要に応じて伸長されます (縮小はしません)。
//! 内容は呼び出しをまたいで意味を持たず、結果を受け取った側は次の呼び出しまでに
//! コピーする必要があります。
use std::ffi::CStr;
use std::sync::{Mutex, PoisonError};

use crate::error::{SvlibError, SvlibResult};
use crate::limits::Limits;

/// `acquire` に渡すサイズ要求。
///
/// C 側の符号付きサイズの規約 (`0` = 既存のまま、負 = 倍に伸長、正 = 少なくともそのサイズ)
/// を型で表現したものです。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRequest {
    Existing,
    Grow,
    AtLeast(usize),
}

impl SizeRequest {
    pub fn from_signed(size: isize) -> Self {
        match size {
            0 => SizeRequest::Existing,
            s if s < 0 => SizeRequest::Grow,
            s => SizeRequest::AtLeast(s as usize),
        }
    }
}

/// `write_with_retry` に渡す書き込み関数の結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// 結果が `buf[..n]` に収まり、`buf[n]` に NUL 終端が書かれた。
    Done(usize),
    /// バッファが小さすぎた。必要なサイズは不明。
    Truncated,
    /// バッファが小さすぎた。終端を含めて必要なサイズがわかっている。
    Needs(usize),
}

#[derive(Debug)]
pub struct ScratchBuffer {
    storage: Vec<u8>,
    limits: Limits,
}

impl Default for ScratchBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScratchBuffer {
    pub const fn new() -> Self {
        Self::with_limits(Limits::DEFAULT)
    }

    pub const fn with_limits(limits: Limits) -> Self {
        Self {
            storage: Vec::new(),
            limits,
        }
    }

    /// 現在のバッファサイズ。一度も確保されていなければ 0。
    pub fn current_size(&self) -> usize {
        self.storage.len()
    }

    /// 要求に従ってバッファを用意し、その全体を返します。
    ///
    /// 確保に失敗した場合は診断を出力し、以前のバッファをそのまま返します。
    /// 呼び出し側は返されたスライスの長さで、実際に伸長されたかを判断してください。
    pub fn acquire(&mut self, request: SizeRequest) -> &mut [u8] {
        let empty = self.storage.is_empty();
        let target = match request {
            SizeRequest::Existing | SizeRequest::AtLeast(0) | SizeRequest::Grow if empty => {
                self.limits.scratch_start_size
            }
            SizeRequest::Existing | SizeRequest::AtLeast(0) => return &mut self.storage,
            SizeRequest::Grow => self.storage.len().saturating_mul(2),
            SizeRequest::AtLeast(n) => n,
        };
        if target > self.storage.len() {
            self.reallocate(target);
        }
        &mut self.storage
    }

    fn reallocate(&mut self, size: usize) {
        let mut buf = Vec::new();
        match buf.try_reserve_exact(size) {
            Ok(()) => {
                buf.resize(size, 0);
                self.storage = buf;
            }
            Err(e) => {
                eprintln!("svlib-dpi: cannot grow scratch buffer to {} bytes: {}", size, e);
            }
        }
    }

    /// 結果がバッファに収まるまで、バッファを伸長しながら `produce` を呼び出します。
    ///
    /// `Limits::scratch_longest_result` に達しても収まらない場合は
    /// `ResultTooLong` で失敗します。`produce` が返したエラーはそのまま返します。
    /// 返される文字列は次にバッファを使う呼び出しまで有効です。
    pub fn write_with_retry<F>(&mut self, mut produce: F) -> SvlibResult<&CStr>
    where
        F: FnMut(&mut [u8]) -> SvlibResult<Fill>,
    {
        let cap = self.limits.scratch_longest_result;
        let mut request = SizeRequest::AtLeast(self.limits.scratch_start_size);
        let mut previous = 0;
        loop {
            let buf = self.acquire(request);
            let size = buf.len();
            if size <= previous {
                // 伸長できなかった
                return Err(SvlibError::OutOfMemory);
            }
            match produce(buf)? {
                Fill::Done(n) if n < size => {
                    return CStr::from_bytes_until_nul(&self.storage[..=n])
                        .map_err(|_| SvlibError::InvalidArgument("result is not NUL-terminated"));
                }
                Fill::Done(_) | Fill::Truncated => {
                    if size >= cap {
                        return Err(SvlibError::ResultTooLong { limit: cap });
                    }
                    request = SizeRequest::AtLeast(size.saturating_mul(2).min(cap));
                }
                Fill::Needs(n) => {
                    if n > cap {
                        return Err(SvlibError::ResultTooLong { limit: cap });
                    }
                    request = SizeRequest::AtLeast(n.max(size + 1));
                }
            }
            previous = size;
        }
    }

    /// Rust 側で組み立てたバイト列を NUL 終端付きでバッファへ書き込みます。
    pub fn write_bytes(&mut self, bytes: &[u8]) -> SvlibResult<&CStr> {
        if bytes.contains(&0) {
            return Err(SvlibError::InvalidArgument("string contains an interior NUL byte"));
        }
        self.write_with_retry(|buf| {
            Ok(if bytes.len() < buf.len() {
                buf[..bytes.len()].copy_from_slice(bytes);
                buf[bytes.len()] = 0;
                Fill::Done(bytes.len())
            } else {
                Fill::Needs(bytes.len() + 1)
            })
        })
    }

    pub fn write_str(&mut self, text: &str) -> SvlibResult<&CStr> {
        self.write_bytes(text.as_bytes())
    }
}

/// プロセス全体で共有されるスクラッチバッファ。
///
/// 再入不可です。ここから返したポインタは、次にスクラッチバッファを使う呼び出しまでしか
/// 有効ではありません。ホストは一度に一つの呼び出しだけを行う前提です。
static SCRATCH: Mutex<ScratchBuffer> = Mutex::new(ScratchBuffer::new());

/// 共有スクラッチバッファを借りて `f` を実行します。
pub fn with_scratch<R>(f: impl FnOnce(&mut ScratchBuffer) -> R) -> R {
    let mut guard = SCRATCH.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}
