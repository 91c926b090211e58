//! このモジュールは、シミュレータから DPI-C で呼び出される `svlib_dpi_imported_*` 関数を提供します。
//!
//! 境界を越えられるのは整数・不透明なハンドル・NUL 終端文字列・オープン配列だけです。
//! ここでは引数を検証して Rust 側の API に渡し、結果をステータスコードと出力引数に戻します。
//! 出力引数は、どの経路で戻る場合でも先に初期化されます。
mod exports;
pub use exports::*;

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::bindings::{self, svOpenArrayHandle};
use crate::error::{SvlibError, SvlibResult};
use crate::matcher::MatchSlots;

/// ホストのオープン配列 (`int` の一次元配列を想定) を `MatchSlots` として扱うラッパー。
pub struct OpenArray {
    handle: svOpenArrayHandle,
}

impl OpenArray {
    /// # Safety
    /// `handle` は null か、この呼び出しの間有効な、要素が `int` のオープン配列でなければなりません。
    pub unsafe fn new(handle: svOpenArrayHandle) -> Option<Self> {
        if handle.is_null() {
            None
        } else {
            Some(Self { handle })
        }
    }
}

impl MatchSlots for OpenArray {
    fn dimensions(&self) -> i32 {
        unsafe { bindings::svDimensions(self.handle) }
    }

    fn element_count(&self) -> usize {
        let bytes = unsafe { bindings::svSizeOfArray(self.handle) };
        usize::try_from(bytes).unwrap_or(0) / std::mem::size_of::<i32>()
    }

    fn left(&self) -> i32 {
        unsafe { bindings::svLeft(self.handle, 1) }
    }

    fn right(&self) -> i32 {
        unsafe { bindings::svRight(self.handle, 1) }
    }

    fn set(&mut self, index: usize, value: i32) {
        let Ok(offset) = i32::try_from(index) else {
            return;
        };
        let element = unsafe { bindings::svGetArrElemPtr1(self.handle, self.left() + offset) };
        if !element.is_null() {
            unsafe { element.cast::<i32>().write(value) };
        }
    }
}

/// ホストの情報取得呼び出しの結果。
#[derive(Debug, Clone, Copy)]
pub struct VlogInfo {
    pub product: *const c_char,
    pub version: *const c_char,
    /// `-f` / `-F` が展開済みの引数配列。`ArgFlattener` のルートになります。
    pub argv: *const *const c_char,
}

/// `vpi_get_vlog_info` を呼び出します。失敗した場合は `None`。
pub fn vlog_info() -> Option<VlogInfo> {
    let mut info = bindings::s_vpi_vlog_info::default();
    if unsafe { bindings::vpi_get_vlog_info(&mut info) } == 0 {
        return None;
    }
    Some(VlogInfo {
        product: info.product,
        version: info.version,
        argv: info.argv as *const *const c_char,
    })
}

/// null でない C 文字列引数を借ります。
///
/// # Safety
/// `p` は null か、呼び出しの間有効な NUL 終端文字列を指していなければなりません。
unsafe fn cstr_arg<'a>(p: *const c_char) -> SvlibResult<&'a CStr> {
    if p.is_null() {
        Err(SvlibError::InvalidArgument("null string argument"))
    } else {
        Ok(unsafe { CStr::from_ptr(p) })
    }
}

fn report(context: &str, err: &dyn std::fmt::Display) {
    eprintln!("svlib-dpi: {}: {}", context, err);
}
