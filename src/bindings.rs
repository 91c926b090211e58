//! シミュレータが提供する DPI / VPI の C シンボルの宣言。
//!
//! これらはライブラリがシミュレータに読み込まれたときに解決されます。
//! 宣言は IEEE 1800 の `svdpi.h` と `vpi_user.h` に合わせています。
#![allow(non_camel_case_types, non_snake_case)]

use std::os::raw::{c_char, c_int, c_void};

pub type PLI_INT32 = i32;
pub type PLI_BYTE8 = c_char;

/// オープン配列の不透明なハンドル。
pub type svOpenArrayHandle = *mut c_void;

/// `vpi_get_vlog_info` が埋める構造体。
#[repr(C)]
#[derive(Debug)]
pub struct s_vpi_vlog_info {
    pub argc: PLI_INT32,
    pub argv: *mut *mut PLI_BYTE8,
    pub product: *mut PLI_BYTE8,
    pub version: *mut PLI_BYTE8,
}

impl Default for s_vpi_vlog_info {
    fn default() -> Self {
        Self {
            argc: 0,
            argv: std::ptr::null_mut(),
            product: std::ptr::null_mut(),
            version: std::ptr::null_mut(),
        }
    }
}

unsafe extern "C" {
    pub fn svDimensions(h: svOpenArrayHandle) -> c_int;
    pub fn svSizeOfArray(h: svOpenArrayHandle) -> c_int;
    pub fn svLeft(h: svOpenArrayHandle, d: c_int) -> c_int;
    pub fn svRight(h: svOpenArrayHandle, d: c_int) -> c_int;
    pub fn svGetArrElemPtr1(h: svOpenArrayHandle, indx1: c_int) -> *mut c_void;

    /// 成功すると 1、失敗すると 0 を返します。
    pub fn vpi_get_vlog_info(vlog_info_p: *mut s_vpi_vlog_info) -> PLI_INT32;
}
